//! Feed transport abstraction and the WebSocket implementation.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::borrow::Cow;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as TungsteniteError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{ErrorContext, MonitorError, MonitorResult};

/// Close code of a normal, intentional closure.
pub const NORMAL_CLOSE: u16 = 1000;

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    /// The peer closed with a normal close code.
    Clean,
    /// Anything else: error, non-normal close code, or the stream simply
    /// ending.
    Abnormal { reason: String },
}

/// One unit read from an open feed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFrame {
    Text(String),
    /// The stream is finished; no further frames follow.
    Closed(Disconnect),
}

/// An open feed subscription.
#[async_trait]
pub trait FeedStream: Send {
    /// Wait for the next text frame or the end of the stream.
    ///
    /// Must be cancel safe: dropping the future loses no frames.
    async fn next_frame(&mut self) -> FeedFrame;

    /// Close the stream intentionally.
    async fn close(&mut self, code: u16, reason: &str) -> MonitorResult<()>;
}

/// Factory for feed subscriptions.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn connect(&self, url: &str) -> MonitorResult<Box<dyn FeedStream>>;
}

/// WebSocket transport backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FeedTransport for WebSocketTransport {
    async fn connect(&self, url: &str) -> MonitorResult<Box<dyn FeedStream>> {
        let (socket, response) = connect_async(url).await.map_err(|e| {
            let context = ErrorContext::new("connect_feed")
                .with_entity("websocket")
                .with_entity_id(url);
            // a bad URL fails the same way on every attempt
            let context = match e {
                TungsteniteError::Url(_) => context,
                _ => context.retryable(),
            };
            MonitorError::transport_with_context(e.to_string(), context)
        })?;
        log::debug!("WebSocket handshake with {} returned {}", url, response.status());
        Ok(Box::new(WebSocketFeedStream { socket }))
    }
}

struct WebSocketFeedStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedStream for WebSocketFeedStream {
    async fn next_frame(&mut self) -> FeedFrame {
        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => return FeedFrame::Text(text),
                Some(Ok(Message::Close(Some(frame)))) => {
                    let disconnect = if frame.code == CloseCode::Normal {
                        Disconnect::Clean
                    } else {
                        Disconnect::Abnormal {
                            reason: format!("closed with code {}: {}", frame.code, frame.reason),
                        }
                    };
                    return FeedFrame::Closed(disconnect);
                }
                Some(Ok(Message::Close(None))) => {
                    return FeedFrame::Closed(Disconnect::Abnormal {
                        reason: "closed without status".to_string(),
                    })
                }
                Some(Ok(Message::Binary(bytes))) => {
                    log::debug!("Ignoring {} byte binary frame", bytes.len());
                }
                // ping/pong are answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return FeedFrame::Closed(Disconnect::Abnormal {
                        reason: e.to_string(),
                    })
                }
                None => {
                    return FeedFrame::Closed(Disconnect::Abnormal {
                        reason: "stream ended without close frame".to_string(),
                    })
                }
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> MonitorResult<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Owned(reason.to_string()),
        };
        self.socket
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| MonitorError::from(e).with_operation("close_feed"))
    }
}
