//! Live feed connection with reconnect scheduling.
//!
//! One logical subscription exists at a time. Frames are applied to the
//! [`FeedStore`] in receipt order and every resulting [`FeedUpdate`] is
//! forwarded to the display loop. An abnormal disconnect, or a failed
//! connect, schedules exactly one reconnect after a fixed delay; retries are
//! unbounded. A clean close from the peer ends the connection for good, and
//! shutdown closes the socket intentionally without reconnecting.

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use super::store::{FeedStore, FeedUpdate};
use super::transport::{Disconnect, FeedFrame, FeedStream, FeedTransport, NORMAL_CLOSE};

/// Reason sent with the intentional close on shutdown.
pub const SHUTDOWN_CLOSE_REASON: &str = "monitor stopped";

/// Counters describing the connection's lifetime.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    connects: AtomicU64,
    reconnects_scheduled: AtomicU64,
    messages: AtomicU64,
    dropped: AtomicU64,
    connect_failures: AtomicU64,
    non_retryable_failures: AtomicU64,
}

/// Point-in-time copy of [`ConnectionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStatsSnapshot {
    pub connects: u64,
    pub reconnects_scheduled: u64,
    pub messages: u64,
    pub dropped: u64,
    pub connect_failures: u64,
    /// Connect failures that will recur on every attempt (bad URL and the
    /// like). Reconnects are still scheduled for them.
    pub non_retryable_failures: u64,
}

impl ConnectionStats {
    pub fn snapshot(&self) -> ConnectionStatsSnapshot {
        ConnectionStatsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            reconnects_scheduled: self.reconnects_scheduled.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            non_retryable_failures: self.non_retryable_failures.load(Ordering::Relaxed),
        }
    }
}

/// Why [`FeedConnection::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Shutdown was requested.
    Stopped,
    /// The peer closed the stream normally.
    ClosedCleanly,
}

pub struct FeedConnection {
    transport: Arc<dyn FeedTransport>,
    url: String,
    reconnect_delay: Duration,
    stats: Arc<ConnectionStats>,
}

impl FeedConnection {
    pub fn new(transport: Arc<dyn FeedTransport>, url: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            transport,
            url: url.into(),
            reconnect_delay,
            stats: Arc::new(ConnectionStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Drive the subscription until shutdown or a clean close.
    ///
    /// Flipping `shutdown` to `true` (or dropping its sender) stops the loop
    /// at its next await point, including a pending reconnect delay.
    pub async fn run(
        self,
        store: FeedStore,
        updates: mpsc::UnboundedSender<FeedUpdate>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ConnectionOutcome {
        loop {
            if *shutdown.borrow() {
                return ConnectionOutcome::Stopped;
            }

            let connected = tokio::select! {
                result = self.transport.connect(&self.url) => result,
                _ = shutdown.changed() => return ConnectionOutcome::Stopped,
            };

            match connected {
                Ok(mut stream) => {
                    self.stats.connects.fetch_add(1, Ordering::Relaxed);
                    log::info!("Connected to feed {}", self.url);

                    match self.pump(stream.as_mut(), &store, &updates, &mut shutdown).await {
                        None => {
                            if let Err(e) = stream.close(NORMAL_CLOSE, SHUTDOWN_CLOSE_REASON).await {
                                log::warn!("Failed to close feed cleanly: {}", e);
                            }
                            log::info!("Feed connection closed on shutdown");
                            return ConnectionOutcome::Stopped;
                        }
                        Some(Disconnect::Clean) => {
                            log::info!("Feed closed cleanly by peer, not reconnecting");
                            return ConnectionOutcome::ClosedCleanly;
                        }
                        Some(Disconnect::Abnormal { reason }) => {
                            log::warn!("Feed disconnected abnormally: {}", reason);
                        }
                    }
                }
                Err(e) => {
                    self.stats.connect_failures.fetch_add(1, Ordering::Relaxed);
                    if e.is_retryable() {
                        log::warn!("Feed connect failed: {}", e);
                    } else {
                        self.stats.non_retryable_failures.fetch_add(1, Ordering::Relaxed);
                        log::error!("Feed connect failed and will keep failing: {} {}", e, e.context());
                    }
                }
            }

            self.stats.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);
            log::info!("Reconnecting in {:?}", self.reconnect_delay);
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown.changed() => return ConnectionOutcome::Stopped,
            }
        }
    }

    /// Read frames until the stream ends. Returns `None` on shutdown.
    async fn pump(
        &self,
        stream: &mut dyn FeedStream,
        store: &FeedStore,
        updates: &mpsc::UnboundedSender<FeedUpdate>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Disconnect> {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => return None,
                frame = stream.next_frame() => match frame {
                    FeedFrame::Text(text) => {
                        self.stats.messages.fetch_add(1, Ordering::Relaxed);
                        let update = store.apply_text(&text, Utc::now());
                        if matches!(update, FeedUpdate::Dropped { .. }) {
                            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                        }
                        if updates.send(update).is_err() {
                            log::debug!("Display loop gone, update discarded");
                        }
                    }
                    FeedFrame::Closed(disconnect) => return Some(disconnect),
                },
            }
        }
    }
}
