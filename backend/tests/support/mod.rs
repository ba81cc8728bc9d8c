//! Shared fakes and fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use eqo_rust::config::MonitorConfig;
use eqo_rust::display::DisplaySnapshot;
use eqo_rust::effects::{EffectCategory, SideEffect, SpeechSynthesizer};
use eqo_rust::error::{ErrorContext, MonitorError, MonitorResult};
use eqo_rust::feed::{FeedFrame, FeedStream, FeedTransport, HistorySource};
use eqo_rust::geocode::Geocoder;
use eqo_rust::models::{format_feed_time, Coordinates, EventIdentity, QuakeReport};

// =============================================================================
// Feed transport
// =============================================================================

/// What one connection attempt yields.
pub enum Session {
    /// The connect call fails with a retryable transport error.
    Fail,
    /// The connect call fails with an error that would recur on every attempt.
    Reject,
    /// The connection succeeds and delivers these frames, then stays idle.
    Frames(Vec<FeedFrame>),
}

/// Transport that plays back scripted sessions. Once the script runs out,
/// connect attempts never complete.
pub struct ScriptedTransport {
    sessions: Mutex<VecDeque<Session>>,
    attempts: AtomicUsize,
    closes: Arc<Mutex<Vec<(u16, String)>>>,
}

impl ScriptedTransport {
    pub fn new(sessions: Vec<Session>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(sessions.into()),
            attempts: AtomicUsize::new(0),
            closes: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// A single connection that delivers `frames`.
    pub fn single(frames: Vec<FeedFrame>) -> Arc<Self> {
        Self::new(vec![Session::Frames(frames)])
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Close frames sent by the client, as (code, reason).
    pub fn closes(&self) -> Vec<(u16, String)> {
        self.closes.lock().clone()
    }
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    async fn connect(&self, _url: &str) -> MonitorResult<Box<dyn FeedStream>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let session = self.sessions.lock().pop_front();
        match session {
            Some(Session::Fail) => Err(MonitorError::transport("connection refused")),
            Some(Session::Reject) => Err(MonitorError::transport_with_context(
                "unsupported URL scheme",
                ErrorContext::new("connect_feed"),
            )),
            Some(Session::Frames(frames)) => Ok(Box::new(ScriptedStream {
                frames: frames.into(),
                closes: Arc::clone(&self.closes),
            })),
            None => std::future::pending().await,
        }
    }
}

struct ScriptedStream {
    frames: VecDeque<FeedFrame>,
    closes: Arc<Mutex<Vec<(u16, String)>>>,
}

#[async_trait]
impl FeedStream for ScriptedStream {
    async fn next_frame(&mut self) -> FeedFrame {
        match self.frames.pop_front() {
            Some(frame) => frame,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> MonitorResult<()> {
        self.closes.lock().push((code, reason.to_string()));
        Ok(())
    }
}

// =============================================================================
// History, speech, geocoding
// =============================================================================

pub struct StaticHistory(pub Vec<Value>);

#[async_trait]
impl HistorySource for StaticHistory {
    async fn fetch(&self, limit: u32) -> MonitorResult<Vec<Value>> {
        Ok(self.0.iter().take(limit as usize).cloned().collect())
    }
}

pub struct SilentSpeech;

#[async_trait]
impl SpeechSynthesizer for SilentSpeech {
    async fn synthesize(&self, _text: &str) -> MonitorResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Geocoder resolving every address to the same point.
pub struct FixedGeocoder {
    pub lookups: AtomicUsize,
}

impl FixedGeocoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            lookups: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn geocode(&self, _query: &str) -> MonitorResult<Option<Coordinates>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Coordinates {
            latitude: 35.69,
            longitude: 139.69,
        }))
    }
}

// =============================================================================
// Side effects
// =============================================================================

/// Records every identity it fires for.
pub struct RecordingEffect {
    category: EffectCategory,
    fired: Mutex<Vec<EventIdentity>>,
}

impl RecordingEffect {
    pub fn new(category: EffectCategory) -> Arc<Self> {
        Arc::new(Self {
            category,
            fired: Mutex::new(Vec::new()),
        })
    }

    pub fn fired(&self) -> Vec<EventIdentity> {
        self.fired.lock().clone()
    }
}

#[async_trait]
impl SideEffect for RecordingEffect {
    fn category(&self) -> EffectCategory {
        self.category
    }

    async fn fire(&self, report: &QuakeReport) -> MonitorResult<()> {
        self.fired.lock().push(report.identity());
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Feed timestamp `minutes_ago` minutes before now.
pub fn feed_time(minutes_ago: i64) -> String {
    format_feed_time(Utc::now() - ChronoDuration::minutes(minutes_ago))
}

pub fn quake_value(time: &str, max_scale: i32) -> Value {
    json!({
        "code": 551,
        "time": time,
        "earthquake": {
            "time": time,
            "maxScale": max_scale,
            "domesticTsunami": "None",
            "hypocenter": {"name": "茨城県南部", "latitude": 36.1, "longitude": 140.1, "depth": 50, "magnitude": 4.8}
        },
        "points": []
    })
}

pub fn quake_frame(time: &str, max_scale: i32) -> FeedFrame {
    FeedFrame::Text(quake_value(time, max_scale).to_string())
}

pub fn quake(time: &str, max_scale: i32) -> QuakeReport {
    serde_json::from_value(quake_value(time, max_scale)).unwrap()
}

/// Configuration with fast pacing and no external endpoints in use.
pub fn test_config() -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.geocode.pacing_ms = 10;
    config.geocode.api_key = None;
    config
}

/// Wait (in real time, up to five seconds) for a snapshot matching `pred`.
pub async fn wait_for<F>(rx: &mut watch::Receiver<DisplaySnapshot>, mut pred: F) -> DisplaySnapshot
where
    F: FnMut(&DisplaySnapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        {
            let snapshot = rx.borrow_and_update();
            if pred(&snapshot) {
                return snapshot.clone();
            }
        }
        match tokio::time::timeout_at(deadline, rx.changed()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => panic!("display channel closed"),
            Err(_) => panic!("timed out waiting for display state: {:?}", rx.borrow().clone()),
        }
    }
}

/// Let spawned tasks run to their next await point.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
