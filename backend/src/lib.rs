//! # EQO Rust Backend
//!
//! Live earthquake and tsunami feed monitor.
//!
//! The crate subscribes to the P2PQuake real-time feed, keeps a deduplicated,
//! time-windowed history of quake reports, decides what a display should
//! currently show, and fires one-shot side effects (notification cue and
//! spoken announcement) exactly once per event.
//!
//! ## Features
//!
//! - **Feed ingestion**: WebSocket subscription with fixed-delay reconnect
//!   and a startup history snapshot merged over HTTP
//! - **History**: newest-first buffer with a count cap and a calendar-day
//!   age window, unique per event identity
//! - **Display state**: live view, a pinned history entry with an
//!   auto-reverting countdown, and an independent early-warning overlay
//! - **Side effects**: at-most-once dispatch guarded by persisted markers
//! - **Geocoding**: cached, rate-paced resolution of regional intensity
//!   points into map markers
//! - **HTTP API**: JSON and SSE endpoints for a display front-end
//!
//! ## Architecture
//!
//! - [`models`]: feed message types, intensity scales and feed time handling
//! - [`feed`]: shared feed state, history buffer, connection and bootstrap
//! - [`display`]: display controller, view payloads and the countdown timer
//! - [`effects`]: side-effect dispatch, announcement text and speech synthesis
//! - [`geocode`]: address normalization, geocode cache and point resolution
//! - [`storage`]: persisted key/value state
//! - [`services`]: the monitor runtime tying everything together
//! - [`http`]: Axum-based HTTP server and request handlers
//!

// MonitorError carries a rich ErrorContext for debugging
#![allow(clippy::result_large_err)]

pub mod config;
pub mod display;
pub mod effects;
pub mod error;
pub mod feed;
pub mod geocode;
pub mod models;
pub mod services;
pub mod storage;

#[cfg(feature = "http-server")]
pub mod http;

pub use config::MonitorConfig;
pub use error::{MonitorError, MonitorResult};
pub use services::{MonitorBuilder, MonitorHandle, QuakeMonitor};
