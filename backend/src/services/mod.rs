//! Service layer: the long-running monitor and the history export.
//!
//! This is where the feed, display, effects and geocoding modules are
//! composed into one process. Callers (the binary, the HTTP layer, tests)
//! interact with it through a [`MonitorHandle`].

pub mod export;
pub mod monitor;

pub use export::{write_history_export, DEFAULT_EXPORT_FILE_NAME};
pub use monitor::{MonitorBuilder, MonitorHandle, QuakeMonitor};
