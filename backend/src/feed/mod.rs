//! Live feed ingestion: the shared store, its history buffer, the
//! WebSocket connection and the startup snapshot.

pub mod bootstrap;
pub mod connection;
pub mod history;
pub mod store;
pub mod transport;

pub use bootstrap::{HistoryBootstrapper, HistorySource, HttpHistorySource};
pub use connection::{ConnectionOutcome, ConnectionStats, ConnectionStatsSnapshot, FeedConnection};
pub use history::{ArrivalSeq, EntryOrigin, HistoryBuffer, HistoryEntry, HistoryLimits, Insertion};
pub use store::{FeedStore, FeedUpdate, LatestQuake};
pub use transport::{Disconnect, FeedFrame, FeedStream, FeedTransport, WebSocketTransport};
