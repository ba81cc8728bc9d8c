//! Small persisted key/value state.
//!
//! The monitor persists two kinds of string entries across restarts: the
//! last-handled event marker of each side-effect category, and geocode
//! cache entries. Both go through [`KeyValueStore`].

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::MonitorResult;

/// String-keyed, string-valued persistent store.
///
/// Operations are synchronous so that a read and the write it gates can run
/// under one lock.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> MonitorResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> MonitorResult<()>;

    fn remove(&self, key: &str) -> MonitorResult<()>;

    /// All keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> MonitorResult<Vec<String>>;
}
