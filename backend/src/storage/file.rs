//! JSON-file backed key/value store.
//!
//! The whole map lives in memory and every mutation rewrites the file
//! through a temp file in the same directory followed by a rename, so a
//! crash never leaves a half-written state file behind.
//!
//! Writes stay synchronous so callers can read and update under one lock.
//! On a multi-threaded runtime they run through `block_in_place`, which hands
//! the worker's other tasks to another thread for the duration of the write.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::runtime::{Handle, RuntimeFlavor};

use super::KeyValueStore;
use crate::error::{ErrorContext, MonitorError, MonitorResult};

/// File name used inside the state directory.
pub const STATE_FILE_NAME: &str = "state.json";

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or create) the store at `<state_dir>/state.json`.
    pub fn open_dir<P: AsRef<Path>>(state_dir: P) -> MonitorResult<Self> {
        let dir = state_dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            MonitorError::storage_with_context(
                e.to_string(),
                ErrorContext::new("open_state_dir").with_entity_id(dir.display()),
            )
        })?;
        Self::open(dir.join(STATE_FILE_NAME))
    }

    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable one is logged and replaced on the next write.
    pub fn open<P: AsRef<Path>>(path: P) -> MonitorResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!(
                        "State file {} is corrupt, starting empty: {}",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(MonitorError::storage_with_context(
                    e.to_string(),
                    ErrorContext::new("open_state_file").with_entity_id(path.display()),
                ))
            }
        };

        log::debug!("Opened state file {} ({} entries)", path.display(), entries.len());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> MonitorResult<()> {
        let data = serde_json::to_vec_pretty(entries)?;
        run_blocking(|| atomic_write(&self.path, &data))
    }
}

/// Run blocking file I/O without stalling the current runtime worker.
/// Outside a runtime, or on a current-thread runtime, `f` runs inline.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> MonitorResult<()> {
    let context = || ErrorContext::new("write_state_file").with_entity_id(path.display());
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let temp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| MonitorError::storage_with_context(e.to_string(), context()))?;
    fs::write(temp.path(), data)
        .map_err(|e| MonitorError::storage_with_context(e.to_string(), context()))?;
    temp.persist(path)
        .map_err(|e| MonitorError::storage_with_context(e.to_string(), context()))?;
    Ok(())
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> MonitorResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> MonitorResult<()> {
        let mut entries = self.entries.lock();
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&entries) {
            // keep memory and disk in agreement
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> MonitorResult<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> MonitorResult<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
