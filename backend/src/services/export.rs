//! History export to a JSON file.

use std::path::{Path, PathBuf};

use crate::error::{ErrorContext, MonitorError, MonitorResult};
use crate::feed::FeedStore;

/// File name used when the export target is a directory.
pub const DEFAULT_EXPORT_FILE_NAME: &str = "earthquake_data.json";

/// Resolve the export target: a directory gets the default file name.
pub fn export_path(target: &Path) -> PathBuf {
    if target.is_dir() {
        target.join(DEFAULT_EXPORT_FILE_NAME)
    } else {
        target.to_path_buf()
    }
}

/// Write the buffered history as a pretty JSON array, newest first.
/// Returns the path written.
pub async fn write_history_export(store: &FeedStore, target: &Path) -> MonitorResult<PathBuf> {
    let json = store.export_history_json()?;
    let path = export_path(target);

    tokio::fs::write(&path, json.as_bytes()).await.map_err(|e| {
        MonitorError::storage_with_context(
            e.to_string(),
            ErrorContext::new("export_history").with_entity_id(path.display()),
        )
    })?;

    log::info!(
        "Exported {} history entries to {}",
        store.history_len(),
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::HistoryLimits;
    use crate::models::FeedMessage;
    use chrono::Utc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_export_into_directory_uses_default_name() {
        let dir = TempDir::new().unwrap();
        let store = FeedStore::new(HistoryLimits::default());
        let now = Utc::now();
        let time = crate::models::format_feed_time(now);
        let message = FeedMessage::parse(
            &serde_json::json!({"code": 551, "time": time, "earthquake": {"maxScale": 30}}).to_string(),
        )
        .unwrap();
        store.apply(message, now);

        let path = write_history_export(&store, dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join(DEFAULT_EXPORT_FILE_NAME));

        let written: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0]["code"], 551);
    }

    #[tokio::test]
    async fn test_export_to_explicit_file() {
        let dir = TempDir::new().unwrap();
        let store = FeedStore::new(HistoryLimits::default());
        let target = dir.path().join("quakes.json");

        let path = write_history_export(&store, &target).await.unwrap();
        assert_eq!(path, target);
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }
}
