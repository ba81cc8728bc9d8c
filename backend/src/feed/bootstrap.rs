//! Startup history snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::store::{FeedStore, FeedUpdate};
use crate::config::HistorySettings;
use crate::error::{MonitorError, MonitorResult};
use crate::models::{parse_feed_time, window_cutoff, FeedMessage, QuakeReport};

/// Request/response source of recent feed records.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch up to `limit` recent records, newest first, in feed JSON shape.
    async fn fetch(&self, limit: u32) -> MonitorResult<Vec<Value>>;
}

/// History endpoint reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpHistorySource {
    client: reqwest::Client,
    url: String,
}

impl HttpHistorySource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> MonitorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl HistorySource for HttpHistorySource {
    async fn fetch(&self, limit: u32) -> MonitorResult<Vec<Value>> {
        let records = self
            .client
            .get(&self.url)
            .query(&[("limit", limit)])
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Value>>()
            .await
            .map_err(|e| MonitorError::from(e).with_operation("fetch_history"))?;
        Ok(records)
    }
}

/// Pre-populates the history buffer once at startup.
pub struct HistoryBootstrapper {
    source: Arc<dyn HistorySource>,
    limit: u32,
    window_days: u32,
    max_entries: usize,
}

impl HistoryBootstrapper {
    pub fn new(source: Arc<dyn HistorySource>, settings: &HistorySettings) -> Self {
        Self {
            source,
            limit: settings.limit,
            window_days: settings.window_days,
            max_entries: settings.max_entries,
        }
    }

    /// Fetch, filter and merge the snapshot. Failures are logged and merge
    /// nothing.
    pub async fn run(&self, store: &FeedStore, now: DateTime<Utc>) -> FeedUpdate {
        let reports = match self.collect(now).await {
            Ok(reports) => reports,
            Err(e) => {
                log::error!("History bootstrap failed: {}", e);
                Vec::new()
            }
        };
        store.merge_bootstrap(reports, now)
    }

    /// Quake reports inside the bootstrap window, capped, in source order.
    pub async fn collect(&self, now: DateTime<Utc>) -> MonitorResult<Vec<QuakeReport>> {
        let records = self
            .source
            .fetch(self.limit)
            .await
            .map_err(|e| e.with_operation("fetch_history"))?;
        let cutoff = window_cutoff(now, self.window_days);
        let fetched = records.len();

        let reports: Vec<QuakeReport> = records
            .into_iter()
            .filter_map(|record| match FeedMessage::from_value(record) {
                Ok(FeedMessage::QuakeReport(report)) => Some(report),
                Ok(_) => None,
                Err(MonitorError::UnsupportedEvent { .. }) => None,
                Err(e) => {
                    log::warn!("Skipping malformed history record: {}", e);
                    None
                }
            })
            .filter(|report| parse_feed_time(&report.time).is_some_and(|t| t >= cutoff))
            .take(self.max_entries)
            .collect();

        log::info!(
            "History snapshot: {} records fetched, {} quake reports kept",
            fetched,
            reports.len()
        );
        Ok(reports)
    }
}
