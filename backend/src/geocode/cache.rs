//! Read-through geocode cache with a fixed expiry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::MonitorError;
use crate::models::Coordinates;
use crate::storage::KeyValueStore;

/// Key prefix of cache entries in the key/value store.
pub const CACHE_KEY_PREFIX: &str = "geocode_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CacheRecord {
    lat: f64,
    lng: f64,
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct GeocodeCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl GeocodeCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl_days: u32) -> Self {
        Self {
            store,
            ttl: Duration::days(i64::from(ttl_days)),
        }
    }

    pub fn key(normalized: &str) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, normalized)
    }

    /// Cached coordinates for a normalized address. Expired entries are
    /// misses; corrupt entries are removed.
    pub fn get(&self, normalized: &str, now: DateTime<Utc>) -> Option<Coordinates> {
        let key = Self::key(normalized);
        let raw = match self.store.get(&key) {
            Ok(raw) => raw?,
            Err(e) => {
                log::warn!("Geocode cache read failed for {}: {}", key, e);
                return None;
            }
        };

        let record = match serde_json::from_str::<CacheRecord>(&raw) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Removing corrupt geocode cache entry {}: {}", key, e);
                if let Err(e) = self.store.remove(&key) {
                    log::warn!("Failed to remove {}: {}", key, e);
                }
                return None;
            }
        };

        if record.expires_at <= now {
            return None;
        }
        Coordinates::checked(Some(record.lat), Some(record.lng))
    }

    pub fn put(&self, normalized: &str, coordinates: Coordinates, now: DateTime<Utc>) {
        let key = Self::key(normalized);
        let record = CacheRecord {
            lat: coordinates.latitude,
            lng: coordinates.longitude,
            expires_at: now + self.ttl,
        };
        let result = serde_json::to_string(&record)
            .map_err(MonitorError::from)
            .and_then(|value| self.store.set(&key, &value));
        if let Err(e) = result {
            log::warn!("Geocode cache write failed for {}: {}", key, e);
        }
    }

    /// Drop expired and corrupt entries. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let keys = match self.store.keys_with_prefix(CACHE_KEY_PREFIX) {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("Geocode cache scan failed: {}", e);
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            let expired = match self.store.get(&key) {
                Ok(Some(raw)) => serde_json::from_str::<CacheRecord>(&raw)
                    .map(|record| record.expires_at <= now)
                    .unwrap_or(true),
                _ => false,
            };
            if expired && self.store.remove(&key).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            log::info!("Purged {} geocode cache entries", removed);
        }
        removed
    }
}
