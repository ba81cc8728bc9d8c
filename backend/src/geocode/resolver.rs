//! Resolves the regional intensity points of a report into map markers.
//!
//! Cached addresses resolve at once. Uncached addresses are all scheduled
//! together but staggered: the i-th distinct lookup starts `i * pacing`
//! after the first, keeping outbound traffic under the provider's rate
//! limit. Any lookup may fail on its own; failed points are simply left
//! off the map.

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::address::normalize_address;
use super::cache::GeocodeCache;
use super::Geocoder;
use crate::models::{Coordinates, IntensityPoint, SeismicIntensity};

/// A regional intensity point with resolved coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntensityMarker {
    pub addr: String,
    pub pref: String,
    pub scale: i32,
    pub intensity_label: &'static str,
    pub is_area: bool,
    pub latitude: f64,
    pub longitude: f64,
}

impl IntensityMarker {
    fn new(point: &IntensityPoint, coordinates: Coordinates) -> Self {
        Self {
            addr: point.addr.clone(),
            pref: point.pref.clone(),
            scale: point.scale,
            intensity_label: SeismicIntensity::from_scale(point.scale).label(),
            is_area: point.is_area,
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
        }
    }
}

#[derive(Clone)]
pub struct PointResolver {
    cache: GeocodeCache,
    geocoder: Option<Arc<dyn Geocoder>>,
    pacing: Duration,
}

impl PointResolver {
    pub fn new(cache: GeocodeCache, geocoder: Option<Arc<dyn Geocoder>>, pacing: Duration) -> Self {
        if geocoder.is_none() {
            log::warn!("No geocoder configured; only cached intensity markers will be shown");
        }
        Self {
            cache,
            geocoder,
            pacing,
        }
    }

    /// Resolve `points` into markers, preserving input order and omitting
    /// points that could not be resolved.
    pub async fn resolve(&self, points: &[IntensityPoint]) -> Vec<IntensityMarker> {
        let now = Utc::now();
        let normalized: Vec<String> = points
            .iter()
            .map(|p| normalize_address(&p.addr, &p.pref))
            .collect();

        let mut resolved: HashMap<String, Coordinates> = HashMap::new();
        let mut misses: Vec<String> = Vec::new();
        for query in &normalized {
            if query.is_empty() || resolved.contains_key(query) || misses.contains(query) {
                continue;
            }
            match self.cache.get(query, now) {
                Some(coordinates) => {
                    resolved.insert(query.clone(), coordinates);
                }
                None => misses.push(query.clone()),
            }
        }

        if let Some(geocoder) = &self.geocoder {
            let lookups = misses.iter().enumerate().map(|(i, query)| {
                let geocoder = Arc::clone(geocoder);
                let delay = self.pacing * i as u32;
                async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let result = geocoder.geocode(query).await;
                    (query, result)
                }
            });

            for (query, result) in join_all(lookups).await {
                match result {
                    Ok(Some(coordinates)) => {
                        self.cache.put(query, coordinates, Utc::now());
                        resolved.insert(query.clone(), coordinates);
                    }
                    Ok(None) => log::debug!("No geocode result for '{}'", query),
                    Err(e) => log::warn!("Geocoding '{}' failed: {}", query, e),
                }
            }
        }

        points
            .iter()
            .zip(&normalized)
            .filter_map(|(point, query)| {
                resolved
                    .get(query)
                    .map(|coordinates| IntensityMarker::new(point, *coordinates))
            })
            .collect()
    }
}
