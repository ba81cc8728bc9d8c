//! OpenCage forward geocoding client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::Geocoder;
use crate::error::{ErrorContext, MonitorError, MonitorResult};
use crate::models::Coordinates;

#[derive(Debug, Deserialize)]
struct OpenCageResponse {
    #[serde(default)]
    results: Vec<OpenCageResult>,
}

#[derive(Debug, Deserialize)]
struct OpenCageResult {
    geometry: OpenCageGeometry,
}

#[derive(Debug, Deserialize)]
struct OpenCageGeometry {
    lat: Value,
    lng: Value,
}

/// Accept a coordinate sent either as a number or as a numeric string.
fn coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct OpenCageGeocoder {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl OpenCageGeocoder {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> MonitorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Geocoder for OpenCageGeocoder {
    async fn geocode(&self, query: &str) -> MonitorResult<Option<Coordinates>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("q", query),
                ("key", self.api_key.as_str()),
                ("language", "ja"),
                ("countrycode", "jp"),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(|e| MonitorError::from(e).with_operation("geocode"))?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("Geocoding '{}' failed with HTTP {}", query, status);
            return Ok(None);
        }

        let body: OpenCageResponse = response.json().await.map_err(|e| {
            MonitorError::side_effect_with_context(
                e.to_string(),
                ErrorContext::new("geocode").with_entity_id(query),
            )
        })?;

        let coordinates = body.results.first().and_then(|result| {
            Coordinates::checked(
                coordinate(&result.geometry.lat),
                coordinate(&result.geometry.lng),
            )
        });
        if coordinates.is_none() {
            log::debug!("No usable geocoding result for '{}'", query);
        }
        Ok(coordinates)
    }
}
