//! Geocoding of regional intensity points for map markers.

pub mod address;
pub mod cache;
pub mod opencage;
pub mod resolver;

pub use address::normalize_address;
pub use cache::GeocodeCache;
pub use opencage::OpenCageGeocoder;
pub use resolver::{IntensityMarker, PointResolver};

use async_trait::async_trait;

use crate::error::MonitorResult;
use crate::models::Coordinates;

/// Forward geocoder: free-text address to a single best match.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` is an explicit "no result".
    async fn geocode(&self, query: &str) -> MonitorResult<Option<Coordinates>>;
}
