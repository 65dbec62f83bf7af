use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::BookingError;

/// Mean Earth radius used by the geodesic fallback
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Reject NaN/infinite values and anything outside the WGS84 ranges
    pub fn validate(&self, label: &str) -> Result<(), BookingError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(BookingError::Validation(format!(
                "{} latitude must be between -90 and 90",
                label
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(BookingError::Validation(format!(
                "{} longitude must be between -180 and 180",
                label
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("Routing service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Routing service error: {0}")]
    Service(String),

    #[error("Routing service returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// Computes the route distance in kilometres between two points
#[async_trait]
pub trait DistanceResolver: Send + Sync {
    async fn resolve(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<f64, ResolutionError>;
}

/// Great-circle distance in kilometres
pub fn haversine_km(origin: Coordinates, destination: Coordinates) -> f64 {
    let lat1 = origin.latitude.to_radians();
    let lat2 = destination.latitude.to_radians();
    let dlat = (destination.latitude - origin.latitude).to_radians();
    let dlon = (destination.longitude - origin.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Haversine resolver; never fails
#[derive(Debug, Clone, Copy, Default)]
pub struct GeodesicResolver;

#[async_trait]
impl DistanceResolver for GeodesicResolver {
    async fn resolve(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<f64, ResolutionError> {
        Ok(haversine_km(origin, destination))
    }
}

/// Wraps an optional routing service with a bounded wait and a geodesic fallback.
///
/// Upstream failures are recovered here and never reach the caller.
#[derive(Clone)]
pub struct FallbackResolver {
    primary: Option<Arc<dyn DistanceResolver>>,
    timeout: Duration,
}

impl FallbackResolver {
    pub fn new(primary: Arc<dyn DistanceResolver>, timeout: Duration) -> Self {
        Self {
            primary: Some(primary),
            timeout,
        }
    }

    pub fn geodesic_only() -> Self {
        Self {
            primary: None,
            timeout: Duration::ZERO,
        }
    }

    pub async fn distance_km(&self, origin: Coordinates, destination: Coordinates) -> f64 {
        if let Some(primary) = &self.primary {
            match tokio::time::timeout(self.timeout, primary.resolve(origin, destination)).await {
                Ok(Ok(km)) if km.is_finite() && km >= 0.0 => return km,
                Ok(Ok(km)) => {
                    warn!(km, "Routing service returned an unusable distance, using geodesic fallback")
                }
                Ok(Err(e)) => warn!(error = %e, "Routing service failed, using geodesic fallback"),
                Err(_) => warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Routing service timed out, using geodesic fallback"
                ),
            }
        }
        haversine_km(origin, destination)
    }

    /// Sum of leg distances along an ordered list of points
    pub async fn route_distance_km(&self, points: &[Coordinates]) -> f64 {
        let mut total = 0.0;
        for leg in points.windows(2) {
            total += self.distance_km(leg[0], leg[1]).await;
        }
        total
    }
}

impl Default for FallbackResolver {
    fn default() -> Self {
        Self::geodesic_only()
    }
}

#[async_trait]
impl DistanceResolver for FallbackResolver {
    async fn resolve(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<f64, ResolutionError> {
        Ok(self.distance_km(origin, destination).await)
    }
}
