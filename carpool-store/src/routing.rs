use async_trait::async_trait;
use carpool_core::{Coordinates, DistanceResolver, ResolutionError};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Road distance from an OSRM-compatible `/route/v1/driving` endpoint
pub struct OsrmResolver {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    /// Metres
    distance: f64,
}

impl OsrmResolver {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ResolutionError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ResolutionError::Service(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn route_url(&self, origin: &Coordinates, destination: &Coordinates) -> String {
        // OSRM takes lon,lat pairs
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=false",
            self.base_url,
            origin.longitude,
            origin.latitude,
            destination.longitude,
            destination.latitude
        )
    }
}

fn distance_km(body: RouteResponse) -> Result<f64, ResolutionError> {
    if body.code != "Ok" {
        return Err(ResolutionError::InvalidResponse(format!(
            "routing service answered '{}'",
            body.code
        )));
    }
    let route = body
        .routes
        .first()
        .ok_or_else(|| ResolutionError::InvalidResponse("no route returned".into()))?;
    Ok(route.distance / 1000.0)
}

#[async_trait]
impl DistanceResolver for OsrmResolver {
    async fn resolve(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<f64, ResolutionError> {
        let url = self.route_url(&origin, &destination);
        debug!(url = %url, "Requesting route distance");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ResolutionError::Service(e.to_string()))?
            .error_for_status()
            .map_err(|e| ResolutionError::Service(e.to_string()))?;

        let body: RouteResponse = response
            .json()
            .await
            .map_err(|e| ResolutionError::InvalidResponse(e.to_string()))?;

        distance_km(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_url_uses_lon_lat_order() {
        let resolver = OsrmResolver::new("http://osrm.local/", Duration::from_secs(1)).unwrap();
        let url = resolver.route_url(
            &Coordinates::new(12.97, 77.59),
            &Coordinates::new(13.03, 77.62),
        );
        assert_eq!(
            url,
            "http://osrm.local/route/v1/driving/77.59,12.97;77.62,13.03?overview=false"
        );
    }

    #[test]
    fn test_distance_from_response() {
        let body: RouteResponse =
            serde_json::from_str(r#"{"code":"Ok","routes":[{"distance":18250.5,"duration":1500}]}"#)
                .unwrap();
        assert!((distance_km(body).unwrap() - 18.2505).abs() < 1e-9);

        let body: RouteResponse = serde_json::from_str(r#"{"code":"NoRoute"}"#).unwrap();
        assert!(matches!(distance_km(body), Err(ResolutionError::InvalidResponse(_))));
    }
}
