//! Pluggable route providers: trait abstraction for routing backends.
//!
//! Two implementations, selectable via [`RouteProviderKind`]:
//!
//! - **`StraightLineRouteProvider`**: Haversine leg at a fixed speed. Zero dependencies.
//! - **`OsrmRouteProvider`**: Calls a local/remote OSRM HTTP endpoint.
//!
//! Callers hold providers as `Arc<dyn RouteProvider>`. The TTL route cache in
//! [`crate::eta::CachedRouteProvider`] wraps any of them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::geo::{haversine_km, Coord};

pub mod error;
pub mod osrm;

pub use error::RoutingError;
pub use osrm::OsrmRouteProvider;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Result of a route query between two coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    /// Lat/lng points along the road (two points for straight-line routes).
    pub geometry: Vec<Coord>,
    /// Road-network distance in kilometres.
    pub distance_km: f64,
    /// Free-flow travel time in seconds as reported by the provider.
    pub duration_secs: f64,
}

/// Which routing backend to use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RouteProviderKind {
    /// Haversine leg at [`STRAIGHT_LINE_SPEED_KMH`], no network.
    StraightLine,
    /// OSRM HTTP endpoint (e.g. `"http://localhost:5000"`).
    Osrm { endpoint: String, timeout: Duration },
}

impl Default for RouteProviderKind {
    fn default() -> Self {
        Self::Osrm {
            endpoint: osrm::DEFAULT_OSRM_ENDPOINT.to_string(),
            timeout: osrm::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Trait for routing backends. Implementations must be `Send + Sync` so one
/// provider can serve concurrent requests.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Compute a route between two coordinates. Timeouts and upstream outages
    /// are errors; there is no silent zero-distance result.
    async fn route(&self, from: Coord, to: Coord) -> Result<RouteResult, RoutingError>;
}

#[async_trait]
impl<P: RouteProvider + ?Sized> RouteProvider for Arc<P> {
    async fn route(&self, from: Coord, to: Coord) -> Result<RouteResult, RoutingError> {
        (**self).route(from, to).await
    }
}

// ---------------------------------------------------------------------------
// Straight-line provider (always available)
// ---------------------------------------------------------------------------

/// Average speed assumed for straight-line durations.
pub const STRAIGHT_LINE_SPEED_KMH: f64 = 40.0;

/// Routes as the crow flies: haversine distance, two-point geometry.
#[derive(Debug, Default, Clone, Copy)]
pub struct StraightLineRouteProvider;

impl StraightLineRouteProvider {
    pub fn leg(from: Coord, to: Coord) -> RouteResult {
        let distance_km = haversine_km(from, to);
        let duration_secs = if distance_km > 0.0 {
            (distance_km / STRAIGHT_LINE_SPEED_KMH) * 3600.0
        } else {
            0.0
        };
        RouteResult {
            geometry: vec![from, to],
            distance_km,
            duration_secs,
        }
    }
}

#[async_trait]
impl RouteProvider for StraightLineRouteProvider {
    async fn route(&self, from: Coord, to: Coord) -> Result<RouteResult, RoutingError> {
        Ok(Self::leg(from, to))
    }
}

// ---------------------------------------------------------------------------
// Factory: build a provider from RouteProviderKind
// ---------------------------------------------------------------------------

/// Construct a shared [`RouteProvider`] from a [`RouteProviderKind`] descriptor.
pub fn build_route_provider(kind: &RouteProviderKind) -> Result<Arc<dyn RouteProvider>, RoutingError> {
    match kind {
        RouteProviderKind::StraightLine => Ok(Arc::new(StraightLineRouteProvider)),
        RouteProviderKind::Osrm { endpoint, timeout } => {
            Ok(Arc::new(OsrmRouteProvider::new(endpoint, *timeout)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn straight_line_provider_returns_haversine_leg() {
        let from = Coord::new(-2.1552, -79.8946);
        let to = Coord::new(-2.1815, -79.8765);
        let route = StraightLineRouteProvider.route(from, to).await.expect("route");
        assert_eq!(route.geometry, vec![from, to]);
        assert!((route.distance_km - haversine_km(from, to)).abs() < 1e-12);
        assert!(route.duration_secs > 0.0);
    }

    #[tokio::test]
    async fn straight_line_zero_length_route_has_zero_duration() {
        let point = Coord::new(-2.1552, -79.8946);
        let route = StraightLineRouteProvider.route(point, point).await.expect("route");
        assert_eq!(route.distance_km, 0.0);
        assert_eq!(route.duration_secs, 0.0);
    }

    #[test]
    fn default_kind_is_osrm() {
        assert!(matches!(
            RouteProviderKind::default(),
            RouteProviderKind::Osrm { .. }
        ));
    }

    #[test]
    fn build_route_provider_straight_line() {
        assert!(build_route_provider(&RouteProviderKind::StraightLine).is_ok());
    }
}
