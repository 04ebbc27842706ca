//! OSRM `/route` client.
//!
//! The HTTP call and the response parsing are split so the parser can be
//! tested against canned payloads without a running OSRM.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use super::{RouteProvider, RouteResult, RoutingError};
use crate::geo::Coord;

pub const DEFAULT_OSRM_ENDPOINT: &str = "https://router.project-osrm.org";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Routes via an OSRM HTTP endpoint.
#[derive(Debug, Clone)]
pub struct OsrmRouteProvider {
    client: Client,
    endpoint: String,
}

impl OsrmRouteProvider {
    /// Create a client for the given OSRM endpoint (e.g. `http://localhost:5000`).
    /// Every request is bounded by `timeout`; a timeout is reported as
    /// [`RoutingError::Timeout`].
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, RoutingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RoutingError::Request(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn route_url(&self, from: Coord, to: Coord) -> Result<Url, RoutingError> {
        let base = format!(
            "{}/route/v1/driving/{:.6},{:.6};{:.6},{:.6}",
            self.endpoint, from.lng, from.lat, to.lng, to.lat,
        );
        let mut url = Url::parse(&base)
            .map_err(|err| RoutingError::Request(format!("failed to build OSRM URL: {err}")))?;
        url.query_pairs_mut()
            .append_pair("overview", "full")
            .append_pair("geometries", "geojson");
        Ok(url)
    }
}

#[async_trait]
impl RouteProvider for OsrmRouteProvider {
    async fn route(&self, from: Coord, to: Coord) -> Result<RouteResult, RoutingError> {
        let url = self.route_url(from, to)?;
        let started = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        // OSRM answers 400 with a JSON body for NoRoute/InvalidQuery; parse those.
        if status.is_server_error() {
            return Err(RoutingError::Status(status.as_u16()));
        }
        let parsed: OsrmRouteResponse = response.json().await?;
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            code = %parsed.code,
            "osrm route response"
        );
        parse_route_response(parsed)
    }
}

/// Minimal OSRM JSON response structures.
#[derive(Debug, Deserialize)]
pub(crate) struct OsrmRouteResponse {
    pub(crate) code: String,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OsrmRoute {
    pub(crate) distance: f64, // metres
    pub(crate) duration: f64, // seconds
    pub(crate) geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OsrmGeometry {
    pub(crate) coordinates: Vec<[f64; 2]>, // [lng, lat]
}

pub(crate) fn parse_route_response(resp: OsrmRouteResponse) -> Result<RouteResult, RoutingError> {
    match resp.code.as_str() {
        "Ok" => {}
        "NoRoute" => return Err(RoutingError::NoRoute),
        _ => {
            return Err(RoutingError::Api {
                code: resp.code,
                message: resp.message.unwrap_or_default(),
            })
        }
    }

    let route = resp.routes.into_iter().next().ok_or(RoutingError::NoRoute)?;

    // OSRM returns [lng, lat]; we store (lat, lng)
    let geometry = route
        .geometry
        .coordinates
        .iter()
        .map(|c| Coord::new(c[1], c[0]))
        .collect();

    Ok(RouteResult {
        geometry,
        distance_km: route.distance / 1000.0,
        duration_secs: route.duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> OsrmRouteResponse {
        serde_json::from_str(json).expect("valid osrm payload")
    }

    #[test]
    fn parse_route_response_converts_units_and_axis_order() {
        let parsed = parse_route_response(response(
            r#"{"code":"Ok","routes":[{"distance":3712.4,"duration":512.0,
                "geometry":{"coordinates":[[-79.8946,-2.1552],[-79.8765,-2.1815]]}}]}"#,
        ))
        .expect("route");

        assert!((parsed.distance_km - 3.7124).abs() < 1e-9);
        assert_eq!(parsed.duration_secs, 512.0);
        assert_eq!(parsed.geometry[0], Coord::new(-2.1552, -79.8946));
        assert_eq!(parsed.geometry.len(), 2);
    }

    #[test]
    fn parse_route_response_maps_no_route() {
        let err = parse_route_response(response(r#"{"code":"NoRoute","routes":[]}"#))
            .expect_err("no route");
        assert!(matches!(err, RoutingError::NoRoute));
    }

    #[test]
    fn parse_route_response_keeps_api_message() {
        let err = parse_route_response(response(
            r#"{"code":"InvalidQuery","message":"Query string malformed"}"#,
        ))
        .expect_err("api error");
        match err {
            RoutingError::Api { code, message } => {
                assert_eq!(code, "InvalidQuery");
                assert_eq!(message, "Query string malformed");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn parse_route_response_requires_a_route() {
        let err = parse_route_response(response(r#"{"code":"Ok","routes":[]}"#))
            .expect_err("empty routes");
        assert!(matches!(err, RoutingError::NoRoute));
    }

    #[test]
    fn route_url_uses_lng_lat_order() {
        let provider =
            OsrmRouteProvider::new("http://localhost:5000/", DEFAULT_REQUEST_TIMEOUT).expect("client");
        let url = provider
            .route_url(Coord::new(-2.1552, -79.8946), Coord::new(-2.1815, -79.8765))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/route/v1/driving/-79.894600,-2.155200;-79.876500,-2.181500?overview=full&geometries=geojson"
        );
    }
}
