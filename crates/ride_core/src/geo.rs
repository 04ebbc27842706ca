//! Geo utilities: coordinates, great-circle and planar distances, parsing.
//!
//! This module provides:
//!
//! - **Coord**: WGS84 latitude/longitude pair used across the crate
//! - **Distances**: Haversine (km) and planar (degrees) distance
//! - **Parsing**: literal `"lat, lng"` coordinate pairs typed by the rider
//! - **Quantization**: fixed-precision rounding used for cache keys
//! - **BoundingBox**: camera framing and search-region scoping
//!
//! Everything here is pure; no function holds state.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for all great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Latitude/longitude in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coord {
    pub lat: f64,
    pub lng: f64,
}

impl Coord {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both components are finite and inside WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Return a copy shifted by the given degree offsets.
    pub fn offset(&self, dlat: f64, dlng: f64) -> Self {
        Self::new(self.lat + dlat, self.lng + dlng)
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: Coord, b: Coord) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Euclidean distance in raw degrees: `sqrt(Δlat² + Δlng²)`.
///
/// Only meaningful for ranking nearby points against each other; it is not a
/// length and distorts away from the equator.
pub fn planar_distance(a: Coord, b: Coord) -> f64 {
    let dlat = a.lat - b.lat;
    let dlng = a.lng - b.lng;
    (dlat * dlat + dlng * dlng).sqrt()
}

/// Round `value` to `decimals` places and return it as a scaled integer.
///
/// Four decimals is roughly 11 m of latitude, which is the cache-key grid.
pub fn quantize(value: f64, decimals: u32) -> i64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() as i64
}

/// Parse a literal coordinate pair such as `"-2.1552, -79.8946"`.
///
/// Accepts comma, semicolon or whitespace separators. Returns `None` unless
/// exactly two numbers are present and they form a valid coordinate.
pub fn parse_coordinate_pair(input: &str) -> Option<Coord> {
    let parts: Vec<&str> = input
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect();
    if parts.len() != 2 {
        return None;
    }
    let lat = parts[0].parse::<f64>().ok()?;
    let lng = parts[1].parse::<f64>().ok()?;
    let coord = Coord::new(lat, lng);
    coord.is_valid().then_some(coord)
}

/// Move `from` toward `to` by at most `step` degrees along the straight line.
///
/// Lands exactly on `to` when the remaining distance is within one step.
pub fn step_toward(from: Coord, to: Coord, step: f64) -> Coord {
    let remaining = planar_distance(from, to);
    if remaining <= step || remaining == 0.0 {
        return to;
    }
    let ratio = step / remaining;
    Coord::new(
        from.lat + (to.lat - from.lat) * ratio,
        from.lng + (to.lng - from.lng) * ratio,
    )
}

/// A coordinate with the free-text address the rider sees for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub text: String,
    pub coord: Coord,
}

impl Place {
    pub fn new(text: impl Into<String>, coord: Coord) -> Self {
        Self {
            text: text.into(),
            coord,
        }
    }
}

/// Axis-aligned lat/lng rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Smallest box containing every point, or `None` for an empty slice.
    pub fn from_points(points: &[Coord]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Self {
            min_lat: first.lat,
            min_lng: first.lng,
            max_lat: first.lat,
            max_lng: first.lng,
        };
        for point in &points[1..] {
            bounds.min_lat = bounds.min_lat.min(point.lat);
            bounds.min_lng = bounds.min_lng.min(point.lng);
            bounds.max_lat = bounds.max_lat.max(point.lat);
            bounds.max_lng = bounds.max_lng.max(point.lng);
        }
        Some(bounds)
    }

    /// Grow every side by `degrees`.
    pub fn padded(self, degrees: f64) -> Self {
        Self {
            min_lat: self.min_lat - degrees,
            min_lng: self.min_lng - degrees,
            max_lat: self.max_lat + degrees,
            max_lng: self.max_lng + degrees,
        }
    }

    pub fn contains(&self, point: Coord) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lng..=self.max_lng).contains(&point.lng)
    }

    pub fn center(&self) -> Coord {
        Coord::new(
            (self.min_lat + self.max_lat) * 0.5,
            (self.min_lng + self.max_lng) * 0.5,
        )
    }
}
