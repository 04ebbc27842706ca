use bevy_ecs::prelude::Entity;
use serde::{Deserialize, Serialize};

use super::algorithm::MatchingAlgorithm;
use crate::geo::{haversine_km, planar_distance, Coord};

/// Distance used to rank candidates against the rider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `sqrt(Δlat² + Δlng²)` in degrees.
    #[default]
    Planar,
    Haversine,
}

impl DistanceMetric {
    pub fn distance(&self, a: Coord, b: Coord) -> f64 {
        match self {
            DistanceMetric::Planar => planar_distance(a, b),
            DistanceMetric::Haversine => haversine_km(a, b),
        }
    }
}

/// Nearest-driver matching: linear scan, minimum distance wins.
///
/// Under an exact tie the first candidate in input order wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestDriverMatching {
    pub metric: DistanceMetric,
}

impl NearestDriverMatching {
    pub fn new(metric: DistanceMetric) -> Self {
        Self { metric }
    }
}

impl MatchingAlgorithm for NearestDriverMatching {
    fn find_match(&self, rider: Coord, candidates: &[(Entity, Coord)]) -> Option<Entity> {
        let mut best: Option<(Entity, f64)> = None;
        for (entity, position) in candidates {
            let distance = self.metric.distance(rider, *position);
            match best {
                // Strictly less keeps the earlier candidate on ties.
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((*entity, distance)),
            }
        }
        best.map(|(entity, _)| entity)
    }
}
