use bevy_ecs::prelude::Entity;

use crate::geo::Coord;

/// Picks the driver to assign to a waiting rider.
///
/// `candidates` is in display order. Implementations must be deterministic for
/// a given input: the same rider location and candidate list always yield the
/// same driver.
pub trait MatchingAlgorithm: Send + Sync {
    /// Returns `None` only when `candidates` is empty or no candidate is eligible.
    fn find_match(&self, rider: Coord, candidates: &[(Entity, Coord)]) -> Option<Entity>;
}
