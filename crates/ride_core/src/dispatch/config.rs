use std::time::Duration;

use bevy_ecs::prelude::Resource;

use crate::matching::DistanceMetric;

/// Default assignment delay: the simulated "searching for a driver" wait.
const DEFAULT_ASSIGNMENT_DELAY_MS: u64 = 3_000;

/// Default movement step per tick, in degrees (~22 m).
const DEFAULT_MOVEMENT_STEP_DEG: f64 = 0.0002;

/// Timer intervals, movement and candidate generation for one rider session.
#[derive(Debug, Clone, Resource)]
pub struct DispatchConfig {
    /// Delay between `request_ride` and the assignment attempt, and between
    /// retries when no candidate is visible.
    pub assignment_delay_ms: u64,
    /// Interval of the driver-movement tick (1 Hz).
    pub movement_interval_ms: u64,
    /// Degrees the assigned driver moves per tick.
    pub movement_step_deg: f64,
    /// Within this planar distance of the target the driver stops moving.
    pub arrival_epsilon_deg: f64,
    /// Interval of the nearby-candidate refresh (10 s).
    pub candidate_refresh_ms: u64,
    /// Number of candidates generated per refresh.
    pub candidate_count: usize,
    /// Max offset in degrees of a generated candidate from the rider.
    pub candidate_spread_deg: f64,
    /// Seed for candidate generation (for reproducibility).
    pub seed: u64,
    /// Starting `time_left` of an incoming request, in seconds.
    pub incoming_request_secs: u32,
    /// Metric used by nearest-driver assignment.
    pub distance_metric: DistanceMetric,
    /// Bound on one fare-estimation call; timeout yields no options.
    pub estimate_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            assignment_delay_ms: DEFAULT_ASSIGNMENT_DELAY_MS,
            movement_interval_ms: 1_000,
            movement_step_deg: DEFAULT_MOVEMENT_STEP_DEG,
            arrival_epsilon_deg: 0.0001,
            candidate_refresh_ms: 10_000,
            candidate_count: 5,
            candidate_spread_deg: 0.01,
            seed: 0,
            incoming_request_secs: 15,
            distance_metric: DistanceMetric::Planar,
            estimate_timeout: Duration::from_secs(8),
        }
    }
}

impl DispatchConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.distance_metric = metric;
        self
    }

    pub fn with_candidate_count(mut self, count: usize) -> Self {
        self.candidate_count = count;
        self
    }
}
