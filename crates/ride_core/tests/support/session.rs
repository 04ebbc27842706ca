#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ride_core::dispatch::{DispatchConfig, DispatchSession};
use ride_core::ecs::{Notification, TripStatus, TripSummary};
use ride_core::geo::Coord;
use ride_core::pricing::{FareEstimator, ServiceType, TableFareEstimator};
use ride_core::test_helpers::{destination_place, pickup_place, PICKUP};

/// Builder for reproducible dispatch sessions.
#[derive(Clone, Debug)]
pub struct TestSessionConfig {
    pub seed: u64,
    pub candidate_count: usize,
    pub rider_location: Coord,
}

impl Default for TestSessionConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            candidate_count: 5,
            rider_location: PICKUP,
        }
    }
}

#[derive(Default)]
pub struct TestSessionBuilder {
    config: TestSessionConfig,
    fares: Option<Arc<dyn FareEstimator>>,
}

impl TestSessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn with_candidate_count(mut self, count: usize) -> Self {
        self.config.candidate_count = count;
        self
    }

    pub fn with_fares(mut self, fares: Arc<dyn FareEstimator>) -> Self {
        self.fares = Some(fares);
        self
    }

    pub fn build(self) -> DispatchSession {
        let config = DispatchConfig::default()
            .with_seed(self.config.seed)
            .with_candidate_count(self.config.candidate_count);
        let fares = self
            .fares
            .unwrap_or_else(|| Arc::new(TableFareEstimator::default()));
        DispatchSession::new(config, self.config.rider_location, fares)
    }
}

/// Set the fixture destination, estimate and select the first option.
pub async fn drive_to_choosing(session: &mut DispatchSession) {
    session
        .set_destination(destination_place())
        .expect("destination accepted");
    let options = session.estimate().await.expect("estimate");
    let first = options.first().expect("at least one option");
    session.select_option(&first.id).expect("option selected");
    assert_eq!(session.status(), TripStatus::Choosing);
}

/// Request a ride and let the assignment delay elapse.
pub async fn drive_to_assigned(session: &mut DispatchSession) {
    drive_to_choosing(session).await;
    session.request_ride().expect("ride requested");
    let delay = session.config().assignment_delay_ms;
    session.advance_by(Duration::from_millis(delay));
    assert_eq!(session.status(), TripStatus::DriverAssigned);
}

pub fn trip_summary() -> TripSummary {
    TripSummary {
        rider_name: "Valeria".to_string(),
        pickup: pickup_place(),
        destination: destination_place(),
        service_type: ServiceType::StandardRide,
        price: 7.82,
        currency: "USD".to_string(),
        distance_km: 3.5,
    }
}

pub fn statuses(notifications: &[Notification]) -> Vec<TripStatus> {
    notifications
        .iter()
        .filter_map(|n| match n {
            Notification::StatusChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}
