//! Components and resources of the dispatch world.
//!
//! Drivers are entities (`DriverProfile` + `GeoPosition` + exactly one of
//! `Candidate` / `AssignedDriver`). The active trip, the incoming request and
//! the timer handles are resources.

use std::collections::HashMap;

use bevy_ecs::prelude::{Component, Resource};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::clock::{DispatchClock, TimerId};
use crate::geo::{Coord, Place};
use crate::pricing::{RideOption, ServiceType};
use crate::speed::VehicleMode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    #[default]
    Idle,
    Estimating,
    Choosing,
    Searching,
    DriverAssigned,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    /// No driver is committed yet, so nearby candidates stay on the map.
    pub fn shows_candidates(&self) -> bool {
        matches!(
            self,
            TripStatus::Idle | TripStatus::Estimating | TripStatus::Choosing | TripStatus::Searching
        )
    }

    /// The assigned driver is moving toward pickup or destination.
    pub fn driver_moving(&self) -> bool {
        matches!(self, TripStatus::DriverAssigned | TripStatus::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Wallet,
}

/// Fixed list of reasons a rider can give when cancelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    DriverTooFar,
    ChangedPlans,
    WaitTooLong,
    WrongAddress,
    DriverAskedToCancel,
    Other,
}

impl CancelReason {
    pub const ALL: [CancelReason; 6] = [
        CancelReason::DriverTooFar,
        CancelReason::ChangedPlans,
        CancelReason::WaitTooLong,
        CancelReason::WrongAddress,
        CancelReason::DriverAskedToCancel,
        CancelReason::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CancelReason::DriverTooFar => "Driver is too far away",
            CancelReason::ChangedPlans => "I changed my plans",
            CancelReason::WaitTooLong => "Wait time is too long",
            CancelReason::WrongAddress => "Wrong pickup address",
            CancelReason::DriverAskedToCancel => "Driver asked me to cancel",
            CancelReason::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub kind: VehicleMode,
    pub color: String,
    pub plate: String,
    pub model: String,
    pub year: u16,
}

#[derive(Debug, Clone, PartialEq, Component, Serialize, Deserialize)]
pub struct DriverProfile {
    pub id: String,
    pub name: String,
    pub rating: f32,
    pub vehicle: Vehicle,
}

#[derive(Debug, Clone, Copy, PartialEq, Component)]
pub struct GeoPosition(pub Coord);

/// A nearby driver shown before assignment. `order` is the generation order
/// and is the tie-break for assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Component)]
pub struct Candidate {
    pub order: u32,
}

/// Marker for the single driver authoritative for the active trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Component)]
pub struct AssignedDriver;

/// The rider's active trip. Exactly one exists per session.
#[derive(Debug, Clone, PartialEq, Resource, Serialize)]
pub struct Trip {
    pub id: u64,
    pub status: TripStatus,
    pub pickup: Place,
    pub destination: Option<Place>,
    pub service_type: ServiceType,
    pub options: Vec<RideOption>,
    pub selected_option: Option<String>,
    pub payment_method: PaymentMethod,
    pub note: String,
    pub driver: Option<DriverProfile>,
    pub cancel_reason: Option<CancelReason>,
}

impl Trip {
    pub fn new(id: u64, pickup: Place) -> Self {
        Self {
            id,
            status: TripStatus::Idle,
            pickup,
            destination: None,
            service_type: ServiceType::default(),
            options: Vec::new(),
            selected_option: None,
            payment_method: PaymentMethod::default(),
            note: String::new(),
            driver: None,
            cancel_reason: None,
        }
    }

    pub fn selected(&self) -> Option<&RideOption> {
        let id = self.selected_option.as_deref()?;
        self.options.iter().find(|option| option.id == id)
    }
}

/// Trip details a driver sees on an incoming request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    pub rider_name: String,
    pub pickup: Place,
    pub destination: Place,
    pub service_type: ServiceType,
    pub price: f64,
    pub currency: String,
    pub distance_km: f64,
}

/// Driver-side offer with a countdown in whole seconds.
#[derive(Debug, Clone, PartialEq, Resource, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingRequest {
    pub id: u64,
    pub summary: TripSummary,
    pub time_left: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestResolution {
    Accepted,
    Rejected,
    Expired,
}

/// How every incoming request ended, so late accepts can be answered.
#[derive(Debug, Default, Resource)]
pub struct IncomingRequestLog {
    pub resolved: HashMap<u64, RequestResolution>,
    pub next_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TripOutcome {
    Completed,
    Cancelled { reason: Option<CancelReason> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    StatusChanged { from: TripStatus, to: TripStatus },
    DriverAssigned { driver: DriverProfile },
    NoDriversAvailable,
    IncomingRequestExpired { request_id: u64 },
    IncomingRequestAccepted { request_id: u64 },
    IncomingRequestRejected { request_id: u64 },
    /// Hand-off of a finished trip to the history/persistence collaborator.
    TripClosed { trip: Trip, outcome: TripOutcome },
}

#[derive(Debug, Default, Resource)]
pub struct DispatchNotifications(pub Vec<Notification>);

impl DispatchNotifications {
    pub fn push(&mut self, notification: Notification) {
        self.0.push(notification);
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.0)
    }
}

/// Handles of the session's periodic and one-shot timers.
#[derive(Debug, Default, Resource)]
pub struct DispatchTimers {
    pub assignment: Option<TimerId>,
    pub movement: Option<TimerId>,
    pub refresh: Option<TimerId>,
    pub countdown: Option<TimerId>,
}

impl DispatchTimers {
    /// Cancel every timer held here.
    pub fn teardown(&mut self, clock: &mut DispatchClock) {
        for timer in [
            self.assignment.take(),
            self.movement.take(),
            self.refresh.take(),
            self.countdown.take(),
        ]
        .into_iter()
        .flatten()
        {
            clock.cancel(timer);
        }
    }

    /// Cancel the trip-scoped timers; the incoming-request countdown is kept.
    pub fn teardown_trip(&mut self, clock: &mut DispatchClock) {
        for timer in [self.assignment.take(), self.movement.take(), self.refresh.take()]
            .into_iter()
            .flatten()
        {
            clock.cancel(timer);
        }
    }
}

/// The rider's current GPS position; candidates spawn around it.
#[derive(Debug, Clone, Copy, PartialEq, Resource)]
pub struct RiderLocation(pub Coord);

#[derive(Debug, Resource)]
pub struct CandidateRng(pub StdRng);

impl CandidateRng {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}
