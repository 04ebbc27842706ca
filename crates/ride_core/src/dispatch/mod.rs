//! Trip dispatch state machine.
//!
//! ```text
//! IDLE -> ESTIMATING -> CHOOSING -> SEARCHING -> DRIVER_ASSIGNED -> IN_PROGRESS -> COMPLETED
//!                                       |               |
//!                                       +--> CANCELLED <+
//! ```
//!
//! [`DispatchSession`] owns one rider session: the bevy world holding the trip,
//! the drivers and every timer handle. All mutation happens either in a guarded
//! session method or in a system fired by [`DispatchSession::advance_to`], never
//! concurrently. `COMPLETED` and `CANCELLED` only leave through
//! [`DispatchSession::reset`].

pub mod config;
pub mod error;

use std::sync::Arc;
use std::time::Duration;

use bevy_ecs::prelude::{Entity, Mut, Schedule, With, World};
use tracing::{info, warn};

pub use config::DispatchConfig;
pub use error::DispatchError;

use crate::clock::{DispatchClock, EventKind, ONE_SEC_MS};
use crate::ecs::{
    AssignedDriver, Candidate, CancelReason, CandidateRng, DispatchNotifications, DispatchTimers,
    DriverProfile, GeoPosition, IncomingRequest, IncomingRequestLog, Notification, PaymentMethod,
    RequestResolution, RiderLocation, Trip, TripOutcome, TripStatus, TripSummary,
};
use crate::geo::{Coord, Place};
use crate::map_sync::{DriverMarker, MapFrame};
use crate::matching::{MatchingAlgorithmResource, NearestDriverMatching};
use crate::pricing::{FareEstimator, FareQuery, RideOption, ServiceType};
use crate::runner::{dispatch_schedule, run_until};

/// Pickup label used until the rider picks an address.
pub const CURRENT_LOCATION_LABEL: &str = "Current location";

/// Result of accepting an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,
    /// Already accepted or rejected; the duplicate is ignored.
    AlreadyResolved,
    /// The countdown reached zero first.
    Expired,
}

pub struct DispatchSession {
    world: World,
    schedule: Schedule,
    fares: Arc<dyn FareEstimator>,
    config: DispatchConfig,
    closed: bool,
}

impl DispatchSession {
    /// Start a session at `rider_location`; the first candidates are spawned
    /// immediately and refreshed on the configured interval.
    pub fn new(config: DispatchConfig, rider_location: Coord, fares: Arc<dyn FareEstimator>) -> Self {
        let mut world = World::new();
        world.insert_resource(DispatchClock::default());
        world.insert_resource(DispatchTimers::default());
        world.insert_resource(DispatchNotifications::default());
        world.insert_resource(IncomingRequestLog::default());
        world.insert_resource(RiderLocation(rider_location));
        world.insert_resource(CandidateRng::seeded(config.seed));
        world.insert_resource(MatchingAlgorithmResource::new(Box::new(
            NearestDriverMatching::new(config.distance_metric),
        )));
        world.insert_resource(Trip::new(1, Place::new(CURRENT_LOCATION_LABEL, rider_location)));
        world.insert_resource(config.clone());

        let mut session = Self {
            world,
            schedule: dispatch_schedule(),
            fares,
            config,
            closed: false,
        };
        session.start_candidate_refresh();
        session
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u64 {
        self.world.resource::<DispatchClock>().now()
    }

    pub fn trip(&self) -> &Trip {
        self.world.resource::<Trip>()
    }

    pub fn status(&self) -> TripStatus {
        self.trip().status
    }

    pub fn timers(&self) -> &DispatchTimers {
        self.world.resource::<DispatchTimers>()
    }

    /// Number of events still queued on the clock.
    pub fn pending_events(&self) -> usize {
        self.world.resource::<DispatchClock>().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn rider_location(&self) -> Coord {
        self.world.resource::<RiderLocation>().0
    }

    pub fn incoming_request(&self) -> Option<&IncomingRequest> {
        self.world.get_resource::<IncomingRequest>()
    }

    /// Visible candidates in display order.
    pub fn candidates(&mut self) -> Vec<(DriverProfile, Coord)> {
        let mut query = self
            .world
            .query::<(&Candidate, &DriverProfile, &GeoPosition)>();
        let mut candidates: Vec<(u32, DriverProfile, Coord)> = query
            .iter(&self.world)
            .map(|(candidate, profile, position)| (candidate.order, profile.clone(), position.0))
            .collect();
        candidates.sort_by_key(|(order, _, _)| *order);
        candidates
            .into_iter()
            .map(|(_, profile, coord)| (profile, coord))
            .collect()
    }

    pub fn assigned_driver(&mut self) -> Option<(DriverProfile, Coord)> {
        let mut query = self
            .world
            .query_filtered::<(&DriverProfile, &GeoPosition), With<AssignedDriver>>();
        query
            .iter(&self.world)
            .next()
            .map(|(profile, position)| (profile.clone(), position.0))
    }

    /// Snapshot for the map layer. Candidates are listed only while no driver
    /// is committed.
    pub fn map_frame(&mut self) -> MapFrame {
        let status = self.status();
        let drivers = if status.shows_candidates() {
            self.candidates()
                .into_iter()
                .map(|(profile, coord)| DriverMarker {
                    id: profile.id,
                    coord,
                    assigned: false,
                })
                .collect()
        } else if status.driver_moving() {
            self.assigned_driver()
                .map(|(profile, coord)| DriverMarker {
                    id: profile.id,
                    coord,
                    assigned: true,
                })
                .into_iter()
                .collect()
        } else {
            Vec::new()
        };
        let trip = self.trip();
        MapFrame {
            status,
            pickup: trip.pickup.coord,
            destination: trip.destination.as_ref().map(|place| place.coord),
            drivers,
        }
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.world.resource_mut::<DispatchNotifications>().drain()
    }

    // -- rider inputs -------------------------------------------------------

    pub fn set_rider_location(&mut self, coord: Coord) -> Result<(), DispatchError> {
        self.ensure_open()?;
        self.world.insert_resource(RiderLocation(coord));
        let mut trip = self.world.resource_mut::<Trip>();
        if trip.status == TripStatus::Idle && trip.pickup.text == CURRENT_LOCATION_LABEL {
            trip.pickup.coord = coord;
        }
        Ok(())
    }

    pub fn set_pickup(&mut self, pickup: Place) -> Result<(), DispatchError> {
        self.edit_plan("change pickup", |trip| trip.pickup = pickup)
    }

    pub fn set_destination(&mut self, destination: Place) -> Result<(), DispatchError> {
        self.edit_plan("change destination", |trip| trip.destination = Some(destination))
    }

    pub fn set_service_type(&mut self, service_type: ServiceType) -> Result<(), DispatchError> {
        self.edit_plan("change service type", |trip| trip.service_type = service_type)
    }

    pub fn set_payment_method(&mut self, method: PaymentMethod) -> Result<(), DispatchError> {
        self.edit_details("change payment method", |trip| trip.payment_method = method)
    }

    pub fn set_note(&mut self, note: impl Into<String>) -> Result<(), DispatchError> {
        let note = note.into();
        self.edit_details("change note", |trip| trip.note = note)
    }

    // -- lifecycle ----------------------------------------------------------

    /// Price the trip. Estimation failures and timeouts yield no options;
    /// the trip still moves to `CHOOSING`.
    pub async fn estimate(&mut self) -> Result<Vec<RideOption>, DispatchError> {
        self.ensure_open()?;
        let trip = self.trip();
        if !matches!(trip.status, TripStatus::Idle | TripStatus::Choosing) {
            return Err(DispatchError::InvalidTransition {
                action: "estimate",
                status: trip.status,
            });
        }
        let destination = trip
            .destination
            .clone()
            .ok_or(DispatchError::MissingDestination)?;
        let query = FareQuery {
            pickup: trip.pickup.clone(),
            destination,
            service_type: trip.service_type,
        };

        let previous = trip.status;
        self.set_status(TripStatus::Estimating);
        let fares = Arc::clone(&self.fares);
        let limit = self.config.estimate_timeout;
        let pending = PendingEstimate {
            world: &mut self.world,
            previous,
            committed: false,
        };
        let options = match tokio::time::timeout(limit, fares.estimate(&query)).await {
            Ok(Ok(options)) => options,
            Ok(Err(err)) => {
                warn!(error = %err, "fare estimation failed; offering no options");
                Vec::new()
            }
            Err(_) => {
                warn!("fare estimation timed out; offering no options");
                Vec::new()
            }
        };

        pending.commit(options.clone());
        Ok(options)
    }

    pub fn select_option(&mut self, option_id: &str) -> Result<(), DispatchError> {
        self.ensure_open()?;
        let mut trip = self.world.resource_mut::<Trip>();
        if trip.status != TripStatus::Choosing {
            return Err(DispatchError::InvalidTransition {
                action: "select an option",
                status: trip.status,
            });
        }
        if !trip.options.iter().any(|option| option.id == option_id) {
            return Err(DispatchError::UnknownOption(option_id.to_string()));
        }
        trip.selected_option = Some(option_id.to_string());
        Ok(())
    }

    /// Start searching for a driver. Nothing changes unless an option is selected.
    pub fn request_ride(&mut self) -> Result<(), DispatchError> {
        self.ensure_open()?;
        let trip = self.trip();
        if trip.status != TripStatus::Choosing {
            return Err(DispatchError::InvalidTransition {
                action: "request a ride",
                status: trip.status,
            });
        }
        if trip.selected().is_none() {
            return Err(DispatchError::NoOptionSelected);
        }

        let delay = self.config.assignment_delay_ms;
        self.with_clock_and_timers(|clock, timers| {
            if let Some(previous) = timers.assignment.take() {
                clock.cancel(previous);
            }
            timers.assignment = Some(clock.schedule_in(delay, EventKind::AssignDriver));
        });
        self.set_status(TripStatus::Searching);
        info!(trip = self.trip().id, "searching for a driver");
        Ok(())
    }

    /// Cancel while searching (reason optional) or once a driver is assigned
    /// (reason required). A pending assignment is preempted.
    pub fn cancel(&mut self, reason: Option<CancelReason>) -> Result<(), DispatchError> {
        self.ensure_open()?;
        match self.status() {
            TripStatus::Searching => {}
            TripStatus::DriverAssigned if reason.is_none() => return Err(DispatchError::ReasonRequired),
            TripStatus::DriverAssigned => {}
            status => {
                return Err(DispatchError::InvalidTransition {
                    action: "cancel",
                    status,
                })
            }
        }

        self.teardown_trip();
        self.world.resource_mut::<Trip>().cancel_reason = reason;
        self.set_status(TripStatus::Cancelled);
        self.close_trip(TripOutcome::Cancelled { reason });
        info!(
            trip = self.trip().id,
            reason = reason.map(|r| r.label()).unwrap_or("none"),
            "trip cancelled"
        );
        Ok(())
    }

    /// Driver picked the rider up.
    pub fn start_trip(&mut self) -> Result<(), DispatchError> {
        self.ensure_open()?;
        let status = self.status();
        if status != TripStatus::DriverAssigned {
            return Err(DispatchError::InvalidTransition {
                action: "start the trip",
                status,
            });
        }
        self.set_status(TripStatus::InProgress);
        Ok(())
    }

    /// Driver dropped the rider off.
    pub fn finish_trip(&mut self) -> Result<(), DispatchError> {
        self.ensure_open()?;
        let status = self.status();
        if status != TripStatus::InProgress {
            return Err(DispatchError::InvalidTransition {
                action: "finish the trip",
                status,
            });
        }
        self.teardown_trip();
        self.set_status(TripStatus::Completed);
        self.close_trip(TripOutcome::Completed);
        info!(trip = self.trip().id, "trip completed");
        Ok(())
    }

    /// Discard the trip record and start a fresh `IDLE` trip.
    pub fn reset(&mut self) -> Result<(), DispatchError> {
        self.ensure_open()?;
        let status = self.status();
        if !matches!(
            status,
            TripStatus::Idle | TripStatus::Choosing | TripStatus::Completed | TripStatus::Cancelled
        ) {
            return Err(DispatchError::InvalidTransition {
                action: "reset",
                status,
            });
        }
        self.teardown_trip();
        let next_id = self.trip().id + 1;
        let location = self.rider_location();
        self.world
            .insert_resource(Trip::new(next_id, Place::new(CURRENT_LOCATION_LABEL, location)));
        if status != TripStatus::Idle {
            self.push(Notification::StatusChanged {
                from: status,
                to: TripStatus::Idle,
            });
        }
        self.start_candidate_refresh();
        Ok(())
    }

    // -- driver side ---------------------------------------------------------

    /// Show a request to the driver with a countdown of
    /// `incoming_request_secs`. Only one request may be pending.
    pub fn receive_incoming_request(&mut self, summary: TripSummary) -> Result<u64, DispatchError> {
        self.ensure_open()?;
        if self.world.contains_resource::<IncomingRequest>() {
            return Err(DispatchError::IncomingRequestPending);
        }
        let id = {
            let mut log = self.world.resource_mut::<IncomingRequestLog>();
            log.next_id += 1;
            log.next_id
        };
        self.world.insert_resource(IncomingRequest {
            id,
            summary,
            time_left: self.config.incoming_request_secs.max(1),
        });
        self.with_clock_and_timers(|clock, timers| {
            if let Some(previous) = timers.countdown.take() {
                clock.cancel(previous);
            }
            timers.countdown = Some(clock.schedule_in(ONE_SEC_MS, EventKind::RequestCountdownTick));
        });
        Ok(id)
    }

    /// Accept request `id`. The first accept wins; duplicates and late
    /// accepts are answered without error.
    pub fn accept_incoming(&mut self, id: u64) -> Result<AcceptOutcome, DispatchError> {
        self.ensure_open()?;
        if self.resolve_pending(id, RequestResolution::Accepted) {
            self.push(Notification::IncomingRequestAccepted { request_id: id });
            return Ok(AcceptOutcome::Accepted);
        }
        match self.world.resource::<IncomingRequestLog>().resolved.get(&id) {
            Some(RequestResolution::Expired) => Ok(AcceptOutcome::Expired),
            Some(_) => Ok(AcceptOutcome::AlreadyResolved),
            None => Err(DispatchError::UnknownIncomingRequest(id)),
        }
    }

    /// Reject request `id`. Returns `false` if it was already resolved.
    pub fn reject_incoming(&mut self, id: u64) -> Result<bool, DispatchError> {
        self.ensure_open()?;
        if self.resolve_pending(id, RequestResolution::Rejected) {
            self.push(Notification::IncomingRequestRejected { request_id: id });
            return Ok(true);
        }
        if self
            .world
            .resource::<IncomingRequestLog>()
            .resolved
            .contains_key(&id)
        {
            Ok(false)
        } else {
            Err(DispatchError::UnknownIncomingRequest(id))
        }
    }

    // -- time ----------------------------------------------------------------

    /// Fire every timer due at or before `timestamp_ms`. Returns the number
    /// of events processed.
    pub fn advance_to(&mut self, timestamp_ms: u64) -> usize {
        if self.closed {
            return 0;
        }
        run_until(&mut self.world, &mut self.schedule, timestamp_ms)
    }

    pub fn advance_by(&mut self, duration: Duration) -> usize {
        let until = self.now_ms().saturating_add(duration_ms(duration));
        self.advance_to(until)
    }

    /// End the session: cancel every timer, drop the incoming request and the
    /// drivers. Later calls fail with [`DispatchError::SessionClosed`].
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.with_clock_and_timers(|clock, timers| timers.teardown(clock));
        self.world.remove_resource::<IncomingRequest>();
        self.despawn_drivers();
        self.closed = true;
        info!(trip = self.trip().id, "dispatch session shut down");
    }

    // -- internals -----------------------------------------------------------

    fn ensure_open(&self) -> Result<(), DispatchError> {
        if self.closed {
            Err(DispatchError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn push(&mut self, notification: Notification) {
        self.world
            .resource_mut::<DispatchNotifications>()
            .push(notification);
    }

    fn set_status(&mut self, to: TripStatus) {
        set_trip_status(&mut self.world, to);
    }

    /// Pickup, destination and service type may change while planning. A
    /// change while choosing drops the stale options and returns to `IDLE`.
    fn edit_plan(&mut self, action: &'static str, edit: impl FnOnce(&mut Trip)) -> Result<(), DispatchError> {
        self.ensure_open()?;
        let status = self.status();
        if !matches!(status, TripStatus::Idle | TripStatus::Choosing) {
            return Err(DispatchError::InvalidTransition { action, status });
        }
        {
            let mut trip = self.world.resource_mut::<Trip>();
            edit(&mut *trip);
            trip.options.clear();
            trip.selected_option = None;
        }
        self.set_status(TripStatus::Idle);
        Ok(())
    }

    fn edit_details(&mut self, action: &'static str, edit: impl FnOnce(&mut Trip)) -> Result<(), DispatchError> {
        self.ensure_open()?;
        let status = self.status();
        if status.is_terminal() || status == TripStatus::InProgress {
            return Err(DispatchError::InvalidTransition { action, status });
        }
        edit(&mut *self.world.resource_mut::<Trip>());
        Ok(())
    }

    fn with_clock_and_timers(&mut self, f: impl FnOnce(&mut DispatchClock, &mut DispatchTimers)) {
        self.world
            .resource_scope(|world, mut timers: Mut<DispatchTimers>| {
                let mut clock = world.resource_mut::<DispatchClock>();
                f(&mut *clock, &mut *timers);
            });
    }

    fn start_candidate_refresh(&mut self) {
        self.with_clock_and_timers(|clock, timers| {
            if let Some(previous) = timers.refresh.take() {
                clock.cancel(previous);
            }
            timers.refresh = Some(clock.schedule_in(0, EventKind::CandidateRefresh));
        });
        let now = self.now_ms();
        run_until(&mut self.world, &mut self.schedule, now);
    }

    /// Cancel the trip-scoped timers and remove every driver from the world.
    fn teardown_trip(&mut self) {
        self.with_clock_and_timers(|clock, timers| timers.teardown_trip(clock));
        self.despawn_drivers();
    }

    fn despawn_drivers(&mut self) {
        let drivers: Vec<Entity> = self
            .world
            .query_filtered::<Entity, With<DriverProfile>>()
            .iter(&self.world)
            .collect();
        for entity in drivers {
            self.world.despawn(entity);
        }
    }

    fn close_trip(&mut self, outcome: TripOutcome) {
        let trip = self.trip().clone();
        self.push(Notification::TripClosed { trip, outcome });
    }

    fn resolve_pending(&mut self, id: u64, resolution: RequestResolution) -> bool {
        let pending = self
            .world
            .get_resource::<IncomingRequest>()
            .is_some_and(|request| request.id == id);
        if !pending {
            return false;
        }
        self.world.remove_resource::<IncomingRequest>();
        self.with_clock_and_timers(|clock, timers| {
            if let Some(countdown) = timers.countdown.take() {
                clock.cancel(countdown);
            }
        });
        self.world
            .resource_mut::<IncomingRequestLog>()
            .resolved
            .insert(id, resolution);
        true
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn set_trip_status(world: &mut World, to: TripStatus) {
    let from = std::mem::replace(&mut world.resource_mut::<Trip>().status, to);
    if from != to {
        world
            .resource_mut::<DispatchNotifications>()
            .push(Notification::StatusChanged { from, to });
    }
}

/// An estimate in flight. Dropping it before [`PendingEstimate::commit`]
/// puts the trip back in the status it was estimated from.
struct PendingEstimate<'w> {
    world: &'w mut World,
    previous: TripStatus,
    committed: bool,
}

impl PendingEstimate<'_> {
    fn commit(mut self, options: Vec<RideOption>) {
        {
            let mut trip = self.world.resource_mut::<Trip>();
            trip.options = options;
            trip.selected_option = None;
        }
        set_trip_status(self.world, TripStatus::Choosing);
        self.committed = true;
    }
}

impl Drop for PendingEstimate<'_> {
    fn drop(&mut self) {
        if !self.committed {
            warn!(status = ?self.previous, "fare estimate abandoned; restoring trip status");
            set_trip_status(self.world, self.previous);
        }
    }
}
