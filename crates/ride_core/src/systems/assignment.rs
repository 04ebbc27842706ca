//! Nearest-driver assignment, fired when the searching delay elapses.
//!
//! With no visible candidate the rider is told and the attempt is retried
//! after another delay; the trip stays in `Searching` until a driver is found
//! or the rider cancels.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};
use tracing::{debug, info};

use crate::clock::{CurrentEvent, DispatchClock, EventKind};
use crate::dispatch::DispatchConfig;
use crate::ecs::{
    AssignedDriver, Candidate, DispatchNotifications, DispatchTimers, DriverProfile, GeoPosition,
    Notification, RiderLocation, Trip, TripStatus,
};
use crate::matching::MatchingAlgorithmResource;

#[allow(clippy::too_many_arguments)]
pub fn assignment_system(
    mut commands: Commands,
    event: Res<CurrentEvent>,
    mut clock: ResMut<DispatchClock>,
    mut timers: ResMut<DispatchTimers>,
    mut trip: ResMut<Trip>,
    mut notifications: ResMut<DispatchNotifications>,
    config: Res<DispatchConfig>,
    rider: Res<RiderLocation>,
    matching: Res<MatchingAlgorithmResource>,
    candidates: Query<(Entity, &Candidate, &GeoPosition, &DriverProfile)>,
) {
    if event.0.kind != EventKind::AssignDriver {
        return;
    }
    if timers.assignment == Some(event.0.id) {
        timers.assignment = None;
    }
    if trip.status != TripStatus::Searching {
        return;
    }

    // Query order is not spawn order; sort so ties resolve by display order.
    let mut visible: Vec<(u32, Entity, GeoPosition)> = candidates
        .iter()
        .map(|(entity, candidate, position, _)| (candidate.order, entity, *position))
        .collect();
    visible.sort_by_key(|(order, entity, _)| (*order, *entity));
    let positions: Vec<(Entity, _)> = visible
        .iter()
        .map(|(_, entity, position)| (*entity, position.0))
        .collect();

    let Some(winner) = matching.find_match(rider.0, &positions) else {
        debug!(trip = trip.id, "no candidate drivers visible; retrying");
        notifications.push(Notification::NoDriversAvailable);
        timers.assignment = Some(clock.schedule_in(config.assignment_delay_ms, EventKind::AssignDriver));
        return;
    };

    let Ok((_, _, _, profile)) = candidates.get(winner) else {
        return;
    };
    let profile = profile.clone();

    for (entity, _) in &positions {
        if *entity == winner {
            commands
                .entity(*entity)
                .remove::<Candidate>()
                .insert(AssignedDriver);
        } else {
            commands.entity(*entity).despawn();
        }
    }

    if let Some(refresh) = timers.refresh.take() {
        clock.cancel(refresh);
    }
    if let Some(movement) = timers.movement.take() {
        clock.cancel(movement);
    }
    timers.movement = Some(clock.schedule_in(config.movement_interval_ms, EventKind::MovementTick));

    let from = trip.status;
    trip.status = TripStatus::DriverAssigned;
    trip.driver = Some(profile.clone());
    info!(trip = trip.id, driver = %profile.id, "driver assigned");
    notifications.push(Notification::StatusChanged {
        from,
        to: TripStatus::DriverAssigned,
    });
    notifications.push(Notification::DriverAssigned { driver: profile });
}
