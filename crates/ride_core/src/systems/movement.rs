//! Movement system: steps the assigned driver toward its current target.
//!
//! The target is the pickup while the driver is assigned and the destination
//! once the trip is in progress. Within the arrival epsilon the position
//! freezes; reaching the target never changes the trip status.

use bevy_ecs::prelude::{Query, Res, ResMut, With};

use crate::clock::{CurrentEvent, DispatchClock, EventKind};
use crate::dispatch::DispatchConfig;
use crate::ecs::{AssignedDriver, DispatchTimers, GeoPosition, Trip, TripStatus};
use crate::geo::{planar_distance, step_toward, Coord};

fn movement_target(trip: &Trip) -> Option<Coord> {
    match trip.status {
        TripStatus::DriverAssigned => Some(trip.pickup.coord),
        TripStatus::InProgress => trip.destination.as_ref().map(|place| place.coord),
        _ => None,
    }
}

pub fn movement_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<DispatchClock>,
    mut timers: ResMut<DispatchTimers>,
    config: Res<DispatchConfig>,
    trip: Res<Trip>,
    mut drivers: Query<&mut GeoPosition, With<AssignedDriver>>,
) {
    if event.0.kind != EventKind::MovementTick {
        return;
    }
    if timers.movement == Some(event.0.id) {
        timers.movement = None;
    }
    if !trip.status.driver_moving() {
        return;
    }

    if let Some(target) = movement_target(&trip) {
        for mut position in drivers.iter_mut() {
            if planar_distance(position.0, target) > config.arrival_epsilon_deg {
                position.0 = step_toward(position.0, target, config.movement_step_deg);
            }
        }
    }

    timers.movement = Some(clock.schedule_in(config.movement_interval_ms, EventKind::MovementTick));
}
