//! Dispatch runner: advances the clock and routes events into the ECS.
//!
//! Clock progression and event routing happen here, outside systems. Each step
//! pops the next due event from [DispatchClock], inserts it as [CurrentEvent],
//! then runs the schedule.

use bevy_ecs::prelude::{Res, Schedule, World};
use bevy_ecs::schedule::{apply_deferred, IntoSystemConfigs};

use crate::clock::{CurrentEvent, DispatchClock, EventKind};
use crate::systems::{
    assignment::assignment_system, candidate_refresh::candidate_refresh_system,
    movement::movement_system, request_countdown::request_countdown_system,
};

fn is_assign_driver(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::AssignDriver)
        .unwrap_or(false)
}

fn is_movement_tick(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::MovementTick)
        .unwrap_or(false)
}

fn is_candidate_refresh(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::CandidateRefresh)
        .unwrap_or(false)
}

fn is_request_countdown(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::RequestCountdownTick)
        .unwrap_or(false)
}

/// Builds the dispatch schedule: every timer-reacting system plus
/// [apply_deferred] so spawns and despawns land before the next event.
pub fn dispatch_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems((
        assignment_system.run_if(is_assign_driver),
        movement_system.run_if(is_movement_tick),
        candidate_refresh_system.run_if(is_candidate_refresh),
        request_countdown_system.run_if(is_request_countdown),
        apply_deferred,
    ));
    schedule
}

/// Runs one step if an event is due at or before `until`.
/// Returns `true` if an event was processed.
pub fn run_next_event(world: &mut World, schedule: &mut Schedule, until: u64) -> bool {
    let event = match world.resource_mut::<DispatchClock>().pop_due(until) {
        Some(e) => e,
        None => return false,
    };
    world.insert_resource(CurrentEvent(event));
    schedule.run(world);
    true
}

/// Processes every event due at or before `until`, then moves the clock to
/// `until`. Returns the number of steps executed.
pub fn run_until(world: &mut World, schedule: &mut Schedule, until: u64) -> usize {
    let mut steps = 0;
    while run_next_event(world, schedule, until) {
        steps += 1;
    }
    world.resource_mut::<DispatchClock>().advance_to(until);
    steps
}
