//! Candidate refresh: regenerates the nearby drivers shown before assignment.
//!
//! Candidates are synthetic, placed at seeded random offsets around the
//! rider. A live driver feed would replace [`generate_candidates`] without
//! touching the rest of the dispatch world.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut, With};
use rand::Rng;
use tracing::debug;

use crate::clock::{CurrentEvent, DispatchClock, EventKind};
use crate::dispatch::DispatchConfig;
use crate::ecs::{
    Candidate, CandidateRng, DispatchTimers, DriverProfile, GeoPosition, RiderLocation, Trip,
    Vehicle,
};
use crate::geo::Coord;
use crate::speed::VehicleMode;

const NAMES: &[&str] = &[
    "Carlos Mendoza",
    "María Torres",
    "Luis Andrade",
    "Ana Villacís",
    "Jorge Cedeño",
    "Gabriela Ruiz",
    "Diego Salazar",
    "Paola Jiménez",
];
const COLORS: &[&str] = &["White", "Silver", "Black", "Red", "Blue", "Gray"];
const MODELS: &[(VehicleMode, &str)] = &[
    (VehicleMode::Car, "Chevrolet Aveo"),
    (VehicleMode::Car, "Kia Rio"),
    (VehicleMode::Car, "Hyundai Accent"),
    (VehicleMode::Moto, "Honda CB190"),
    (VehicleMode::Van, "Hyundai H1"),
];

/// Generate `count` drivers at uniform offsets of at most `spread` degrees
/// around `center`.
pub fn generate_candidates<R: Rng>(
    rng: &mut R,
    center: Coord,
    count: usize,
    spread: f64,
    batch: u64,
) -> Vec<(DriverProfile, Coord)> {
    (0..count)
        .map(|index| {
            let (kind, model) = MODELS[rng.gen_range(0..MODELS.len())];
            let profile = DriverProfile {
                id: format!("drv-{batch}-{index}"),
                name: NAMES[rng.gen_range(0..NAMES.len())].to_string(),
                rating: rng.gen_range(4.5..=5.0_f32),
                vehicle: Vehicle {
                    kind,
                    color: COLORS[rng.gen_range(0..COLORS.len())].to_string(),
                    plate: format!("G{}{}-{:04}", letter(rng), letter(rng), rng.gen_range(0..10_000)),
                    model: model.to_string(),
                    year: rng.gen_range(2015..=2024),
                },
            };
            let offset_lat = rng.gen_range(-spread..=spread);
            let offset_lng = rng.gen_range(-spread..=spread);
            (profile, center.offset(offset_lat, offset_lng))
        })
        .collect()
}

fn letter<R: Rng>(rng: &mut R) -> char {
    (b'A' + rng.gen_range(0..26u8)) as char
}

/// Despawn the current candidates and spawn a fresh batch around the rider.
pub fn respawn_candidates(
    commands: &mut Commands,
    rng: &mut CandidateRng,
    existing: impl Iterator<Item = Entity>,
    center: Coord,
    config: &DispatchConfig,
    batch: u64,
) {
    for entity in existing {
        commands.entity(entity).despawn();
    }
    let drivers = generate_candidates(
        &mut rng.0,
        center,
        config.candidate_count,
        config.candidate_spread_deg,
        batch,
    );
    for (order, (profile, coord)) in drivers.into_iter().enumerate() {
        commands.spawn((profile, GeoPosition(coord), Candidate { order: order as u32 }));
    }
}

#[allow(clippy::too_many_arguments)]
pub fn candidate_refresh_system(
    mut commands: Commands,
    event: Res<CurrentEvent>,
    mut clock: ResMut<DispatchClock>,
    mut timers: ResMut<DispatchTimers>,
    mut rng: ResMut<CandidateRng>,
    config: Res<DispatchConfig>,
    rider: Res<RiderLocation>,
    trip: Res<Trip>,
    candidates: Query<Entity, With<Candidate>>,
) {
    if event.0.kind != EventKind::CandidateRefresh {
        return;
    }
    if timers.refresh == Some(event.0.id) {
        timers.refresh = None;
    }
    if !trip.status.shows_candidates() {
        return;
    }

    let batch = clock.now() / config.candidate_refresh_ms.max(1);
    respawn_candidates(
        &mut commands,
        &mut rng,
        candidates.iter(),
        rider.0,
        &config,
        batch,
    );
    debug!(count = config.candidate_count, batch, "candidates refreshed");

    timers.refresh = Some(clock.schedule_in(config.candidate_refresh_ms, EventKind::CandidateRefresh));
}
