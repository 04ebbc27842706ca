//! Fare estimation: priced ride options for a pickup/destination pair.
//!
//! The dispatch core only depends on [`FareEstimator`]. [`TableFareEstimator`]
//! is the in-process model used by the demo flow and by tests:
//!
//! - standard ride / parcel delivery: `base + per_km * haversine_km`
//! - intercity: same, with the per-km rate scaled up
//! - hourly rental: `per_hour * whole hours`, at least one block

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eta::{eta_minutes, ETA_BUFFER_MINUTES, MIN_SPEED_KPH};
use crate::geo::{haversine_km, Place};
use crate::speed::{StaticSpeedTable, VehicleMode};

/// Base fare in currency units.
pub const BASE_FARE: f64 = 2.50;

/// Per-kilometer rate in currency units.
pub const PER_KM_RATE: f64 = 1.50;

#[derive(Debug, Error)]
pub enum FareError {
    #[error("fare provider unavailable: {0}")]
    Unavailable(String),
    #[error("fare request timed out")]
    Timeout,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    #[default]
    StandardRide,
    ParcelDelivery,
    HourlyRental,
    Intercity,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::StandardRide => "standard_ride",
            ServiceType::ParcelDelivery => "parcel_delivery",
            ServiceType::HourlyRental => "hourly_rental",
            ServiceType::Intercity => "intercity",
        }
    }
}

/// One priced option the rider can pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideOption {
    pub id: String,
    pub label: String,
    pub mode: VehicleMode,
    pub price: f64,
    pub currency: String,
    /// Minutes until arrival at the destination, pickup buffer included.
    pub eta_minutes: u32,
    /// Minutes spent driving.
    pub duration_minutes: u32,
    /// Seats, or parcels for deliveries.
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FareQuery {
    pub pickup: Place,
    pub destination: Place,
    pub service_type: ServiceType,
}

#[async_trait]
pub trait FareEstimator: Send + Sync {
    async fn estimate(&self, query: &FareQuery) -> Result<Vec<RideOption>, FareError>;
}

/// Prices for one vehicle tier.
#[derive(Debug, Clone)]
pub struct FareTier {
    pub mode: VehicleMode,
    pub label: String,
    pub base: f64,
    pub per_km: f64,
    pub per_hour: f64,
    pub capacity: u32,
}

#[derive(Debug, Clone)]
pub struct FareTable {
    pub currency: String,
    pub tiers: Vec<FareTier>,
    /// Added to the base fare of parcel deliveries.
    pub parcel_surcharge: f64,
    /// Multiplier on `per_km` for intercity trips.
    pub intercity_per_km_factor: f64,
    /// Vans do not carry parcels.
    pub parcel_modes: Vec<VehicleMode>,
}

impl Default for FareTable {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            tiers: vec![
                FareTier {
                    mode: VehicleMode::Car,
                    label: "Car".to_string(),
                    base: BASE_FARE,
                    per_km: PER_KM_RATE,
                    per_hour: 12.0,
                    capacity: 4,
                },
                FareTier {
                    mode: VehicleMode::Moto,
                    label: "Moto".to_string(),
                    base: 1.50,
                    per_km: 1.00,
                    per_hour: 8.0,
                    capacity: 1,
                },
                FareTier {
                    mode: VehicleMode::Van,
                    label: "Van".to_string(),
                    base: 4.00,
                    per_km: 2.00,
                    per_hour: 18.0,
                    capacity: 7,
                },
            ],
            parcel_surcharge: 1.00,
            intercity_per_km_factor: 1.3,
            parcel_modes: vec![VehicleMode::Moto, VehicleMode::Car],
        }
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Priced options from a static [`FareTable`], with travel times from a
/// static speed table.
#[derive(Debug, Clone, Default)]
pub struct TableFareEstimator {
    pub table: FareTable,
    pub speeds: StaticSpeedTable,
}

impl TableFareEstimator {
    pub fn new(table: FareTable, speeds: StaticSpeedTable) -> Self {
        Self { table, speeds }
    }

    /// Price every applicable tier for the query, cheapest first.
    pub fn quote(&self, query: &FareQuery) -> Vec<RideOption> {
        let distance_km = haversine_km(query.pickup.coord, query.destination.coord);
        let mut options: Vec<RideOption> = self
            .table
            .tiers
            .iter()
            .filter(|tier| {
                query.service_type != ServiceType::ParcelDelivery
                    || self.table.parcel_modes.contains(&tier.mode)
            })
            .map(|tier| self.price_tier(tier, query.service_type, distance_km))
            .collect();
        options.sort_by(|a, b| a.price.total_cmp(&b.price));
        options
    }

    fn price_tier(&self, tier: &FareTier, service: ServiceType, distance_km: f64) -> RideOption {
        let speed = self.speeds.kph(tier.mode);
        let duration_minutes = eta_minutes(distance_km, speed, MIN_SPEED_KPH, 0);
        let price = match service {
            ServiceType::StandardRide => tier.base + tier.per_km * distance_km,
            ServiceType::ParcelDelivery => {
                tier.base + self.table.parcel_surcharge + tier.per_km * distance_km
            }
            ServiceType::Intercity => {
                tier.base + tier.per_km * self.table.intercity_per_km_factor * distance_km
            }
            ServiceType::HourlyRental => {
                let hours = (duration_minutes as f64 / 60.0).ceil().max(1.0);
                tier.per_hour * hours
            }
        };
        let capacity = if service == ServiceType::ParcelDelivery {
            1
        } else {
            tier.capacity
        };
        RideOption {
            id: format!("{}-{}", service.as_str(), tier.mode),
            label: tier.label.clone(),
            mode: tier.mode,
            price: round_cents(price),
            currency: self.table.currency.clone(),
            eta_minutes: duration_minutes + ETA_BUFFER_MINUTES,
            duration_minutes,
            capacity,
        }
    }
}

#[async_trait]
impl FareEstimator for TableFareEstimator {
    async fn estimate(&self, query: &FareQuery) -> Result<Vec<RideOption>, FareError> {
        Ok(self.quote(query))
    }
}
