//! Speed models: effective travel speed per vehicle mode.
//!
//! The ETA contract only sees a [`SpeedEstimate`]; whether it came from the
//! static table or from observed fleet speeds is reported through its
//! `source` and `confidence`.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Vehicle mode a trip leg is estimated for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleMode {
    #[default]
    Car,
    Moto,
    Van,
}

impl VehicleMode {
    pub const ALL: [VehicleMode; 3] = [VehicleMode::Car, VehicleMode::Moto, VehicleMode::Van];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleMode::Car => "car",
            VehicleMode::Moto => "moto",
            VehicleMode::Van => "van",
        }
    }
}

impl fmt::Display for VehicleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "car" => Ok(VehicleMode::Car),
            "moto" => Ok(VehicleMode::Moto),
            "van" => Ok(VehicleMode::Van),
            other => Err(format!("unknown mode '{other}' (expected car, moto or van)")),
        }
    }
}

/// Where a speed (and therefore an ETA) came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedSource {
    Default,
    Fleet,
    Historic,
    Blended,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedEstimate {
    pub kph: f64,
    /// Trust in `kph`, in `[0, 1]`.
    pub confidence: f64,
    pub source: SpeedSource,
}

/// Resolves an effective speed for a mode.
#[async_trait]
pub trait SpeedModel: Send + Sync {
    async fn speed_for(&self, mode: VehicleMode) -> SpeedEstimate;
}

/// Confidence attached to static default speeds.
pub const STATIC_CONFIDENCE: f64 = 0.3;

/// Fixed per-mode speeds.
#[derive(Debug, Clone, Copy)]
pub struct StaticSpeedTable {
    pub car_kph: f64,
    pub moto_kph: f64,
    pub van_kph: f64,
}

impl Default for StaticSpeedTable {
    fn default() -> Self {
        Self {
            car_kph: 35.0,
            moto_kph: 40.0,
            van_kph: 30.0,
        }
    }
}

impl StaticSpeedTable {
    pub fn kph(&self, mode: VehicleMode) -> f64 {
        match mode {
            VehicleMode::Car => self.car_kph,
            VehicleMode::Moto => self.moto_kph,
            VehicleMode::Van => self.van_kph,
        }
    }

    pub fn estimate(&self, mode: VehicleMode) -> SpeedEstimate {
        SpeedEstimate {
            kph: self.kph(mode),
            confidence: STATIC_CONFIDENCE,
            source: SpeedSource::Default,
        }
    }
}

#[async_trait]
impl SpeedModel for StaticSpeedTable {
    async fn speed_for(&self, mode: VehicleMode) -> SpeedEstimate {
        self.estimate(mode)
    }
}

/// Rolling window of observed fleet speeds, falling back to a static table.
///
/// With no samples the static default is returned. Below `min_samples` the
/// observed mean is mixed with the default, weighted by sample count.
pub struct ObservedSpeedModel {
    fallback: StaticSpeedTable,
    window: usize,
    min_samples: usize,
    samples: Mutex<HashMap<VehicleMode, VecDeque<f64>>>,
}

impl ObservedSpeedModel {
    pub const BLENDED_CONFIDENCE: f64 = 0.5;
    pub const FLEET_CONFIDENCE: f64 = 0.8;

    pub fn new(fallback: StaticSpeedTable, window: usize, min_samples: usize) -> Self {
        Self {
            fallback,
            window: window.max(1),
            min_samples: min_samples.max(1),
            samples: Mutex::new(HashMap::new()),
        }
    }

    /// Record one observed speed. Non-finite and non-positive readings are dropped.
    pub fn record(&self, mode: VehicleMode, kph: f64) {
        if !kph.is_finite() || kph <= 0.0 {
            return;
        }
        if let Ok(mut samples) = self.samples.lock() {
            let window = samples.entry(mode).or_default();
            window.push_back(kph);
            while window.len() > self.window {
                window.pop_front();
            }
        }
    }

    fn observed(&self, mode: VehicleMode) -> Option<(f64, usize)> {
        let samples = self.samples.lock().ok()?;
        let window = samples.get(&mode).filter(|w| !w.is_empty())?;
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        Some((mean, window.len()))
    }
}

impl Default for ObservedSpeedModel {
    fn default() -> Self {
        Self::new(StaticSpeedTable::default(), 50, 5)
    }
}

#[async_trait]
impl SpeedModel for ObservedSpeedModel {
    async fn speed_for(&self, mode: VehicleMode) -> SpeedEstimate {
        let Some((mean, count)) = self.observed(mode) else {
            return self.fallback.estimate(mode);
        };
        if count >= self.min_samples {
            return SpeedEstimate {
                kph: mean,
                confidence: Self::FLEET_CONFIDENCE,
                source: SpeedSource::Fleet,
            };
        }
        let weight = count as f64 / self.min_samples as f64;
        SpeedEstimate {
            kph: mean * weight + self.fallback.kph(mode) * (1.0 - weight),
            confidence: Self::BLENDED_CONFIDENCE,
            source: SpeedSource::Blended,
        }
    }
}
