#![allow(dead_code)]

use std::sync::Arc;

use ride_core::eta::{EtaConfig, EtaService};
use ride_core::metrics::EtaMetrics;
use ride_core::routing::RouteProvider;
use ride_core::speed::{SpeedModel, StaticSpeedTable};

/// ETA service over `provider` with the static speed table and fresh metrics.
pub fn eta_service(provider: Arc<dyn RouteProvider>) -> EtaService {
    eta_service_with(provider, Arc::new(StaticSpeedTable::default()))
}

pub fn eta_service_with(provider: Arc<dyn RouteProvider>, speeds: Arc<dyn SpeedModel>) -> EtaService {
    let metrics = EtaMetrics::new().expect("metrics registry");
    EtaService::new(provider, speeds, EtaConfig::default(), metrics)
}
