//! HTTP front end for the ETA & route cache service.
//!
//! Exposes `POST /eta`, `GET /health` and `GET /metrics` over one shared
//! [`EtaService`]. Request parsing and validation live in [`contract`]; the
//! handlers only translate between HTTP and the library types.

pub mod config;
pub mod contract;
pub mod handlers;
pub mod logging;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use ride_core::eta::EtaService;
use ride_core::geo::Coord;
use ride_core::metrics::{EtaMetrics, MetricsError};
use ride_core::routing::{build_route_provider, RoutingError};
use ride_core::speed::StaticSpeedTable;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ServiceConfig;

/// Coordinate used for the zero-length health probe (central Guayaquil).
pub const HEALTH_PROBE: Coord = Coord::new(-2.1894, -79.8891);

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("routing provider setup failed: {0}")]
    Routing(#[from] RoutingError),
    #[error("metrics registry setup failed: {0}")]
    Metrics(#[from] MetricsError),
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error("server i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared handler state.
pub struct AppState {
    pub eta: EtaService,
    pub health_probe: Coord,
}

impl AppState {
    pub fn new(eta: EtaService) -> Self {
        Self {
            eta,
            health_probe: HEALTH_PROBE,
        }
    }

    /// Wire the configured routing provider, static speeds and a fresh
    /// metrics registry into one service.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let provider = build_route_provider(&config.route_provider_kind())?;
        let metrics = EtaMetrics::new()?;
        let eta = EtaService::new(
            provider,
            Arc::new(StaticSpeedTable::default()),
            config.eta_config(),
            metrics,
        );
        Ok(Self::new(eta))
    }

    pub fn metrics(&self) -> &EtaMetrics {
        self.eta.metrics()
    }

    pub(crate) fn record_http(&self, route: &str, status: StatusCode, started: Instant) {
        let elapsed: Duration = started.elapsed();
        self.metrics().record_http(route, status.as_u16(), elapsed);
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/eta", post(handlers::eta::estimate))
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::metrics::metrics))
        .with_state(state)
}

/// Bind, serve until Ctrl-C, then drain in-flight requests.
pub async fn run(config: ServiceConfig) -> Result<(), ServiceError> {
    let state = Arc::new(AppState::from_config(&config)?);
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(
        addr = %listener.local_addr()?,
        provider = ?config.provider,
        osrm_url = %config.osrm_url,
        cache_ttl_secs = config.cache_ttl_secs,
        "eta service listening"
    );
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("eta service stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(err) => {
            warn!(error = %err, "cannot listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
