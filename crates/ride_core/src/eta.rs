//! ETA & route cache service.
//!
//! [`EtaService::estimate`] answers `(start, end, mode)` with distance, ETA,
//! confidence and source. Two TTL caches sit on the path, both keyed by
//! coordinates quantized to four decimals:
//!
//! 1. the ETA cache (key includes the mode) short-circuits the whole call;
//! 2. the route cache ([`CachedRouteProvider`]) short-circuits the upstream
//!    routing provider.
//!
//! On an ETA miss the route and the speed are resolved concurrently. Upstream
//! routing failures are returned as-is: there is no retry and no fallback at
//! this layer. Duplicate in-flight misses for one key are allowed; each one
//! calls the provider.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{QuantizedLeg, TtlCache, DEFAULT_CACHE_CAPACITY, KEY_PRECISION_DECIMALS};
use crate::geo::Coord;
use crate::metrics::{CacheKind, EtaMetrics};
use crate::routing::{RouteProvider, RouteResult, RoutingError};
use crate::speed::{SpeedModel, SpeedSource, VehicleMode};

/// Fixed pickup/handover buffer added to every ETA.
pub const ETA_BUFFER_MINUTES: u32 = 2;

/// Speeds below this are clamped so near-zero readings cannot blow up the ETA.
pub const MIN_SPEED_KPH: f64 = 5.0;

/// Default lifetime of route and ETA cache entries.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum EtaError {
    #[error("routing provider failed: {0}")]
    Routing(#[from] RoutingError),
}

/// Cache and formula constants for the ETA path.
#[derive(Debug, Clone, Copy)]
pub struct EtaConfig {
    /// Lifetime shared by the route cache and the ETA cache.
    pub cache_ttl: Duration,
    /// Max entries per cache before LRU eviction.
    pub cache_capacity: usize,
    /// Decimal places kept when quantizing coordinates into keys.
    pub key_precision: u32,
    pub buffer_minutes: u32,
    pub min_speed_kph: f64,
}

impl Default for EtaConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            key_precision: KEY_PRECISION_DECIMALS,
            buffer_minutes: ETA_BUFFER_MINUTES,
            min_speed_kph: MIN_SPEED_KPH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaRequest {
    pub start: Coord,
    pub end: Coord,
    #[serde(default)]
    pub mode: VehicleMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaEstimate {
    pub distance_km: f64,
    pub eta_minutes: u32,
    pub confidence: f64,
    pub source: SpeedSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_geometry: Option<Vec<Coord>>,
}

/// `round(distance / max(speed, min_speed) * 60) + buffer`.
pub fn eta_minutes(distance_km: f64, speed_kph: f64, min_speed_kph: f64, buffer_minutes: u32) -> u32 {
    let minutes = (distance_km.max(0.0) / speed_kph.max(min_speed_kph) * 60.0).round();
    minutes as u32 + buffer_minutes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EtaKey {
    leg: QuantizedLeg,
    mode: VehicleMode,
}

// ---------------------------------------------------------------------------
// Route cache
// ---------------------------------------------------------------------------

/// TTL-cached wrapper around any [`RouteProvider`].
///
/// Cache key is the directional quantized leg. Only successful routes are
/// stored; failures propagate and are retried on the next call.
pub struct CachedRouteProvider {
    inner: Arc<dyn RouteProvider>,
    cache: TtlCache<QuantizedLeg, RouteResult>,
    key_precision: u32,
    metrics: EtaMetrics,
}

impl CachedRouteProvider {
    pub fn new(inner: Arc<dyn RouteProvider>, config: &EtaConfig, metrics: EtaMetrics) -> Self {
        Self {
            inner,
            cache: TtlCache::new(config.cache_ttl, config.cache_capacity),
            key_precision: config.key_precision,
            metrics,
        }
    }

    /// Call the upstream provider directly, bypassing the cache.
    pub async fn route_uncached(&self, from: Coord, to: Coord) -> Result<RouteResult, RoutingError> {
        let started = Instant::now();
        let result = self.inner.route(from, to).await;
        self.metrics.record_provider_call(result.is_ok(), started.elapsed());
        if let Err(err) = &result {
            warn!(error = %err, "routing provider call failed");
        }
        result
    }
}

#[async_trait]
impl RouteProvider for CachedRouteProvider {
    async fn route(&self, from: Coord, to: Coord) -> Result<RouteResult, RoutingError> {
        let key = QuantizedLeg::with_precision(from, to, self.key_precision);

        let lookup = self.cache.get(&key);
        self.metrics.record_cache(CacheKind::Route, &lookup);
        if let Some(cached) = lookup.into_hit() {
            return Ok(cached);
        }

        let route = self.route_uncached(from, to).await?;
        self.cache.insert(key, route.clone());
        Ok(route)
    }
}

// ---------------------------------------------------------------------------
// ETA service
// ---------------------------------------------------------------------------

pub struct EtaService {
    routes: CachedRouteProvider,
    speed_model: Arc<dyn SpeedModel>,
    eta_cache: TtlCache<EtaKey, EtaEstimate>,
    config: EtaConfig,
    metrics: EtaMetrics,
}

impl EtaService {
    pub fn new(
        provider: Arc<dyn RouteProvider>,
        speed_model: Arc<dyn SpeedModel>,
        config: EtaConfig,
        metrics: EtaMetrics,
    ) -> Self {
        Self {
            routes: CachedRouteProvider::new(provider, &config, metrics.clone()),
            speed_model,
            eta_cache: TtlCache::new(config.cache_ttl, config.cache_capacity),
            config,
            metrics,
        }
    }

    pub fn metrics(&self) -> &EtaMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &EtaConfig {
        &self.config
    }

    /// The cached route layer, shareable with other consumers such as the map.
    pub fn routes(&self) -> &CachedRouteProvider {
        &self.routes
    }

    pub async fn estimate(&self, request: EtaRequest) -> Result<EtaEstimate, EtaError> {
        let started = Instant::now();
        let key = EtaKey {
            leg: QuantizedLeg::with_precision(request.start, request.end, self.config.key_precision),
            mode: request.mode,
        };

        let lookup = self.eta_cache.get(&key);
        self.metrics.record_cache(CacheKind::Eta, &lookup);
        if let Some(cached) = lookup.into_hit() {
            self.metrics.record_estimate("cached", started.elapsed());
            return Ok(cached);
        }

        let (route, speed) = tokio::join!(
            self.routes.route(request.start, request.end),
            self.speed_model.speed_for(request.mode),
        );
        let route = match route {
            Ok(route) => route,
            Err(err) => {
                self.metrics.record_estimate("error", started.elapsed());
                return Err(err.into());
            }
        };

        let estimate = EtaEstimate {
            distance_km: route.distance_km,
            eta_minutes: eta_minutes(
                route.distance_km,
                speed.kph,
                self.config.min_speed_kph,
                self.config.buffer_minutes,
            ),
            confidence: speed.confidence.clamp(0.0, 1.0),
            source: speed.source,
            route_geometry: (!route.geometry.is_empty()).then_some(route.geometry),
        };
        debug!(
            mode = %request.mode,
            distance_km = estimate.distance_km,
            eta_minutes = estimate.eta_minutes,
            "eta computed"
        );

        self.eta_cache.insert(key, estimate.clone());
        self.metrics.record_estimate("computed", started.elapsed());
        Ok(estimate)
    }

    /// Probe the upstream provider with a zero-length route, bypassing caches.
    pub async fn provider_is_up(&self, probe: Coord) -> bool {
        self.routes.route_uncached(probe, probe).await.is_ok()
    }
}
