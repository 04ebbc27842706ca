//! Test helpers for common test setup and utilities.
//!
//! Fixture coordinates are a short Guayaquil trip (Mall del Sol to the
//! Malecón). The fake collaborators count their calls so tests can assert on
//! upstream traffic.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::dispatch::{DispatchConfig, DispatchSession};
use crate::geo::{BoundingBox, Coord, Place};
use crate::pricing::{FareError, FareEstimator, FareQuery, RideOption, TableFareEstimator};
use crate::routing::{RouteProvider, RouteResult, RoutingError, StraightLineRouteProvider};
use crate::search::{AddressSearchProvider, ReverseGeocoder, SearchError, SearchHit};

pub const PICKUP: Coord = Coord::new(-2.1552, -79.8946);
pub const DESTINATION: Coord = Coord::new(-2.1815, -79.8765);

pub fn pickup_place() -> Place {
    Place::new("Mall del Sol", PICKUP)
}

pub fn destination_place() -> Place {
    Place::new("Malecón 2000", DESTINATION)
}

/// Straight-line routes, counting every call.
#[derive(Debug, Default)]
pub struct CountingRouteProvider {
    calls: AtomicUsize,
}

impl CountingRouteProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouteProvider for CountingRouteProvider {
    async fn route(&self, from: Coord, to: Coord) -> Result<RouteResult, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(StraightLineRouteProvider::leg(from, to))
    }
}

/// Always fails with an upstream 503, counting every call.
#[derive(Debug, Default)]
pub struct FailingRouteProvider {
    calls: AtomicUsize,
}

impl FailingRouteProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouteProvider for FailingRouteProvider {
    async fn route(&self, _from: Coord, _to: Coord) -> Result<RouteResult, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RoutingError::Status(503))
    }
}

/// Fails with an upstream 503 while `down`, otherwise answers with a straight
/// line. Starts down.
#[derive(Debug)]
pub struct FlakyRouteProvider {
    down: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyRouteProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            down: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouteProvider for FlakyRouteProvider {
    async fn route(&self, from: Coord, to: Coord) -> Result<RouteResult, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(RoutingError::Status(503));
        }
        Ok(StraightLineRouteProvider::leg(from, to))
    }
}

/// Answers with a straight line after `delay`.
#[derive(Debug)]
pub struct SlowRouteProvider {
    pub delay: Duration,
}

#[async_trait]
impl RouteProvider for SlowRouteProvider {
    async fn route(&self, from: Coord, to: Coord) -> Result<RouteResult, RoutingError> {
        tokio::time::sleep(self.delay).await;
        Ok(StraightLineRouteProvider::leg(from, to))
    }
}

/// Canned address search; `fail` makes every call return a 500.
#[derive(Debug, Default)]
pub struct StaticSearchProvider {
    pub hits: Vec<SearchHit>,
    pub fail: bool,
    pub place_name: Option<String>,
    pub queries: Mutex<Vec<String>>,
}

impl StaticSearchProvider {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Queries received so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AddressSearchProvider for StaticSearchProvider {
    async fn search(&self, query: &str, _region: BoundingBox) -> Result<Vec<SearchHit>, SearchError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        if self.fail {
            return Err(SearchError::Status(500));
        }
        Ok(self.hits.clone())
    }
}

#[async_trait]
impl ReverseGeocoder for StaticSearchProvider {
    async fn place_name(&self, _coord: Coord) -> Result<Option<String>, SearchError> {
        if self.fail {
            return Err(SearchError::Status(500));
        }
        Ok(self.place_name.clone())
    }
}

/// Returns fixed options, or fails when `options` is `None`.
#[derive(Debug, Default)]
pub struct StaticFareEstimator {
    pub options: Option<Vec<RideOption>>,
}

#[async_trait]
impl FareEstimator for StaticFareEstimator {
    async fn estimate(&self, _query: &FareQuery) -> Result<Vec<RideOption>, FareError> {
        self.options
            .clone()
            .ok_or_else(|| FareError::Unavailable("static estimator has no options".to_string()))
    }
}

/// Prices with the default table after `delay`.
#[derive(Debug)]
pub struct SlowFareEstimator {
    pub delay: Duration,
}

#[async_trait]
impl FareEstimator for SlowFareEstimator {
    async fn estimate(&self, query: &FareQuery) -> Result<Vec<RideOption>, FareError> {
        tokio::time::sleep(self.delay).await;
        TableFareEstimator::default().estimate(query).await
    }
}

/// Build a session at [`PICKUP`] priced by the default fare table.
pub fn create_test_session(seed: u64) -> DispatchSession {
    DispatchSession::new(
        DispatchConfig::default().with_seed(seed),
        PICKUP,
        Arc::new(TableFareEstimator::default()),
    )
}
