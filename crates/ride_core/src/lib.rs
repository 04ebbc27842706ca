pub mod cache;
pub mod clock;
pub mod dispatch;
pub mod ecs;
pub mod eta;
pub mod geo;
pub mod map_sync;
pub mod matching;
pub mod metrics;
pub mod pricing;
pub mod ranker;
pub mod routing;
pub mod runner;
pub mod search;
pub mod speed;
pub mod systems;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
