//! Prometheus counters and histograms for the ETA path.
//!
//! Cache TTL and key precision can only be tuned against measured hit rates,
//! so every cache lookup, provider call and estimate is recorded here.

use std::time::Duration;

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use thiserror::Error;

use crate::cache::CacheLookup;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),
    #[error("metrics output is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Which of the two caches a lookup hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Route,
    Eta,
}

impl CacheKind {
    fn label(&self) -> &'static str {
        match self {
            CacheKind::Route => "route",
            CacheKind::Eta => "eta",
        }
    }
}

const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Owns a private registry; cheap to clone (all handles are `Arc`-backed).
#[derive(Clone)]
pub struct EtaMetrics {
    registry: Registry,
    estimates: IntCounterVec,
    estimate_duration: Histogram,
    cache_events: IntCounterVec,
    provider_requests: IntCounterVec,
    provider_duration: Histogram,
    http_requests: IntCounterVec,
    http_duration: HistogramVec,
}

impl EtaMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let estimates = IntCounterVec::new(
            Opts::new("eta_requests_total", "ETA estimates by outcome"),
            &["outcome"],
        )?;
        let estimate_duration = Histogram::with_opts(
            HistogramOpts::new("eta_request_duration_seconds", "ETA estimate latency")
                .buckets(LATENCY_BUCKETS.to_vec()),
        )?;
        let cache_events = IntCounterVec::new(
            Opts::new("eta_cache_events_total", "Cache lookups by cache and outcome"),
            &["cache", "outcome"],
        )?;
        let provider_requests = IntCounterVec::new(
            Opts::new("routing_provider_requests_total", "Upstream routing calls by outcome"),
            &["outcome"],
        )?;
        let provider_duration = Histogram::with_opts(
            HistogramOpts::new("routing_provider_duration_seconds", "Upstream routing latency")
                .buckets(LATENCY_BUCKETS.to_vec()),
        )?;
        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by route and status"),
            &["route", "status"],
        )?;
        let http_duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["route"],
        )?;

        registry.register(Box::new(estimates.clone()))?;
        registry.register(Box::new(estimate_duration.clone()))?;
        registry.register(Box::new(cache_events.clone()))?;
        registry.register(Box::new(provider_requests.clone()))?;
        registry.register(Box::new(provider_duration.clone()))?;
        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_duration.clone()))?;

        Ok(Self {
            registry,
            estimates,
            estimate_duration,
            cache_events,
            provider_requests,
            provider_duration,
            http_requests,
            http_duration,
        })
    }

    pub fn record_cache<T>(&self, cache: CacheKind, lookup: &CacheLookup<T>) {
        self.cache_events
            .with_label_values(&[cache.label(), lookup.outcome_label()])
            .inc();
    }

    pub fn record_provider_call(&self, ok: bool, elapsed: Duration) {
        let outcome = if ok { "ok" } else { "error" };
        self.provider_requests.with_label_values(&[outcome]).inc();
        self.provider_duration.observe(elapsed.as_secs_f64());
    }

    /// `outcome` is `cached`, `computed` or `error`.
    pub fn record_estimate(&self, outcome: &str, elapsed: Duration) {
        self.estimates.with_label_values(&[outcome]).inc();
        self.estimate_duration.observe(elapsed.as_secs_f64());
    }

    pub fn record_http(&self, route: &str, status: u16, elapsed: Duration) {
        self.http_requests
            .with_label_values(&[route, &status.to_string()])
            .inc();
        self.http_duration
            .with_label_values(&[route])
            .observe(elapsed.as_secs_f64());
    }

    /// Count of cache events for one cache/outcome pair.
    pub fn cache_count(&self, cache: CacheKind, outcome: &str) -> u64 {
        self.cache_events
            .with_label_values(&[cache.label(), outcome])
            .get()
    }

    pub fn provider_call_count(&self, outcome: &str) -> u64 {
        self.provider_requests.with_label_values(&[outcome]).get()
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
