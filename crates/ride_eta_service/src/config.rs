use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use ride_core::eta::EtaConfig;
use ride_core::routing::osrm::DEFAULT_OSRM_ENDPOINT;
use ride_core::routing::RouteProviderKind;

/// Routing backend behind the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderChoice {
    /// OSRM over HTTP at `--osrm-url`.
    Osrm,
    /// Haversine legs, no network. Useful offline.
    StraightLine,
}

/// Command line and environment configuration for `eta_server`.
///
/// Every flag has an environment fallback; the log level only changes
/// diagnostic volume.
#[derive(Debug, Clone, Parser)]
#[command(name = "eta_server", about = "ETA and route cache HTTP service")]
pub struct ServiceConfig {
    /// Base URL of the OSRM routing service
    #[arg(long, env = "OSRM_URL", default_value = DEFAULT_OSRM_ENDPOINT)]
    pub osrm_url: String,

    /// Port to listen on (all interfaces)
    #[arg(long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    /// Default tracing filter; RUST_LOG overrides it
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Lifetime of route and ETA cache entries
    #[arg(long, env = "ETA_CACHE_TTL_SECS", default_value_t = 15)]
    pub cache_ttl_secs: u64,

    /// Per-request timeout for the routing provider
    #[arg(long, env = "OSRM_TIMEOUT_SECS", default_value_t = 5)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "ROUTE_PROVIDER", value_enum, default_value_t = ProviderChoice::Osrm)]
    pub provider: ProviderChoice,
}

impl ServiceConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    pub fn eta_config(&self) -> EtaConfig {
        EtaConfig {
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            ..EtaConfig::default()
        }
    }

    pub fn route_provider_kind(&self) -> RouteProviderKind {
        match self.provider {
            ProviderChoice::Osrm => RouteProviderKind::Osrm {
                endpoint: self.osrm_url.trim_end_matches('/').to_string(),
                timeout: Duration::from_secs(self.request_timeout_secs),
            },
            ProviderChoice::StraightLine => RouteProviderKind::StraightLine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = ServiceConfig::try_parse_from(["eta_server"]).expect("defaults parse");
        assert_eq!(config.port, 4000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.eta_config().cache_ttl, Duration::from_secs(15));
        assert_eq!(
            config.route_provider_kind(),
            RouteProviderKind::Osrm {
                endpoint: DEFAULT_OSRM_ENDPOINT.to_string(),
                timeout: Duration::from_secs(5),
            }
        );
    }

    #[test]
    fn flags_override_defaults() {
        let config = ServiceConfig::try_parse_from([
            "eta_server",
            "--osrm-url",
            "http://localhost:5000/",
            "--port",
            "8080",
            "--cache-ttl-secs",
            "30",
            "--provider",
            "straight-line",
        ])
        .expect("flags parse");
        assert_eq!(config.bind_addr().port(), 8080);
        assert_eq!(config.eta_config().cache_ttl, Duration::from_secs(30));
        assert_eq!(config.route_provider_kind(), RouteProviderKind::StraightLine);
    }
}
