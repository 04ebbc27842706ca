use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::ServiceError;

/// Install the global `fmt` subscriber. `level` is the default directive;
/// `RUST_LOG` directives are layered on top when set.
pub fn init_logging(level: &str) -> Result<(), ServiceError> {
    let directive: Directive = level
        .parse()
        .map_err(|err| ServiceError::Logging(format!("invalid log level '{level}': {err}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(directive)
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|err| ServiceError::Logging(err.to_string()))
}
