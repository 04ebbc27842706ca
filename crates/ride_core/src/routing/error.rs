use thiserror::Error;

/// Errors encountered while asking a routing provider for a route.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing request timed out")]
    Timeout,

    #[error("routing transport error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("routing provider answered HTTP {0}")]
    Status(u16),

    #[error("routing provider returned code {code}: {message}")]
    Api { code: String, message: String },

    #[error("no route between the requested points")]
    NoRoute,

    #[error("failed to build routing request: {0}")]
    Request(String),
}

impl From<reqwest::Error> for RoutingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RoutingError::Timeout
        } else {
            RoutingError::Http(err)
        }
    }
}
