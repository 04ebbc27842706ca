use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::AppState;

/// Prometheus text exposition content type.
pub const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// `GET /metrics`.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let started = Instant::now();
    let response = match state.metrics().render() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(err) => {
            warn!(error = %err, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    };
    state.record_http("/metrics", response.status(), started);
    response
}
