use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::contract::HealthBody;
use crate::AppState;

/// `GET /health`: the service answers while it runs; `osrm` reports whether a
/// zero-length probe route succeeded.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let started = Instant::now();
    let up = state.eta.provider_is_up(state.health_probe).await;
    let response = (
        StatusCode::OK,
        Json(HealthBody {
            ok: true,
            osrm: if up { "up" } else { "down" },
        }),
    )
        .into_response();
    state.record_http("/health", response.status(), started);
    response
}
