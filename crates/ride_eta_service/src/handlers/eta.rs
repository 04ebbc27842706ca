use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tracing::{debug, warn};

use super::error_response;
use crate::contract::parse_eta_request;
use crate::AppState;

/// `POST /eta`: 200 with the estimate, 400 on invalid input, 500 when the
/// routing provider fails.
pub async fn estimate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let response = respond(&state, body).await;
    state.record_http("/eta", response.status(), started);
    response
}

async fn respond(state: &AppState, body: Result<Json<Value>, JsonRejection>) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "rejected /eta body");
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("invalid JSON body: {}", rejection.body_text()),
            );
        }
    };

    let request = match parse_eta_request(&body) {
        Ok(request) => request,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.message()),
    };

    match state.eta.estimate(request).await {
        Ok(estimate) => (StatusCode::OK, Json(estimate)).into_response(),
        Err(err) => {
            warn!(error = %err, mode = %request.mode, "eta estimate failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
