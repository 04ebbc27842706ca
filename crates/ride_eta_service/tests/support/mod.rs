#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use ride_core::eta::{EtaConfig, EtaService};
use ride_core::metrics::EtaMetrics;
use ride_core::routing::RouteProvider;
use ride_core::speed::StaticSpeedTable;
use ride_eta_service::{build_router, AppState};
use serde_json::Value;
use tower::ServiceExt;

/// Router and state over `provider` with default cache settings.
pub fn test_app(provider: Arc<dyn RouteProvider>) -> (Router, Arc<AppState>) {
    let metrics = EtaMetrics::new().expect("metrics registry");
    let eta = EtaService::new(
        provider,
        Arc::new(StaticSpeedTable::default()),
        EtaConfig::default(),
        metrics,
    );
    let state = Arc::new(AppState::new(eta));
    (build_router(state.clone()), state)
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("infallible router")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).expect("json body")
}
