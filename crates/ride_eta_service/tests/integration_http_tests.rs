mod support;

use axum::http::{header, StatusCode};
use ride_core::test_helpers::{CountingRouteProvider, FailingRouteProvider};
use serde_json::json;
use support::{body_json, body_text, get, post_json, send, test_app};

const HAPPY_PATH: &str =
    r#"{"startLat": -2.1552, "startLng": -79.8946, "endLat": -2.1815, "endLng": -79.8765}"#;

#[tokio::test]
async fn eta_happy_path_returns_the_estimate() {
    let (app, _) = test_app(CountingRouteProvider::new());
    let response = send(&app, post_json("/eta", HAPPY_PATH)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["etaMinutes"], json!(8));
    assert_eq!(body["source"], json!("default"));
    assert_eq!(body["confidence"], json!(0.3));
    let distance = body["distanceKm"].as_f64().expect("distanceKm");
    assert!((3.4..3.8).contains(&distance), "distance {distance}");
    assert!(body["routeGeometry"].is_array());
}

#[tokio::test]
async fn repeated_requests_hit_the_cache() {
    let provider = CountingRouteProvider::new();
    let (app, state) = test_app(provider.clone());
    for _ in 0..3 {
        let response = send(&app, post_json("/eta", HAPPY_PATH)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(provider.calls(), 1);
    assert_eq!(
        state
            .metrics()
            .cache_count(ride_core::metrics::CacheKind::Eta, "hit"),
        2
    );
}

#[tokio::test]
async fn non_numeric_coordinate_is_a_bad_request() {
    let (app, _) = test_app(CountingRouteProvider::new());
    let response = send(
        &app,
        post_json(
            "/eta",
            r#"{"startLat": "abc", "startLng": -79.8946, "endLat": -2.1815, "endLng": -79.8765}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"error": "startLat must be numeric"})
    );
}

#[tokio::test]
async fn unknown_mode_and_malformed_json_are_bad_requests() {
    let (app, _) = test_app(CountingRouteProvider::new());
    let response = send(
        &app,
        post_json(
            "/eta",
            r#"{"startLat": -2.1552, "startLng": -79.8946, "endLat": -2.1815, "endLng": -79.8765, "mode": "bike"}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, post_json("/eta", "{not json")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn upstream_failure_is_a_server_error() {
    let (app, _) = test_app(FailingRouteProvider::new());
    let response = send(&app, post_json("/eta", HAPPY_PATH)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .is_some_and(|error| error.contains("503")));
}

#[tokio::test]
async fn health_reports_provider_state() {
    let (app, _) = test_app(CountingRouteProvider::new());
    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"ok": true, "osrm": "up"}));

    let (app, _) = test_app(FailingRouteProvider::new());
    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"ok": true, "osrm": "down"}));
}

#[tokio::test]
async fn metrics_expose_cache_and_http_series() {
    let (app, _) = test_app(CountingRouteProvider::new());
    send(&app, post_json("/eta", HAPPY_PATH)).await;
    send(&app, post_json("/eta", HAPPY_PATH)).await;

    let response = send(&app, get("/metrics")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
        Some("text/plain; version=0.0.4".as_bytes())
    );
    let text = body_text(response).await;
    assert!(text.contains("eta_cache_events_total"));
    assert!(text.contains(r#"outcome="hit""#));
    assert!(text.contains("http_requests_total"));
    assert!(text.contains(r#"route="/eta""#));
}
