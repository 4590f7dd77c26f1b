//! Integration tests for the health endpoint.

mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn test_health_returns_200_with_status_ok() {
    let (state, _) = common::test_state();
    common::create_team(&state, "Alpha", "A").await;

    let (status, json) = common::get_json(common::build_test_app(&state), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["teams"], 1);
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (state, _) = common::test_state();

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/api/v1/nonexistent")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(common::build_test_app(&state), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
