//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use planning_poker_core::clock::Clock;
use planning_poker_core::replication::EventPublisher;
use planning_poker_test_support::{FixedClock, RecordingEventPublisher};
use tower::ServiceExt;

use planning_poker_api::build_router;
use planning_poker_api::config::AppConfig;
use planning_poker_api::state::AppState;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// Configuration with a short poll wait and a Scrum Master who does not vote.
pub fn test_config() -> AppConfig {
    AppConfig {
        poll_timeout: Duration::from_millis(50),
        scrum_master_votes: false,
        ..AppConfig::default()
    }
}

/// Builds fresh state backed by a recording publisher.
pub fn test_state() -> (AppState, Arc<RecordingEventPublisher>) {
    test_state_with(test_config())
}

/// Builds fresh state with `config` backed by a recording publisher.
pub fn test_state_with(config: AppConfig) -> (AppState, Arc<RecordingEventPublisher>) {
    let publisher = Arc::new(RecordingEventPublisher::new());
    let state = AppState::new(
        config,
        fixed_clock(),
        publisher.clone() as Arc<dyn EventPublisher>,
    );
    (state, publisher)
}

/// Builds the full app router over `state`. Uses the same route structure as
/// `main.rs`.
pub fn build_test_app(state: &AppState) -> Router {
    build_router(state.clone())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, json_request("POST", uri, body)).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, json_request("PUT", uri, body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Creates a team and returns the Scrum Master's session id.
pub async fn create_team(state: &AppState, team: &str, scrum_master: &str) -> String {
    let (status, json) = post_json(
        build_test_app(state),
        "/api/v1/teams",
        &serde_json::json!({ "team_name": team, "scrum_master": scrum_master }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create_team failed: {json}");
    json["session_id"].as_str().unwrap().to_owned()
}

/// Joins a team as a member and returns the new session id.
pub async fn join_member(state: &AppState, team: &str, participant: &str) -> String {
    let (status, json) = post_json(
        build_test_app(state),
        &format!("/api/v1/teams/{team}/join"),
        &serde_json::json!({ "participant": participant, "role": "member" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "join failed: {json}");
    json["session_id"].as_str().unwrap().to_owned()
}

/// Polls a participant's messages.
pub async fn poll(
    state: &AppState,
    team: &str,
    participant: &str,
    session_id: &str,
    last_message_id: u64,
) -> (StatusCode, serde_json::Value) {
    get_json(
        build_test_app(state),
        &format!(
            "/api/v1/teams/{team}/members/{participant}/messages?session_id={session_id}&last_message_id={last_message_id}"
        ),
    )
    .await
}
