//! Integration tests for team lifecycle and estimation rounds.

mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

fn card(value: f64) -> Value {
    json!({ "kind": "value", "value": value })
}

async fn post(state: &planning_poker_api::state::AppState, uri: &str, body: &Value) -> (StatusCode, Value) {
    common::post_json(common::build_test_app(state), uri, body).await
}

#[tokio::test]
async fn test_full_round_delivers_result_to_everyone() {
    // Arrange
    let (state, publisher) = common::test_state();
    let a = common::create_team(&state, "Alpha", "A").await;
    let b = common::join_member(&state, "Alpha", "B").await;
    common::join_member(&state, "Alpha", "C").await;

    // Act
    let (status, _) = post(&state, "/api/v1/teams/Alpha/estimation/start", &Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post(
        &state,
        "/api/v1/teams/Alpha/estimation/submit",
        &json!({ "participant": "B", "estimate": card(5.0) }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post(
        &state,
        "/api/v1/teams/Alpha/estimation/submit",
        &json!({ "participant": "C", "estimate": card(8.0) }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Assert
    let (status, json) = common::poll(&state, "Alpha", "A", &a, 0).await;
    assert_eq!(status, StatusCode::OK);
    let messages = json["messages"].as_array().unwrap();
    let ids: Vec<u64> = messages.iter().map(|m| m["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    let ended = &messages[5];
    assert_eq!(ended["message_type"], "estimation_ended");
    assert_eq!(ended["estimation_result"]["sum"], 13.0);
    assert_eq!(ended["estimation_result"]["average"], 6.5);
    assert_eq!(ended["estimation_result"]["median"], 6.5);

    let (_, json) = common::poll(&state, "Alpha", "B", &b, 0).await;
    let types: Vec<&str> = json["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message_type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        vec![
            "member_joined",
            "estimation_started",
            "member_estimated",
            "member_estimated",
            "estimation_ended",
        ]
    );

    let (_, team) = common::get_json(common::build_test_app(&state), "/api/v1/teams/Alpha").await;
    assert_eq!(team["state"], "idle");
    assert_eq!(team["last_result"]["entries"].as_array().unwrap().len(), 2);
    assert!(publisher.published_events().len() >= 6);
}

#[tokio::test]
async fn test_team_view_hides_estimates_during_a_round() {
    // Arrange
    let (state, _) = common::test_state();
    common::create_team(&state, "Alpha", "A").await;
    common::join_member(&state, "Alpha", "B").await;
    common::join_member(&state, "Alpha", "C").await;
    post(&state, "/api/v1/teams/Alpha/estimation/start", &Value::Null).await;
    post(
        &state,
        "/api/v1/teams/Alpha/estimation/submit",
        &json!({ "participant": "B", "estimate": card(5.0) }),
    )
    .await;

    // Act
    let (status, team) =
        common::get_json(common::build_test_app(&state), "/api/v1/teams/alpha").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(team["state"], "estimating");
    let b = team["participants"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == "B")
        .unwrap();
    assert_eq!(b["has_estimated"], true);
    assert!(b.get("estimate").is_none());
    assert_eq!(team["estimation_participants"], json!(["B", "C"]));
}

#[tokio::test]
async fn test_submit_card_outside_deck_returns_400() {
    // Arrange
    let (state, _) = common::test_state();
    common::create_team(&state, "Alpha", "A").await;
    common::join_member(&state, "Alpha", "B").await;
    post(&state, "/api/v1/teams/Alpha/estimation/start", &Value::Null).await;

    // Act
    let (status, json) = post(
        &state,
        "/api/v1/teams/Alpha/estimation/submit",
        &json!({ "participant": "B", "estimate": card(7.0) }),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_duplicate_team_name_returns_400() {
    let (state, _) = common::test_state();
    common::create_team(&state, "Alpha", "A").await;

    let (status, json) = post(
        &state,
        "/api/v1/teams",
        &json!({ "team_name": "ALPHA", "scrum_master": "Z" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_timer_start_reports_end_time_and_cancel_clears_it() {
    // Arrange
    let (state, _) = common::test_state();
    common::create_team(&state, "Alpha", "A").await;
    common::join_member(&state, "Alpha", "B").await;
    post(&state, "/api/v1/teams/Alpha/estimation/start", &Value::Null).await;

    // Act
    let (status, json) = post(
        &state,
        "/api/v1/teams/Alpha/timer/start",
        &json!({ "duration_secs": 60 }),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["end_time"], "2026-01-15T10:01:00Z");

    let (status, _) = post(&state, "/api/v1/teams/Alpha/timer/cancel", &Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    let (status, json) = post(&state, "/api/v1/teams/Alpha/timer/cancel", &Value::Null).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "illegal_transition");
}

#[tokio::test]
async fn test_change_deck_is_rejected_during_a_round() {
    // Arrange
    let (state, _) = common::test_state();
    common::create_team(&state, "Alpha", "A").await;
    common::join_member(&state, "Alpha", "B").await;

    // Act
    let (idle_status, _) = post(
        &state,
        "/api/v1/teams/Alpha/deck",
        &json!({ "deck": "fibonacci" }),
    )
    .await;
    post(&state, "/api/v1/teams/Alpha/estimation/start", &Value::Null).await;
    let (busy_status, json) = post(
        &state,
        "/api/v1/teams/Alpha/deck",
        &json!({ "deck": "standard" }),
    )
    .await;

    // Assert
    assert_eq!(idle_status, StatusCode::OK);
    assert_eq!(busy_status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "illegal_transition");
    let (_, team) = common::get_json(common::build_test_app(&state), "/api/v1/teams/Alpha").await;
    assert_eq!(team["deck"].as_array().unwrap().len(), 13);
    assert_eq!(team["deck"][10], card(89.0));
}

#[tokio::test]
async fn test_disconnect_removes_member_and_keeps_scrum_master_dormant() {
    // Arrange
    let (state, _) = common::test_state();
    common::create_team(&state, "Alpha", "A").await;
    common::join_member(&state, "Alpha", "B").await;

    // Act
    let (member_status, _) = post(
        &state,
        "/api/v1/teams/Alpha/disconnect",
        &json!({ "participant": "B" }),
    )
    .await;
    let (owner_status, _) = post(
        &state,
        "/api/v1/teams/Alpha/disconnect",
        &json!({ "participant": "A" }),
    )
    .await;

    // Assert
    assert_eq!(member_status, StatusCode::OK);
    assert_eq!(owner_status, StatusCode::OK);
    let (_, team) = common::get_json(common::build_test_app(&state), "/api/v1/teams/Alpha").await;
    let participants = team["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0]["name"], "A");
    assert_eq!(participants[0]["is_dormant"], true);
}

#[tokio::test]
async fn test_unknown_participant_returns_404() {
    let (state, _) = common::test_state();
    common::create_team(&state, "Alpha", "A").await;

    let (status, json) = post(
        &state,
        "/api/v1/teams/Alpha/reconnect",
        &json!({ "participant": "Nobody" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "participant_not_found");
}
