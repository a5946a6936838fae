mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use common::{body_string, get, test_config, Behaviour, FakeConverter};
use markitdown_server::build_router;
use markitdown_server::AppState;

fn starting_state() -> AppState {
    AppState::new(&test_config(1))
}

#[tokio::test]
async fn liveness_ignores_converter_state() {
    let ready = starting_state().with_converter(FakeConverter::new(Behaviour::Echo));

    for state in [starting_state(), ready] {
        let response = build_router(state).oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Markitdown server is running.");
    }
}

#[tokio::test]
async fn readiness_reports_ready_with_converter() {
    let state = starting_state().with_converter(FakeConverter::new(Behaviour::Echo));

    let response = build_router(state).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, json!({"status": "ready", "service": "markitdown-server"}));
}

#[tokio::test]
async fn readiness_fails_without_converter() {
    let response = build_router(starting_state())
        .oneshot(get("/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "not ready");
    assert!(body["error"].as_str().unwrap().contains("not initialised"));
}

#[tokio::test]
async fn readiness_flips_once_converter_is_installed() {
    let state = starting_state();
    let app = build_router(state.clone());

    let before = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(before.status(), StatusCode::SERVICE_UNAVAILABLE);

    assert!(state.install_converter(FakeConverter::new(Behaviour::Echo)));
    assert!(!state.install_converter(FakeConverter::new(Behaviour::Fail("late"))));

    let after = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(after.status(), StatusCode::OK);
}

#[tokio::test]
async fn convert_route_only_accepts_post() {
    let response = build_router(starting_state())
        .oneshot(get("/convert"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
