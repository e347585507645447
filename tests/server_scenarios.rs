//! Integration tests for the worker HTTP surface.
//!
//! Requests are sent as JSON through the axum router, exactly as the server
//! would send them, and responses are read back from the wire form.

#![cfg(feature = "server")]

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use durable_process_sdk::api::{AsyncStateExecuteResponse, AsyncStateWaitUntilResponse};
use durable_process_sdk::worker::{API_PATH_ASYNC_STATE_EXECUTE, API_PATH_ASYNC_STATE_WAIT_UNTIL};
use durable_process_sdk::{server, CommandWaitingType, StateApiType, ThreadCloseType, WorkerErrorResponse};
use serde::Serialize;
use tower::ServiceExt;

use common::*;

fn create_app() -> Router {
    server::router(Arc::new(create_worker()))
}

async fn post_json<T: Serialize>(app: Router, path: &str, body: &T) -> (StatusCode, Vec<u8>) {
    post_raw(app, path, serde_json::to_vec(body).unwrap()).await
}

async fn post_raw(app: Router, path: &str, body: Vec<u8>) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn test_execute_over_http() {
    let request = create_execute_request("OrderProcess", "ReceiveOrder", None);
    let (status, body) = post_json(create_app(), API_PATH_ASYNC_STATE_EXECUTE, &request).await;

    assert_eq!(status, StatusCode::OK);
    let response: AsyncStateExecuteResponse = serde_json::from_slice(&body).unwrap();
    let movement = &response.state_decision.next_states[0];
    assert_eq!(movement.state_id, "ShipOrder");
    assert_eq!(movement.state_input, Some(encode(&42)));
    assert!(movement.state_config.is_some());
}

#[tokio::test]
async fn test_routes_use_xcherry_worker_paths() {
    let request = create_wait_until_request("BatchProcess", "AwaitBoth", None);
    let (status, _) = post_json(create_app(), "/api/v1/xcherry/worker/async-state/wait-until", &request).await;
    assert_eq!(status, StatusCode::OK);

    let request = create_execute_request("OrderProcess", "ReceiveOrder", None);
    let (status, _) = post_json(create_app(), "/api/v1/xcherry/worker/async-state/execute", &request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(create_app(), "/api/v1/xdb/worker/async-state/execute", &request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wire_names_of_execute_response() {
    let mut request = create_execute_request("OrderProcess", "ShipOrder", Some(encode(&2)));
    request.loaded_global_attributes = Some(create_orders_row("paid"));
    let (status, body) = post_json(create_app(), API_PATH_ASYNC_STATE_EXECUTE, &request).await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        json["stateDecision"]["threadCloseDecision"]["closeType"],
        "GracefulCompleteProcess"
    );
    assert_eq!(json["writeToGlobalAttributes"][0]["tableName"], "orders");
    assert_eq!(json["writeToGlobalAttributes"][0]["updateColumns"][0]["dbColumn"], "status");
    assert_eq!(json["writeToLocalAttributes"][0]["key"], "shippedQuantity");
    assert_eq!(json["publishToLocalQueue"][0]["queueName"], "audit");
}

#[tokio::test]
async fn test_wait_until_over_http() {
    let request = create_wait_until_request("BatchProcess", "AwaitBoth", None);
    let (status, body) = post_json(create_app(), API_PATH_ASYNC_STATE_WAIT_UNTIL, &request).await;

    assert_eq!(status, StatusCode::OK);
    let response: AsyncStateWaitUntilResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(response.command_request.waiting_type, CommandWaitingType::AllOfCompletion);
}

#[tokio::test]
async fn test_failed_phase_answers_500_with_stack_trace() {
    let request = create_wait_until_request("RecoveryProcess", "FlakyWait", None);
    let (status, body) = post_json(create_app(), API_PATH_ASYNC_STATE_WAIT_UNTIL, &request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: WorkerErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error_type, "WorkerExecutionError");
    assert!(error.detail.contains("upstream unavailable"));
    assert!(error.stack_trace.is_some());
}

#[tokio::test]
async fn test_panicking_phase_answers_500() {
    let request = create_execute_request("FanoutProcess", "Fanout", None);
    let (status, body) = post_json(create_app(), API_PATH_ASYNC_STATE_EXECUTE, &request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: WorkerErrorResponse = serde_json::from_slice(&body).unwrap();
    assert!(error.detail.starts_with("panic: "));
}

#[tokio::test]
async fn test_recovery_context_over_http() {
    let mut request = create_execute_request("RecoveryProcess", "Cleanup", None);
    request.context = create_recovery_context(StateApiType::WaitUntilApi);
    let (status, body) = post_json(create_app(), API_PATH_ASYNC_STATE_EXECUTE, &request).await;

    assert_eq!(status, StatusCode::OK);
    let response: AsyncStateExecuteResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        response.state_decision.thread_close_decision.unwrap().close_type,
        ThreadCloseType::GracefulCompleteProcess
    );
}

#[tokio::test]
async fn test_malformed_body_is_client_error() {
    let (status, _) = post_raw(create_app(), API_PATH_ASYNC_STATE_EXECUTE, b"not json".to_vec()).await;
    assert!(status.is_client_error());

    let (status, _) = post_raw(create_app(), API_PATH_ASYNC_STATE_EXECUTE, b"{}".to_vec()).await;
    assert!(status.is_client_error());
}
