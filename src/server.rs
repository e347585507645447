//! HTTP surface of the worker.
//!
//! Mounts the two callback endpoints of a [`WorkerService`] on an axum
//! [`Router`]. Phase code is synchronous and runs on the blocking pool.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use durable_process_sdk::{server, Registry, WorkerService};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::new();
//! let service = Arc::new(WorkerService::new(Arc::new(registry)));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8803").await?;
//! axum::serve(listener, server::router(service)).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::Serialize;

use crate::api::{AsyncStateExecuteRequest, AsyncStateWaitUntilRequest};
use crate::error::{ProcessError, ProcessResult, WorkerErrorResponse};
use crate::worker::{WorkerService, API_PATH_ASYNC_STATE_EXECUTE, API_PATH_ASYNC_STATE_WAIT_UNTIL};

/// Builds the router serving the worker callbacks.
///
/// Successful phases answer 200 with the JSON response. Failed phases answer
/// 500 with a [`WorkerErrorResponse`] body.
pub fn router(service: Arc<WorkerService>) -> Router {
    Router::new()
        .route(API_PATH_ASYNC_STATE_WAIT_UNTIL, post(wait_until))
        .route(API_PATH_ASYNC_STATE_EXECUTE, post(execute))
        .with_state(service)
}

async fn wait_until(
    State(service): State<Arc<WorkerService>>,
    Json(request): Json<AsyncStateWaitUntilRequest>,
) -> Response {
    dispatch(move || service.handle_wait_until(request)).await
}

async fn execute(
    State(service): State<Arc<WorkerService>>,
    Json(request): Json<AsyncStateExecuteRequest>,
) -> Response {
    dispatch(move || service.handle_execute(request)).await
}

async fn dispatch<T, F>(phase: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce() -> ProcessResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(phase).await {
        Ok(Ok(body)) => (StatusCode::OK, Json(body)).into_response(),
        Ok(Err(error)) => error_response(&error),
        Err(join_error) => error_response(&ProcessError::worker_execution(
            format!("worker task failed: {}", join_error),
            String::new(),
        )),
    }
}

fn error_response(error: &ProcessError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(WorkerErrorResponse::from(error)),
    )
        .into_response()
}
