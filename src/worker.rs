//! Worker dispatcher for the server's state callbacks.
//!
//! The server calls back into the worker for every phase of every state:
//! [`WorkerService::handle_wait_until`] and [`WorkerService::handle_execute`]
//! resolve the state in the [`Registry`], run the user phase, and marshal the
//! result into the wire response.
//!
//! ## Failure handling
//!
//! User phase code runs behind a single recovery point. A returned error or a
//! panic becomes [`ProcessError::WorkerExecution`] carrying the message and a
//! stack trace; the server applies the state's retry policy and, once that is
//! exhausted, its failure recovery. Errors outside user code (an unknown
//! state, an invalid decision) keep their own type.
//!
//! Each invocation runs inside an `async_state` tracing span created by
//! [`create_state_span`].

use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};

use crate::api::{
    self, AsyncStateExecuteRequest, AsyncStateExecuteResponse, AsyncStateWaitUntilRequest,
    AsyncStateWaitUntilResponse, StateApiType,
};
use crate::command_results::CommandResults;
use crate::communication::Communication;
use crate::context::Context;
use crate::error::{ProcessError, ProcessResult};
use crate::marshal::to_api_decision;
use crate::object::Object;
use crate::persistence::Persistence;
use crate::registry::Registry;
use crate::serdes::{BasicDbConverter, JsonObjectEncoder, SharedDbConverter, SharedObjectEncoder};

/// Path the server posts `wait_until` callbacks to.
pub const API_PATH_ASYNC_STATE_WAIT_UNTIL: &str = "/api/v1/xcherry/worker/async-state/wait-until";

/// Path the server posts `execute` callbacks to.
pub const API_PATH_ASYNC_STATE_EXECUTE: &str = "/api/v1/xcherry/worker/async-state/execute";

/// Options of a [`WorkerService`].
///
/// # Example
///
/// ```
/// use durable_process_sdk::serdes::{BasicDbConverter, JsonObjectEncoder};
/// use durable_process_sdk::WorkerOptions;
///
/// let options = WorkerOptions::new()
///     .with_object_encoder(JsonObjectEncoder::shared())
///     .with_db_converter(BasicDbConverter::shared());
/// assert_eq!(options.object_encoder.encoding(), "rustJson");
/// ```
#[derive(Clone)]
pub struct WorkerOptions {
    /// Encoder for state inputs, queue messages, and local attributes
    pub object_encoder: SharedObjectEncoder,
    /// Converter for global attribute values
    pub db_converter: SharedDbConverter,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            object_encoder: JsonObjectEncoder::shared(),
            db_converter: BasicDbConverter::shared(),
        }
    }
}

impl WorkerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object_encoder(mut self, encoder: SharedObjectEncoder) -> Self {
        self.object_encoder = encoder;
        self
    }

    pub fn with_db_converter(mut self, converter: SharedDbConverter) -> Self {
        self.db_converter = converter;
        self
    }
}

impl std::fmt::Debug for WorkerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerOptions")
            .field("object_encoder", &self.object_encoder.encoding())
            .field("db_converter", &"<dyn DbConverter>")
            .finish()
    }
}

/// Handles state callbacks for the processes of a registry.
#[derive(Debug, Clone)]
pub struct WorkerService {
    registry: Arc<Registry>,
    options: WorkerOptions,
}

impl WorkerService {
    /// Creates a service with default options.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_options(registry, WorkerOptions::default())
    }

    pub fn with_options(registry: Arc<Registry>, options: WorkerOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    /// Runs the `wait_until` phase of a state.
    ///
    /// Fails with a worker execution error when the state skips `wait_until`,
    /// since the server never calls it for such states.
    pub fn handle_wait_until(&self, request: AsyncStateWaitUntilRequest) -> ProcessResult<AsyncStateWaitUntilResponse> {
        let span = create_state_span(
            StateApiType::WaitUntilApi,
            &request.process_type,
            &request.state_id,
            &request.context,
        );
        let _entered = span.enter();
        tracing::debug!("Dispatching wait_until");

        let result = self.wait_until(request);
        log_outcome(&result);
        result
    }

    fn wait_until(&self, request: AsyncStateWaitUntilRequest) -> ProcessResult<AsyncStateWaitUntilResponse> {
        let (_, state) = self.registry.state(&request.process_type, &request.state_id)?;
        if state.options().skip_wait_until {
            return Err(ProcessError::worker_execution(
                format!("state '{}' skips wait_until and cannot be asked for it", state.state_id()),
                Backtrace::force_capture().to_string(),
            ));
        }

        let encoder = &self.options.object_encoder;
        let ctx = Context::new(request.context);
        let input = Object::from_optional(request.state_input, encoder.clone());
        let mut communication = Communication::new(encoder.clone());

        let command_request = run_user_code(|| state.state().wait_until(&ctx, input, &mut communication))?;

        Ok(AsyncStateWaitUntilResponse {
            command_request: command_request.to_api(),
            publish_to_local_queue: communication.into_messages(),
        })
    }

    /// Runs the `execute` phase of a state.
    ///
    /// The response carries the marshalled decision, the queue publishes in
    /// call order, and the attribute writes of the invocation.
    pub fn handle_execute(&self, request: AsyncStateExecuteRequest) -> ProcessResult<AsyncStateExecuteResponse> {
        let span = create_state_span(
            StateApiType::ExecuteApi,
            &request.process_type,
            &request.state_id,
            &request.context,
        );
        let _entered = span.enter();
        tracing::debug!("Dispatching execute");

        let result = self.execute(request);
        log_outcome(&result);
        result
    }

    fn execute(&self, request: AsyncStateExecuteRequest) -> ProcessResult<AsyncStateExecuteResponse> {
        let (process, state) = self.registry.state(&request.process_type, &request.state_id)?;

        let encoder = &self.options.object_encoder;
        let mut persistence = Persistence::new(
            self.options.db_converter.clone(),
            encoder.clone(),
            process.schema_index().clone(),
            request.loaded_global_attributes.as_ref(),
            request.loaded_local_attributes.as_ref(),
        )?;
        let ctx = Context::new(request.context);
        let input = Object::from_optional(request.state_input, encoder.clone());
        let command_results = CommandResults::from_api(request.command_results, encoder);
        let mut communication = Communication::new(encoder.clone());

        let decision = run_user_code(|| {
            state
                .state()
                .execute(&ctx, input, &command_results, &mut persistence, &mut communication)
        })?;

        Ok(AsyncStateExecuteResponse {
            state_decision: to_api_decision(process, &decision, encoder)?,
            publish_to_local_queue: communication.into_messages(),
            write_to_global_attributes: persistence.global_attributes_to_update(),
            write_to_local_attributes: persistence.local_attributes_to_update(),
        })
    }
}

/// Creates the tracing span a state phase runs in.
///
/// Fields: `api`, `process_type`, `state_id`, `process_id`, and the
/// 1-indexed `attempt`.
pub fn create_state_span(
    api: StateApiType,
    process_type: &str,
    state_id: &str,
    context: &api::Context,
) -> tracing::Span {
    tracing::info_span!(
        "async_state",
        api = ?api,
        process_type = process_type,
        state_id = state_id,
        process_id = context.process_id.as_str(),
        attempt = context.attempt.unwrap_or(1),
    )
}

/// The recovery point for user phase code.
thread_local! {
    static IN_USER_CODE: Cell<bool> = const { Cell::new(false) };
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chains a panic hook that records the backtrace of panics raised by user
/// phase code while the panicking frames are still on the stack.
///
/// Panics outside user code go to the previously installed hook.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if IN_USER_CODE.with(Cell::get) {
                let trace = Backtrace::force_capture().to_string();
                PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            } else {
                previous(info);
            }
        }));
    });
}

fn run_user_code<T>(phase: impl FnOnce() -> ProcessResult<T>) -> ProcessResult<T> {
    install_panic_hook();
    let outer = IN_USER_CODE.with(|flag| flag.replace(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(phase));
    IN_USER_CODE.with(|flag| flag.set(outer));

    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(ProcessError::worker_execution(
            error.to_string(),
            Backtrace::force_capture().to_string(),
        )),
        Err(payload) => {
            let stack_trace = PANIC_TRACE
                .with(|slot| slot.borrow_mut().take())
                .unwrap_or_else(|| Backtrace::force_capture().to_string());
            Err(ProcessError::worker_execution(
                format!("panic: {}", panic_message(payload.as_ref())),
                stack_trace,
            ))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn log_outcome<T>(result: &ProcessResult<T>) {
    match result {
        Ok(_) => tracing::debug!("State phase completed"),
        Err(ProcessError::WorkerExecution { message, stack_trace }) => {
            tracing::warn!(error = %message, stack_trace = %stack_trace, "State phase failed");
        }
        Err(error) => tracing::warn!(error = %error, "State phase rejected"),
    }
}
