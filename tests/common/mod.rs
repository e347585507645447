//! Shared test utilities for integration tests.
//!
//! This module provides a mock service client, sample process definitions,
//! request builders, and proptest strategies used across integration tests.

#![allow(dead_code)] // These utilities are used by other integration test files

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use durable_process_sdk::api::{
    self, AsyncStateExecuteRequest, AsyncStateWaitUntilRequest, EncodedObject, LocalQueueMessageResult,
    LocalQueueResult, ProcessExecutionDescribeRequest, ProcessExecutionDescribeResponse,
    ProcessExecutionStartRequest, ProcessExecutionStartResponse, ProcessExecutionStopRequest,
    PublishToLocalQueueRequest, TableColumnValue, TableReadResponse,
};
use durable_process_sdk::persistence::{
    DbColumnDef, DbTableSchema, GlobalAttributesSchema, LocalAttributeDef, LocalAttributeLoadingType,
    LocalAttributesSchema,
};
use durable_process_sdk::serdes::JsonObjectEncoder;
use durable_process_sdk::{
    AsyncState, AsyncStateOptions, Command, CommandRequest, CommandResults, CommandStatus, Communication, Context,
    DatabaseLockingType, Object, Persistence, PersistenceSchema, Process, ProcessError, ProcessResult,
    ProcessServiceClient, Registry, RetryPolicy, StateApiType, StateDecision, StateSchema, ThreadCloseType,
    WorkerService,
};
use proptest::prelude::*;
use serde::Serialize;

pub const TEST_PROCESS_ID: &str = "order-1";
pub const TEST_EXECUTION_ID: &str = "exec-1";

// =============================================================================
// Mock Client for Integration Tests
// =============================================================================

/// A call received by [`MockProcessServiceClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    Start(ProcessExecutionStartRequest),
    Stop(ProcessExecutionStopRequest),
    Describe(ProcessExecutionDescribeRequest),
    Publish(PublishToLocalQueueRequest),
}

/// A mock implementation of ProcessServiceClient for integration tests.
///
/// Start and describe answers are taken from queues filled by the test; an
/// empty queue yields a default success. Every call is recorded.
#[derive(Default)]
pub struct MockProcessServiceClient {
    start_responses: Mutex<Vec<ProcessResult<ProcessExecutionStartResponse>>>,
    describe_responses: Mutex<Vec<ProcessResult<ProcessExecutionDescribeResponse>>>,
    calls: Mutex<Vec<ServiceCall>>,
}

impl MockProcessServiceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a response to be returned on the next start call.
    pub fn with_start_response(self, response: ProcessResult<ProcessExecutionStartResponse>) -> Self {
        self.start_responses.lock().unwrap().push(response);
        self
    }

    /// Adds a response to be returned on the next describe call.
    pub fn with_describe_response(self, response: ProcessResult<ProcessExecutionDescribeResponse>) -> Self {
        self.describe_responses.lock().unwrap().push(response);
        self
    }

    /// Returns all recorded calls in arrival order.
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn start_requests(&self) -> Vec<ProcessExecutionStartRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ServiceCall::Start(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn publish_requests(&self) -> Vec<PublishToLocalQueueRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ServiceCall::Publish(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ServiceCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ProcessServiceClient for MockProcessServiceClient {
    async fn start_process(
        &self,
        request: ProcessExecutionStartRequest,
    ) -> ProcessResult<ProcessExecutionStartResponse> {
        let execution_id = format!("exec-{}", request.process_id);
        self.record(ServiceCall::Start(request));
        let mut responses = self.start_responses.lock().unwrap();
        if responses.is_empty() {
            Ok(ProcessExecutionStartResponse {
                process_execution_id: execution_id,
            })
        } else {
            responses.remove(0)
        }
    }

    async fn stop_process(&self, request: ProcessExecutionStopRequest) -> ProcessResult<()> {
        self.record(ServiceCall::Stop(request));
        Ok(())
    }

    async fn describe_current_process_execution(
        &self,
        request: ProcessExecutionDescribeRequest,
    ) -> ProcessResult<ProcessExecutionDescribeResponse> {
        self.record(ServiceCall::Describe(request));
        let mut responses = self.describe_responses.lock().unwrap();
        if responses.is_empty() {
            Ok(ProcessExecutionDescribeResponse::default())
        } else {
            responses.remove(0)
        }
    }

    async fn publish_to_local_queue(&self, request: PublishToLocalQueueRequest) -> ProcessResult<()> {
        self.record(ServiceCall::Publish(request));
        Ok(())
    }
}

// =============================================================================
// Sample Processes
// =============================================================================

/// Receives an order and moves to [`ShipOrder`] with a quantity of 42.
pub struct ReceiveOrder;

impl AsyncState for ReceiveOrder {
    fn execute(
        &self,
        _ctx: &Context,
        _input: Object,
        _command_results: &CommandResults,
        _persistence: &mut Persistence,
        _communication: &mut Communication,
    ) -> ProcessResult<StateDecision> {
        StateDecision::single_next_state(&ShipOrder, &42)
    }
}

/// Ships the quantity it receives, records it, and completes the process.
pub struct ShipOrder;

impl AsyncState for ShipOrder {
    fn options(&self) -> AsyncStateOptions {
        AsyncStateOptions::new()
            .with_skip_wait_until()
            .with_execute_timeout_seconds(10)
            .with_execute_retry_policy(RetryPolicy::with_max_attempts(3))
    }

    fn execute(
        &self,
        _ctx: &Context,
        input: Object,
        _command_results: &CommandResults,
        persistence: &mut Persistence,
        communication: &mut Communication,
    ) -> ProcessResult<StateDecision> {
        let quantity: i64 = input.get()?.unwrap_or_default();
        let status: Option<String> = persistence.get_global_attribute("orderStatus")?;
        if status.as_deref() == Some("cancelled") {
            return Ok(StateDecision::force_fail_process());
        }
        persistence.set_global_attribute("orderStatus", "shipped")?;
        persistence.set_local_attribute("shippedQuantity", &quantity)?;
        communication.publish_to_local_queue("audit", &format!("shipped {}", quantity))?;
        Ok(StateDecision::graceful_complete_process())
    }
}

/// Two-step order process backed by the `orders` table.
pub struct OrderProcess;

impl Process for OrderProcess {
    fn state_schema(&self) -> StateSchema {
        StateSchema::new(ReceiveOrder).with_state(ShipOrder)
    }

    fn persistence_schema(&self) -> PersistenceSchema {
        PersistenceSchema::new(
            Some(GlobalAttributesSchema::new(vec![DbTableSchema::new(
                "orders",
                "order_id",
                DatabaseLockingType::NoLocking,
                vec![
                    DbColumnDef::new("orderStatus", "status", true),
                    DbColumnDef::new("orderTotal", "total", false),
                ],
            )])),
            Some(LocalAttributesSchema::new(
                None,
                vec![LocalAttributeDef::new("shippedQuantity", LocalAttributeLoadingType::LoadNoLock)],
            )),
        )
    }
}

/// Always fails its wait_until and recovers into [`Cleanup`].
pub struct FlakyWait;

impl AsyncState for FlakyWait {
    fn options(&self) -> AsyncStateOptions {
        AsyncStateOptions::new()
            .with_wait_until_retry_policy(RetryPolicy::with_max_attempts(1))
            .with_failure_recovery("Cleanup")
    }

    fn wait_until(
        &self,
        _ctx: &Context,
        _input: Object,
        _communication: &mut Communication,
    ) -> ProcessResult<CommandRequest> {
        Err(ProcessError::user_code("upstream unavailable"))
    }

    fn execute(
        &self,
        _ctx: &Context,
        _input: Object,
        _command_results: &CommandResults,
        _persistence: &mut Persistence,
        _communication: &mut Communication,
    ) -> ProcessResult<StateDecision> {
        Ok(StateDecision::dead_end())
    }
}

/// Reports the phase it recovers from on the `recovered` queue.
pub struct Cleanup;

impl AsyncState for Cleanup {
    fn options(&self) -> AsyncStateOptions {
        AsyncStateOptions::new().with_skip_wait_until()
    }

    fn execute(
        &self,
        ctx: &Context,
        _input: Object,
        _command_results: &CommandResults,
        _persistence: &mut Persistence,
        communication: &mut Communication,
    ) -> ProcessResult<StateDecision> {
        match ctx.recover_from_state_api() {
            Some(from) => {
                communication.publish_to_local_queue("recovered", &from)?;
                Ok(StateDecision::graceful_complete_process())
            }
            None => Ok(StateDecision::force_fail_process()),
        }
    }
}

pub struct RecoveryProcess;

impl Process for RecoveryProcess {
    fn state_schema(&self) -> StateSchema {
        StateSchema::new(FlakyWait).with_state(Cleanup)
    }
}

/// Waits for a timer and two messages on `q`.
pub struct AwaitBoth;

impl AsyncState for AwaitBoth {
    fn wait_until(
        &self,
        _ctx: &Context,
        _input: Object,
        _communication: &mut Communication,
    ) -> ProcessResult<CommandRequest> {
        CommandRequest::all_of(vec![
            Command::timer(Duration::from_secs(5)),
            Command::local_queue("q", 2),
        ])
    }

    fn execute(
        &self,
        _ctx: &Context,
        _input: Object,
        command_results: &CommandResults,
        _persistence: &mut Persistence,
        communication: &mut Communication,
    ) -> ProcessResult<StateDecision> {
        let timer = command_results.first_timer_status()?;
        let queue = command_results.first_local_queue_command()?;
        if timer == CommandStatus::CompletedCommand && queue.status() == CommandStatus::CompletedCommand {
            let total: i64 = queue
                .messages()
                .iter()
                .map(|m| m.get::<i64>().map(Option::unwrap_or_default))
                .sum::<ProcessResult<i64>>()?;
            communication.publish_to_local_queue("both", &total)?;
            return Ok(StateDecision::graceful_complete_process());
        }
        Ok(StateDecision::dead_end())
    }
}

pub struct BatchProcess;

impl Process for BatchProcess {
    fn state_schema(&self) -> StateSchema {
        StateSchema::new(AwaitBoth)
    }
}

/// Publishes every queue name of its input, in order, with the index as payload.
pub struct Fanout;

impl AsyncState for Fanout {
    fn wait_until(
        &self,
        _ctx: &Context,
        input: Object,
        communication: &mut Communication,
    ) -> ProcessResult<CommandRequest> {
        let queues: Vec<String> = input.get()?.unwrap_or_default();
        for (i, queue) in queues.iter().enumerate() {
            communication.publish_to_local_queue(queue.as_str(), &i)?;
        }
        Ok(CommandRequest::empty())
    }

    fn execute(
        &self,
        _ctx: &Context,
        _input: Object,
        _command_results: &CommandResults,
        _persistence: &mut Persistence,
        _communication: &mut Communication,
    ) -> ProcessResult<StateDecision> {
        reject_fanout_execute()
    }
}

#[inline(never)]
pub fn reject_fanout_execute() -> ! {
    panic!("fanout execute is not reachable in tests");
}

pub struct FanoutProcess;

impl Process for FanoutProcess {
    fn state_schema(&self) -> StateSchema {
        StateSchema::new(Fanout)
    }
}

// =============================================================================
// Test Helper Functions
// =============================================================================

/// Registry with every sample process.
pub fn create_registry() -> Arc<Registry> {
    let mut registry = Registry::new();
    registry.add_process(OrderProcess).unwrap();
    registry.add_process(RecoveryProcess).unwrap();
    registry.add_process(BatchProcess).unwrap();
    registry.add_process(FanoutProcess).unwrap();
    Arc::new(registry)
}

pub fn create_worker() -> WorkerService {
    WorkerService::new(create_registry())
}

pub fn create_mock_client() -> Arc<MockProcessServiceClient> {
    Arc::new(MockProcessServiceClient::new())
}

/// Encodes a value the way the default encoder does.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> EncodedObject {
    let encoder = JsonObjectEncoder::shared();
    encoder.encode(value).unwrap()
}

pub fn create_context(attempt: i32) -> api::Context {
    api::Context {
        process_id: TEST_PROCESS_ID.to_string(),
        process_execution_id: TEST_EXECUTION_ID.to_string(),
        state_execution_id: Some("state-exec-1".to_string()),
        attempt: Some(attempt),
        ..Default::default()
    }
}

/// Context of a failure recovery invocation.
pub fn create_recovery_context(from: StateApiType) -> api::Context {
    api::Context {
        recover_from_state_execution_id: Some("FlakyWait-1".to_string()),
        recover_from_api: Some(from),
        ..create_context(1)
    }
}

pub fn create_wait_until_request(
    process_type: &str,
    state_id: &str,
    input: Option<EncodedObject>,
) -> AsyncStateWaitUntilRequest {
    AsyncStateWaitUntilRequest {
        process_type: process_type.to_string(),
        state_id: state_id.to_string(),
        state_input: input,
        context: create_context(1),
    }
}

pub fn create_execute_request(
    process_type: &str,
    state_id: &str,
    input: Option<EncodedObject>,
) -> AsyncStateExecuteRequest {
    AsyncStateExecuteRequest {
        process_type: process_type.to_string(),
        state_id: state_id.to_string(),
        state_input: input,
        context: create_context(1),
        command_results: None,
        loaded_global_attributes: None,
        loaded_local_attributes: None,
    }
}

/// Loaded row of the `orders` table with the given status.
pub fn create_orders_row(status: &str) -> api::LoadGlobalAttributeResponse {
    api::LoadGlobalAttributeResponse {
        table_responses: vec![TableReadResponse {
            table_name: "orders".to_string(),
            columns: vec![TableColumnValue {
                db_column: "status".to_string(),
                db_query_value: status.to_string(),
            }],
        }],
    }
}

/// Command results for [`AwaitBoth`].
pub fn create_batch_results(
    timer: CommandStatus,
    queue: CommandStatus,
    messages: &[i64],
) -> api::CommandResults {
    api::CommandResults {
        timer_results: vec![api::TimerResult { status: timer }],
        local_queue_results: vec![LocalQueueResult {
            queue_name: "q".to_string(),
            status: queue,
            messages: messages
                .iter()
                .map(|m| LocalQueueMessageResult {
                    dedup_id: None,
                    payload: Some(encode(m)),
                })
                .collect(),
        }],
    }
}

// =============================================================================
// Proptest Strategies
// =============================================================================

/// Strategy for generating command statuses.
pub fn command_status_strategy() -> impl Strategy<Value = CommandStatus> {
    prop_oneof![
        Just(CommandStatus::WaitingCommand),
        Just(CommandStatus::CompletedCommand),
        Just(CommandStatus::SkippedCommand),
    ]
}

/// Strategy for generating thread close types.
pub fn close_type_strategy() -> impl Strategy<Value = ThreadCloseType> {
    prop_oneof![
        Just(ThreadCloseType::GracefulCompleteProcess),
        Just(ThreadCloseType::ForceCompleteProcess),
        Just(ThreadCloseType::ForceFailProcess),
        Just(ThreadCloseType::DeadEnd),
    ]
}

/// Strategy for generating queue names.
pub fn queue_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}"
}

/// Strategy for generating arbitrary JSON payloads: primitives, arrays, and
/// maps nested a few levels deep.
pub fn json_payload_strategy() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        (-4000i32..4000).prop_map(|q| serde_json::Value::from(f64::from(q) / 4.0)),
        "[a-zA-Z0-9 ]{0,16}".prop_map(serde_json::Value::from),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    })
}
