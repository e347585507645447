//! Integration tests for worker dispatch scenarios.
//!
//! These tests drive the sample processes through the worker the way the
//! server does: one callback per phase, feeding the outputs of one callback
//! into the requests of the next.

mod common;

use durable_process_sdk::api::{LoadLocalAttributesResponse, StateFailureRecoveryPolicy};
use durable_process_sdk::{
    CommandStatus, CommandWaitingType, ProcessError, StateApiType, ThreadCloseType, WorkerErrorResponse,
};
use proptest::prelude::*;

use common::*;

// =============================================================================
// Movement between states
// =============================================================================

/// A movement produced by `execute` carries the target's input and the
/// target's derived configuration.
#[test]
fn test_movement_carries_input_and_target_config() {
    let worker = create_worker();
    let response = worker
        .handle_execute(create_execute_request("OrderProcess", "ReceiveOrder", None))
        .unwrap();

    let decision = response.state_decision;
    assert!(decision.thread_close_decision.is_none());
    assert_eq!(decision.next_states.len(), 1);

    let movement = &decision.next_states[0];
    assert_eq!(movement.state_id, "ShipOrder");
    assert_eq!(movement.state_input, Some(encode(&42)));

    let expected = worker
        .registry()
        .process("OrderProcess")
        .unwrap()
        .state_config("ShipOrder")
        .unwrap();
    let config = movement.state_config.as_ref().unwrap();
    assert_eq!(config, &expected);
    assert_eq!(config.skip_wait_until, Some(true));
    assert_eq!(config.execute_api_timeout_seconds, Some(10));
    assert_eq!(config.execute_api_retry_policy.as_ref().unwrap().maximum_attempts, Some(3));
}

/// The moved-to state reads its input, the loaded attributes, and reports
/// its writes and publishes.
#[test]
fn test_target_state_writes_attributes_and_publishes() {
    let worker = create_worker();
    let mut request = create_execute_request("OrderProcess", "ShipOrder", Some(encode(&42)));
    request.loaded_global_attributes = Some(create_orders_row("paid"));
    request.loaded_local_attributes = Some(LoadLocalAttributesResponse::default());

    let response = worker.handle_execute(request).unwrap();

    assert_eq!(
        response.state_decision.thread_close_decision.unwrap().close_type,
        ThreadCloseType::GracefulCompleteProcess
    );

    assert_eq!(response.write_to_global_attributes.len(), 1);
    let row = &response.write_to_global_attributes[0];
    assert_eq!(row.table_name, "orders");
    assert_eq!(row.update_columns[0].db_column, "status");
    assert_eq!(row.update_columns[0].db_query_value, "shipped");

    assert_eq!(response.write_to_local_attributes.len(), 1);
    assert_eq!(response.write_to_local_attributes[0].key, "shippedQuantity");
    assert_eq!(response.write_to_local_attributes[0].value, encode(&42));

    assert_eq!(response.publish_to_local_queue.len(), 1);
    assert_eq!(response.publish_to_local_queue[0].queue_name, "audit");
    assert_eq!(response.publish_to_local_queue[0].payload, Some(encode("shipped 42")));
}

/// Loaded attribute values drive the state's branch.
#[test]
fn test_loaded_global_attribute_is_visible() {
    let worker = create_worker();
    let mut request = create_execute_request("OrderProcess", "ShipOrder", Some(encode(&1)));
    request.loaded_global_attributes = Some(create_orders_row("cancelled"));

    let response = worker.handle_execute(request).unwrap();
    assert_eq!(
        response.state_decision.thread_close_decision.unwrap().close_type,
        ThreadCloseType::ForceFailProcess
    );
    assert!(response.write_to_global_attributes.is_empty());
    assert!(response.publish_to_local_queue.is_empty());
}

// =============================================================================
// Failure recovery
// =============================================================================

/// A failing wait_until surfaces as a worker execution error; the recovery
/// state then observes which phase failed.
#[test]
fn test_recovery_state_observes_failed_phase() {
    let worker = create_worker();

    let config = worker
        .registry()
        .process("RecoveryProcess")
        .unwrap()
        .state_config("FlakyWait")
        .unwrap();
    assert_eq!(config.wait_until_api_retry_policy.unwrap().maximum_attempts, Some(1));
    let recovery = config.state_failure_recovery_options.unwrap();
    assert_eq!(recovery.policy, StateFailureRecoveryPolicy::ProceedToConfiguredState);
    assert_eq!(recovery.state_failure_proceed_state_id.as_deref(), Some("Cleanup"));
    assert_eq!(
        recovery.state_failure_proceed_state_config.unwrap().skip_wait_until,
        Some(true)
    );

    let err = worker
        .handle_wait_until(create_wait_until_request("RecoveryProcess", "FlakyWait", None))
        .unwrap_err();
    assert!(err.is_worker_execution_error());
    assert!(err.to_string().contains("upstream unavailable"));

    let mut request = create_execute_request("RecoveryProcess", "Cleanup", None);
    request.context = create_recovery_context(StateApiType::WaitUntilApi);
    let response = worker.handle_execute(request).unwrap();

    assert_eq!(
        response.state_decision.thread_close_decision.unwrap().close_type,
        ThreadCloseType::GracefulCompleteProcess
    );
    assert_eq!(response.publish_to_local_queue[0].queue_name, "recovered");
    assert_eq!(
        response.publish_to_local_queue[0].payload,
        Some(encode(&StateApiType::WaitUntilApi))
    );
}

#[test]
fn test_recovery_state_outside_recovery() {
    let worker = create_worker();
    let response = worker
        .handle_execute(create_execute_request("RecoveryProcess", "Cleanup", None))
        .unwrap();
    assert_eq!(
        response.state_decision.thread_close_decision.unwrap().close_type,
        ThreadCloseType::ForceFailProcess
    );
}

/// The worker error body carries the stack trace captured at the recovery point.
#[test]
fn test_worker_error_response_has_stack_trace() {
    let worker = create_worker();
    let err = worker
        .handle_wait_until(create_wait_until_request("RecoveryProcess", "FlakyWait", None))
        .unwrap_err();
    let body = WorkerErrorResponse::from(&err);
    assert_eq!(body.error_type, "WorkerExecutionError");
    assert!(body.stack_trace.is_some());
}

// =============================================================================
// Commands
// =============================================================================

/// All-of requests keep the requested order per command kind.
#[test]
fn test_all_of_command_request_order() {
    let worker = create_worker();
    let response = worker
        .handle_wait_until(create_wait_until_request("BatchProcess", "AwaitBoth", None))
        .unwrap();

    let request = response.command_request;
    assert_eq!(request.waiting_type, CommandWaitingType::AllOfCompletion);
    assert_eq!(request.timer_commands.len(), 1);
    assert_eq!(request.timer_commands[0].delay_in_seconds, 5);
    assert_eq!(request.local_queue_commands.len(), 1);
    assert_eq!(request.local_queue_commands[0].queue_name, "q");
    assert_eq!(request.local_queue_commands[0].count, Some(2));
    assert!(response.publish_to_local_queue.is_empty());
}

/// The "both completed" branch runs once both statuses are completed.
#[test]
fn test_all_of_both_completed_branch() {
    let worker = create_worker();
    let mut request = create_execute_request("BatchProcess", "AwaitBoth", None);
    request.command_results = Some(create_batch_results(
        CommandStatus::CompletedCommand,
        CommandStatus::CompletedCommand,
        &[3, 4],
    ));

    let response = worker.handle_execute(request).unwrap();
    assert_eq!(
        response.state_decision.thread_close_decision.unwrap().close_type,
        ThreadCloseType::GracefulCompleteProcess
    );
    assert_eq!(response.publish_to_local_queue[0].queue_name, "both");
    assert_eq!(response.publish_to_local_queue[0].payload, Some(encode(&7)));
}

/// Missing command results surface as a worker execution error.
#[test]
fn test_missing_command_results() {
    let worker = create_worker();
    let err = worker
        .handle_execute(create_execute_request("BatchProcess", "AwaitBoth", None))
        .unwrap_err();
    assert!(matches!(err, ProcessError::WorkerExecution { ref message, .. } if message.contains("out of range")));
}

// =============================================================================
// Panics
// =============================================================================

#[test]
fn test_panic_is_captured_as_worker_execution_error() {
    let worker = create_worker();
    let err = worker
        .handle_execute(create_execute_request("FanoutProcess", "Fanout", None))
        .unwrap_err();
    match err {
        ProcessError::WorkerExecution { message, stack_trace } => {
            assert_eq!(message, "panic: fanout execute is not reachable in tests");
            assert!(stack_trace.contains("reject_fanout_execute"), "{stack_trace}");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

/// Accessing an undeclared attribute panics inside user code and is reported
/// like any other failure.
#[test]
fn test_undeclared_attribute_access_is_captured() {
    use durable_process_sdk::{
        AsyncState, CommandResults, Communication, Context, Object, Persistence, Process, ProcessResult,
        Registry, StateDecision, StateSchema, WorkerService,
    };
    use std::sync::Arc;

    struct Peek;
    impl AsyncState for Peek {
        fn execute(
            &self,
            _ctx: &Context,
            _input: Object,
            _command_results: &CommandResults,
            persistence: &mut Persistence,
            _communication: &mut Communication,
        ) -> ProcessResult<StateDecision> {
            let _: Option<String> = persistence.get_local_attribute("missing")?;
            Ok(StateDecision::dead_end())
        }
    }
    struct PeekProcess;
    impl Process for PeekProcess {
        fn state_schema(&self) -> StateSchema {
            StateSchema::new(Peek)
        }
    }

    let mut registry = Registry::new();
    registry.add_process(PeekProcess).unwrap();
    let worker = WorkerService::new(Arc::new(registry));

    let err = worker
        .handle_execute(create_execute_request("PeekProcess", "Peek", None))
        .unwrap_err();
    assert!(err.is_worker_execution_error());
    assert!(err.to_string().contains("'missing' is not declared"));
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Queue publishes are returned in call order.
    #[test]
    fn prop_publishes_keep_call_order(queues in prop::collection::vec(queue_name_strategy(), 0..8)) {
        let worker = create_worker();
        let response = worker
            .handle_wait_until(create_wait_until_request("FanoutProcess", "Fanout", Some(encode(&queues))))
            .unwrap();

        prop_assert_eq!(response.command_request.waiting_type, CommandWaitingType::EmptyCommand);
        prop_assert_eq!(response.publish_to_local_queue.len(), queues.len());
        for (i, (message, queue)) in response.publish_to_local_queue.iter().zip(&queues).enumerate() {
            prop_assert_eq!(&message.queue_name, queue);
            prop_assert_eq!(message.payload.clone(), Some(encode(&i)));
        }
    }

    /// Only the fully completed combination takes the "both completed" branch.
    #[test]
    fn prop_all_of_branch_requires_both_completed(
        timer in command_status_strategy(),
        queue in command_status_strategy(),
    ) {
        let worker = create_worker();
        let mut request = create_execute_request("BatchProcess", "AwaitBoth", None);
        request.command_results = Some(create_batch_results(timer, queue, &[1]));

        let response = worker.handle_execute(request).unwrap();
        let close_type = response.state_decision.thread_close_decision.unwrap().close_type;
        let both = timer == CommandStatus::CompletedCommand && queue == CommandStatus::CompletedCommand;
        if both {
            prop_assert_eq!(close_type, ThreadCloseType::GracefulCompleteProcess);
        } else {
            prop_assert_eq!(close_type, ThreadCloseType::DeadEnd);
            prop_assert!(response.publish_to_local_queue.is_empty());
        }
    }
}
