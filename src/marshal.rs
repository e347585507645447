//! Conversion of definitions and decisions into wire form.
//!
//! Everything here runs outside user code and fails with
//! [`ProcessError::ProcessDefinition`] on misuse: a decision that both moves
//! and closes, a movement to an unregistered state, or a recovery chain.

use crate::api::{self, AsyncStateConfig, StateFailureRecoveryOptions, StateFailureRecoveryPolicy};
use crate::decision::StateDecision;
use crate::error::{ProcessError, ProcessResult};
use crate::registry::{RegisteredProcess, RegisteredState};
use crate::serdes::SharedObjectEncoder;

impl RegisteredProcess {
    /// Derives the configuration the server needs to run a state.
    ///
    /// Carries the state's timeouts and retry policies, the skip-wait-until
    /// flag, the attribute load requests of its persistence policy, and the
    /// recovery options with the recovery state's own configuration nested.
    pub fn state_config(&self, state_id: &str) -> ProcessResult<AsyncStateConfig> {
        let state = self.state(state_id)?;
        self.config_of(state, true)
    }

    fn config_of(&self, state: &RegisteredState, allow_recovery: bool) -> ProcessResult<AsyncStateConfig> {
        let options = state.options();
        let schema = self.persistence_schema();
        let policy = schema.resolve_policy(options.persistence_policy_name.as_deref())?;

        let state_failure_recovery_options = match &options.failure_recovery {
            None => None,
            Some(recovery) => {
                if !allow_recovery {
                    return Err(ProcessError::process_definition(format!(
                        "failure recovery state '{}' cannot have a failure recovery of its own",
                        state.state_id()
                    )));
                }
                let target = self.state(&recovery.state_id)?;
                Some(StateFailureRecoveryOptions {
                    policy: StateFailureRecoveryPolicy::ProceedToConfiguredState,
                    state_failure_proceed_state_id: Some(target.state_id().to_string()),
                    state_failure_proceed_state_config: Some(Box::new(self.config_of(target, false)?)),
                })
            }
        };

        Ok(AsyncStateConfig {
            skip_wait_until: options.skip_wait_until.then_some(true),
            wait_until_api_timeout_seconds: options.wait_until_timeout_seconds,
            execute_api_timeout_seconds: options.execute_timeout_seconds,
            wait_until_api_retry_policy: options.wait_until_retry_policy.clone(),
            execute_api_retry_policy: options.execute_retry_policy.clone(),
            state_failure_recovery_options,
            load_global_attributes_request: schema.load_global_attributes_request(self.schema_index(), policy),
            load_local_attributes_request: schema.load_local_attributes_request(policy),
        })
    }
}

/// Converts a decision returned by `execute` into its wire form.
///
/// Each movement's target is resolved in `process` and gets the target's
/// derived configuration attached.
pub(crate) fn to_api_decision(
    process: &RegisteredProcess,
    decision: &StateDecision,
    encoder: &SharedObjectEncoder,
) -> ProcessResult<api::StateDecision> {
    match (decision.thread_close_type, decision.next_states.is_empty()) {
        (Some(_), false) => Err(ProcessError::process_definition(
            "a state decision cannot have both next states and a thread close type",
        )),
        (None, true) => Err(ProcessError::process_definition(
            "a state decision must have next states or a thread close type",
        )),
        (Some(close_type), true) => Ok(api::StateDecision {
            next_states: Vec::new(),
            thread_close_decision: Some(api::ThreadCloseDecision { close_type }),
        }),
        (None, false) => {
            let mut next_states = Vec::with_capacity(decision.next_states.len());
            for movement in &decision.next_states {
                let state_config = process.state_config(&movement.state_id)?;
                let input = encoder.encode_value(&movement.input)?;
                next_states.push(api::StateMovement {
                    state_id: movement.state_id.clone(),
                    state_input: (!input.is_empty()).then_some(input),
                    state_config: Some(state_config),
                });
            }
            Ok(api::StateDecision {
                next_states,
                thread_close_decision: None,
            })
        }
    }
}
