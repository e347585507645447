//! Outcome of an `execute` phase.
//!
//! A [`StateDecision`] either moves the process to one or more next states
//! or closes the current execution branch with a [`ThreadCloseType`]. The
//! two forms are exclusive; the worker checks this while marshalling the
//! response and fails with a definition error otherwise.
//!
//! # Example
//!
//! ```
//! use durable_process_sdk::{StateDecision, StateMovement, ThreadCloseType};
//!
//! let next = StateDecision::single_next_state_by_id("ShipState", &42).unwrap();
//! assert_eq!(next.next_states[0].state_id, "ShipState");
//!
//! let fan_out = StateDecision::multi_next_states(["EmailState", "SmsState"]);
//! assert_eq!(fan_out.next_states.len(), 2);
//!
//! let done = StateDecision::graceful_complete_process();
//! assert_eq!(done.thread_close_type, Some(ThreadCloseType::GracefulCompleteProcess));
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::api::ThreadCloseType;
use crate::error::ProcessResult;
use crate::state::AsyncState;

/// A transition to a next state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMovement {
    pub state_id: String,
    /// Input of the next state, `Value::Null` for none
    pub input: Value,
}

impl StateMovement {
    /// Moves to `state_id` with the given input.
    pub fn new<T: Serialize + ?Sized>(state_id: impl Into<String>, input: &T) -> ProcessResult<Self> {
        Ok(Self {
            state_id: state_id.into(),
            input: serde_json::to_value(input)?,
        })
    }

    /// Moves to `state_id` without input.
    pub fn without_input(state_id: impl Into<String>) -> Self {
        Self {
            state_id: state_id.into(),
            input: Value::Null,
        }
    }

    /// Moves to the given state with the given input.
    pub fn to_state<T: Serialize + ?Sized>(state: &dyn AsyncState, input: &T) -> ProcessResult<Self> {
        Self::new(state.state_id(), input)
    }
}

/// The decision returned by `execute`.
///
/// Prefer the constructors; the fields are public so that decisions can be
/// inspected in tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDecision {
    pub next_states: Vec<StateMovement>,
    pub thread_close_type: Option<ThreadCloseType>,
}

impl StateDecision {
    /// Moves to a single next state.
    pub fn single_next_state<T: Serialize + ?Sized>(state: &dyn AsyncState, input: &T) -> ProcessResult<Self> {
        Ok(Self::multi_next_states_with_input(vec![StateMovement::to_state(state, input)?]))
    }

    /// Moves to a single next state, addressed by id.
    pub fn single_next_state_by_id<T: Serialize + ?Sized>(
        state_id: impl Into<String>,
        input: &T,
    ) -> ProcessResult<Self> {
        Ok(Self::multi_next_states_with_input(vec![StateMovement::new(state_id, input)?]))
    }

    /// Moves to several next states, none of which receives input.
    pub fn multi_next_states<I, S>(state_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::multi_next_states_with_input(
            state_ids
                .into_iter()
                .map(StateMovement::without_input)
                .collect(),
        )
    }

    /// Moves to several next states, each with its own input.
    pub fn multi_next_states_with_input(movements: Vec<StateMovement>) -> Self {
        Self {
            next_states: movements,
            thread_close_type: None,
        }
    }

    /// Completes the process once every other branch has ended.
    pub fn graceful_complete_process() -> Self {
        Self::closing(ThreadCloseType::GracefulCompleteProcess)
    }

    /// Completes the process right away.
    pub fn force_complete_process() -> Self {
        Self::closing(ThreadCloseType::ForceCompleteProcess)
    }

    /// Fails the whole process right away.
    pub fn force_fail_process() -> Self {
        Self::closing(ThreadCloseType::ForceFailProcess)
    }

    /// Ends this branch without affecting the process outcome.
    pub fn dead_end() -> Self {
        Self::closing(ThreadCloseType::DeadEnd)
    }

    fn closing(close_type: ThreadCloseType) -> Self {
        Self {
            next_states: Vec::new(),
            thread_close_type: Some(close_type),
        }
    }

    /// Returns true if this decision closes the branch.
    pub fn is_closing(&self) -> bool {
        self.thread_close_type.is_some()
    }
}
