//! Process and async state definitions.
//!
//! A process is a type implementing [`Process`]; its states implement
//! [`AsyncState`]. Both carry their options through trait methods with
//! default implementations, so a minimal state only implements `execute`.
//!
//! # Example
//!
//! ```
//! use durable_process_sdk::{
//!     AsyncState, AsyncStateOptions, CommandResults, Communication, Context, Object,
//!     Persistence, Process, ProcessResult, StateDecision, StateSchema,
//! };
//!
//! struct ChargeState;
//!
//! impl AsyncState for ChargeState {
//!     fn options(&self) -> AsyncStateOptions {
//!         AsyncStateOptions::new().with_skip_wait_until()
//!     }
//!
//!     fn execute(
//!         &self,
//!         _ctx: &Context,
//!         input: Object,
//!         _command_results: &CommandResults,
//!         _persistence: &mut Persistence,
//!         _communication: &mut Communication,
//!     ) -> ProcessResult<StateDecision> {
//!         let amount: u64 = input.get()?.unwrap_or_default();
//!         if amount == 0 {
//!             return Ok(StateDecision::force_fail_process());
//!         }
//!         Ok(StateDecision::graceful_complete_process())
//!     }
//! }
//!
//! struct PaymentProcess;
//!
//! impl Process for PaymentProcess {
//!     fn state_schema(&self) -> StateSchema {
//!         StateSchema::new(ChargeState)
//!     }
//! }
//!
//! assert_eq!(PaymentProcess.process_type(), "PaymentProcess");
//! assert_eq!(ChargeState.state_id(), "ChargeState");
//! ```

use std::sync::Arc;

use crate::command::CommandRequest;
use crate::command_results::CommandResults;
use crate::communication::Communication;
use crate::config::{AsyncStateOptions, ProcessOptions};
use crate::context::Context;
use crate::decision::StateDecision;
use crate::error::ProcessResult;
use crate::object::Object;
use crate::persistence::{Persistence, PersistenceSchema};

/// One step of a process.
///
/// States are shared across concurrent invocations and must not keep
/// per-invocation data in their fields; everything an invocation needs
/// arrives through the phase arguments.
pub trait AsyncState: Send + Sync {
    /// Unique id of the state within its process.
    ///
    /// Defaults to the simple name of the implementing type.
    fn state_id(&self) -> String {
        simple_type_name(std::any::type_name::<Self>())
    }

    fn options(&self) -> AsyncStateOptions {
        AsyncStateOptions::default()
    }

    /// Declares what to wait on before `execute` runs.
    ///
    /// Not called when [`AsyncStateOptions::skip_wait_until`] is set.
    fn wait_until(
        &self,
        _ctx: &Context,
        _input: Object,
        _communication: &mut Communication,
    ) -> ProcessResult<CommandRequest> {
        Ok(CommandRequest::empty())
    }

    /// Runs once the command request is satisfied and decides what comes next.
    fn execute(
        &self,
        ctx: &Context,
        input: Object,
        command_results: &CommandResults,
        persistence: &mut Persistence,
        communication: &mut Communication,
    ) -> ProcessResult<StateDecision>;
}

/// A process definition.
pub trait Process: Send + Sync {
    fn options(&self) -> ProcessOptions {
        ProcessOptions::default()
    }

    /// The states of the process.
    fn state_schema(&self) -> StateSchema;

    fn persistence_schema(&self) -> PersistenceSchema {
        PersistenceSchema::empty()
    }

    /// Process type used to register and start the process.
    ///
    /// [`ProcessOptions::process_type`] when set, the simple name of the
    /// implementing type otherwise.
    fn process_type(&self) -> String {
        self.options()
            .process_type
            .unwrap_or_else(|| simple_type_name(std::any::type_name::<Self>()))
    }
}

/// Shared handle to a state definition.
pub type SharedAsyncState = Arc<dyn AsyncState>;

/// The states of a process and the state a new execution starts in.
#[derive(Clone, Default)]
pub struct StateSchema {
    starting_state: Option<SharedAsyncState>,
    states: Vec<SharedAsyncState>,
}

impl StateSchema {
    /// A schema whose executions start in `starting_state`.
    pub fn new(starting_state: impl AsyncState + 'static) -> Self {
        let starting_state: SharedAsyncState = Arc::new(starting_state);
        Self {
            starting_state: Some(starting_state.clone()),
            states: vec![starting_state],
        }
    }

    /// A schema without a starting state; executions start idle and are
    /// driven through their local queues.
    pub fn without_starting_state() -> Self {
        Self::default()
    }

    /// Adds a non-starting state.
    pub fn with_state(mut self, state: impl AsyncState + 'static) -> Self {
        self.states.push(Arc::new(state));
        self
    }

    pub fn starting_state(&self) -> Option<&SharedAsyncState> {
        self.starting_state.as_ref()
    }

    /// All states, starting state first.
    pub fn states(&self) -> &[SharedAsyncState] {
        &self.states
    }
}

impl std::fmt::Debug for StateSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSchema")
            .field("starting_state", &self.starting_state.as_ref().map(|s| s.state_id()))
            .field("states", &self.states.iter().map(|s| s.state_id()).collect::<Vec<_>>())
            .finish()
    }
}

/// `a::b::Name<c::D>` → `Name`
pub(crate) fn simple_type_name(type_name: &str) -> String {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .to_string()
}
