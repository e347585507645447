//! Registry of process definitions.
//!
//! Processes are registered once at startup through `&mut Registry` and the
//! registry is then shared read-only (`Arc<Registry>`) by the worker and the
//! client. Registration checks the whole definition up front so that
//! misconfigurations fail startup instead of individual state invocations.
//!
//! # Example
//!
//! ```
//! use durable_process_sdk::{
//!     AsyncState, CommandResults, Communication, Context, Object, Persistence, Process,
//!     ProcessResult, Registry, StateDecision, StateSchema,
//! };
//!
//! struct Done;
//!
//! impl AsyncState for Done {
//!     fn execute(
//!         &self,
//!         _ctx: &Context,
//!         _input: Object,
//!         _command_results: &CommandResults,
//!         _persistence: &mut Persistence,
//!         _communication: &mut Communication,
//!     ) -> ProcessResult<StateDecision> {
//!         Ok(StateDecision::graceful_complete_process())
//!     }
//! }
//!
//! struct Hello;
//!
//! impl Process for Hello {
//!     fn state_schema(&self) -> StateSchema {
//!         StateSchema::new(Done)
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry.add_process(Hello).unwrap();
//! assert_eq!(registry.process_types(), vec!["Hello"]);
//! assert!(registry.add_process(Hello).is_err());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AsyncStateOptions, ProcessOptions};
use crate::error::{ProcessError, ProcessResult};
use crate::persistence::{PersistenceSchema, SchemaIndex};
use crate::state::{Process, SharedAsyncState};

/// A state as registered: the definition plus the options it declared at
/// registration time.
#[derive(Clone)]
pub struct RegisteredState {
    state_id: String,
    state: SharedAsyncState,
    options: AsyncStateOptions,
}

impl RegisteredState {
    pub fn state_id(&self) -> &str {
        &self.state_id
    }

    pub fn state(&self) -> &SharedAsyncState {
        &self.state
    }

    pub fn options(&self) -> &AsyncStateOptions {
        &self.options
    }
}

impl std::fmt::Debug for RegisteredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredState")
            .field("state_id", &self.state_id)
            .field("options", &self.options)
            .finish()
    }
}

/// A validated process definition.
#[derive(Debug)]
pub struct RegisteredProcess {
    process_type: String,
    options: ProcessOptions,
    starting_state_id: Option<String>,
    states: HashMap<String, RegisteredState>,
    persistence_schema: PersistenceSchema,
    schema_index: Arc<SchemaIndex>,
}

impl RegisteredProcess {
    fn build(process: &dyn Process) -> ProcessResult<Self> {
        let process_type = process.process_type();
        if process_type.is_empty() {
            return Err(ProcessError::process_definition("process type is empty"));
        }

        let state_schema = process.state_schema();
        let mut states = HashMap::with_capacity(state_schema.states().len());
        for state in state_schema.states() {
            let state_id = state.state_id();
            if state_id.is_empty() {
                return Err(ProcessError::process_definition(format!(
                    "process '{}' has a state with an empty state id",
                    process_type
                )));
            }
            if states.contains_key(&state_id) {
                return Err(ProcessError::process_definition(format!(
                    "process '{}' cannot have duplicate state id '{}'",
                    process_type, state_id
                )));
            }
            states.insert(
                state_id.clone(),
                RegisteredState {
                    state_id,
                    state: state.clone(),
                    options: state.options(),
                },
            );
        }

        let persistence_schema = process.persistence_schema();
        let schema_index = persistence_schema.validate()?;

        let registered = Self {
            options: process.options(),
            starting_state_id: state_schema.starting_state().map(|s| s.state_id()),
            process_type,
            states,
            persistence_schema,
            schema_index: Arc::new(schema_index),
        };
        registered.validate_state_options()?;
        Ok(registered)
    }

    fn validate_state_options(&self) -> ProcessResult<()> {
        for state in self.states.values() {
            self.persistence_schema
                .resolve_policy(state.options.persistence_policy_name.as_deref())?;

            if let Some(recovery) = &state.options.failure_recovery {
                let target = self.states.get(&recovery.state_id).ok_or_else(|| {
                    ProcessError::process_definition(format!(
                        "failure recovery state '{}' of state '{}' is not registered in process '{}'",
                        recovery.state_id, state.state_id, self.process_type
                    ))
                })?;
                if target.options.failure_recovery.is_some() {
                    return Err(ProcessError::process_definition(format!(
                        "failure recovery state '{}' cannot have a failure recovery of its own",
                        target.state_id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn process_type(&self) -> &str {
        &self.process_type
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    /// The state new executions start in, `None` for processes that start idle.
    pub fn starting_state(&self) -> Option<&RegisteredState> {
        self.starting_state_id
            .as_ref()
            .and_then(|id| self.states.get(id))
    }

    /// Resolves a state by id.
    pub fn state(&self, state_id: &str) -> ProcessResult<&RegisteredState> {
        self.states.get(state_id).ok_or_else(|| {
            ProcessError::process_definition(format!(
                "state '{}' is not registered in process '{}'",
                state_id, self.process_type
            ))
        })
    }

    pub fn persistence_schema(&self) -> &PersistenceSchema {
        &self.persistence_schema
    }

    pub fn schema_index(&self) -> &Arc<SchemaIndex> {
        &self.schema_index
    }
}

/// Registered process definitions keyed by process type.
#[derive(Debug, Default)]
pub struct Registry {
    processes: HashMap<String, RegisteredProcess>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a process.
    ///
    /// Fails with [`ProcessError::ProcessDefinition`] when:
    /// - the process type is already registered;
    /// - two states share a state id;
    /// - the persistence schema is invalid;
    /// - a state names an unknown persistence policy;
    /// - a failure recovery state is not registered in the same process, or
    ///   declares a failure recovery itself.
    pub fn add_process(&mut self, process: impl Process + 'static) -> ProcessResult<()> {
        self.add_shared_process(&process)
    }

    /// Registers a process given as a trait object.
    pub fn add_shared_process(&mut self, process: &dyn Process) -> ProcessResult<()> {
        let registered = RegisteredProcess::build(process)?;
        if self.processes.contains_key(registered.process_type()) {
            return Err(ProcessError::process_definition(format!(
                "process type conflict: '{}' is already registered",
                registered.process_type()
            )));
        }
        tracing::debug!(
            process_type = %registered.process_type(),
            states = registered.states.len(),
            "Registered process"
        );
        self.processes
            .insert(registered.process_type().to_string(), registered);
        Ok(())
    }

    /// Registered process types in alphabetical order.
    pub fn process_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.processes.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Looks up a process, `None` if it is not registered.
    pub fn get(&self, process_type: &str) -> Option<&RegisteredProcess> {
        self.processes.get(process_type)
    }

    /// Looks up a process, failing with a definition error if it is not registered.
    pub fn process(&self, process_type: &str) -> ProcessResult<&RegisteredProcess> {
        self.get(process_type).ok_or_else(|| {
            ProcessError::process_definition(format!("process type '{}' is not registered", process_type))
        })
    }

    /// Resolves a state of a registered process.
    pub fn state(&self, process_type: &str, state_id: &str) -> ProcessResult<(&RegisteredProcess, &RegisteredState)> {
        let process = self.process(process_type)?;
        let state = process.state(state_id)?;
        Ok((process, state))
    }
}
