//! # Durable Process SDK
//!
//! Client and worker SDK for a durable process orchestration server.
//!
//! ## Overview
//!
//! A process is a state machine whose progress is owned by the server. The
//! application defines processes as types implementing [`Process`], whose
//! states implement [`AsyncState`]. The server persists every transition and
//! calls back into the worker for each phase of each state:
//!
//! - **`wait_until`** declares what the state waits on: timers and local
//!   queue messages combined with *any of* or *all of* semantics.
//! - **`execute`** runs once the wait is satisfied, reads and writes
//!   attributes, publishes messages, and returns a [`StateDecision`]: move
//!   to one or more next states, or close the thread.
//!
//! Phase functions are plain synchronous functions. They never block on the
//! server; the worker answers each callback with the phase's result and the
//! server drives everything else, including retries and failure recovery.
//!
//! ### Key Features
//!
//! - **Registry**: processes are validated once at registration, then shared
//!   read-only between the worker and the client.
//! - **Attributes**: global attributes live in database tables, local
//!   attributes are scoped to one process execution. Both are loaded by the
//!   server according to a persistence policy and written back as deltas.
//! - **Local queues**: messages published by the client or by a state are
//!   consumed by local queue commands, with optional deduplication.
//! - **Failure recovery**: a state can name a recovery state that runs once
//!   its retries are exhausted.
//! - **Pluggable encoding**: payloads go through an [`ObjectEncoder`],
//!   attribute values through a [`DbConverter`].
//!
//! ## Getting Started
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use durable_process_sdk::{
//!     AsyncState, Command, CommandRequest, CommandResults, Communication, Context, Object,
//!     Persistence, Process, ProcessResult, Registry, StateDecision, StateSchema, WorkerService,
//! };
//!
//! struct Remind;
//!
//! impl AsyncState for Remind {
//!     fn wait_until(
//!         &self,
//!         _ctx: &Context,
//!         _input: Object,
//!         _communication: &mut Communication,
//!     ) -> ProcessResult<CommandRequest> {
//!         CommandRequest::any_of(vec![
//!             Command::timer(Duration::from_secs(3600)),
//!             Command::local_queue("done", 1),
//!         ])
//!     }
//!
//!     fn execute(
//!         &self,
//!         _ctx: &Context,
//!         _input: Object,
//!         command_results: &CommandResults,
//!         _persistence: &mut Persistence,
//!         _communication: &mut Communication,
//!     ) -> ProcessResult<StateDecision> {
//!         if command_results.first_local_queue_command()?.messages().is_empty() {
//!             return Ok(StateDecision::single_next_state(&Remind, &())?);
//!         }
//!         Ok(StateDecision::graceful_complete_process())
//!     }
//! }
//!
//! struct Reminder;
//!
//! impl Process for Reminder {
//!     fn state_schema(&self) -> StateSchema {
//!         StateSchema::new(Remind)
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry.add_process(Reminder).unwrap();
//! let worker = WorkerService::new(Arc::new(registry));
//! assert_eq!(worker.registry().process_types(), vec!["Reminder"]);
//! ```
//!
//! The worker is then served over HTTP with [`server::router`] and processes
//! are started with a [`Client`] sharing the same registry.
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`ProcessResult`]. [`ProcessError`]
//! separates definition mistakes, invalid arguments, server errors, and
//! failures of user code; see its predicates such as
//! [`ProcessError::is_process_already_started`].
//!
//! ## Logging
//!
//! The SDK logs through `tracing`. Each worker callback runs in an
//! `async_state` span carrying the API, process type, state id, process id,
//! and attempt. Install any subscriber to collect them.
//!
//! ## Module Organization
//!
//! - [`api`]: Wire types of the server protocol
//! - [`client`]: Process service client and registry aware [`Client`]
//! - [`command`]: Commands a state waits on
//! - [`command_results`]: Results of the commands, seen by `execute`
//! - [`communication`]: Publishing to local queues from a state
//! - [`config`]: Options of states, processes, starts and publishes
//! - [`context`]: Per-invocation execution context
//! - [`decision`]: State decisions
//! - [`error`]: Error types and error handling
//! - [`object`]: Lazily decoded payloads
//! - [`persistence`]: Persistence schema and attribute access
//! - [`registry`]: Process registration and validation
//! - [`serdes`]: Object encoders and DB converters
//! - [`server`]: axum router for the worker endpoints (feature `server`)
//! - [`state`]: Process and state traits
//! - [`worker`]: Worker callback dispatcher

pub mod api;
pub mod client;
pub mod command;
pub mod command_results;
pub mod communication;
pub mod config;
pub mod context;
pub mod decision;
pub mod error;
mod marshal;
pub mod object;
pub mod persistence;
pub mod registry;
pub mod serdes;
#[cfg(feature = "server")]
pub mod server;
pub mod state;
pub mod worker;

// Re-export main types at crate root
pub use api::{
    CommandStatus, CommandWaitingType, DatabaseLockingType, ErrorSubStatus, ProcessExecutionStopType,
    ProcessIdReusePolicy, ProcessStatus, StateApiType, ThreadCloseType, WriteConflictMode,
};
pub use client::{
    Client, ClientOptions, ProcessServiceClient, RestProcessServiceClient, SharedProcessServiceClient,
};
pub use command::{Command, CommandRequest};
pub use command_results::{CommandResults, LocalQueueCommandResult, TimerResult};
pub use communication::Communication;
pub use config::*;
pub use context::Context;
pub use decision::{StateDecision, StateMovement};
pub use error::{ProcessError, ProcessResult, WorkerErrorResponse};
pub use object::Object;
pub use persistence::{Persistence, PersistenceSchema};
pub use registry::{RegisteredProcess, RegisteredState, Registry};
pub use serdes::{DbConverter, DbHint, ObjectEncoder, SharedDbConverter, SharedObjectEncoder};
pub use state::{AsyncState, Process, SharedAsyncState, StateSchema};
pub use worker::{create_state_span, WorkerOptions, WorkerService};
