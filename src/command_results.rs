//! Results of the commands a state waited on.
//!
//! Results are positional: the n-th timer result belongs to the n-th timer
//! command of the request, and likewise for local queue commands. Accessors
//! return [`ProcessError::CommandResult`] instead of panicking when an index
//! is out of range.

use serde::de::DeserializeOwned;

use crate::api::{self, CommandStatus};
use crate::error::{ProcessError, ProcessResult};
use crate::object::Object;
use crate::serdes::SharedObjectEncoder;

/// Result of one timer command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerResult {
    pub status: CommandStatus,
}

/// Result of one local queue command.
#[derive(Debug, Clone)]
pub struct LocalQueueCommandResult {
    queue_name: String,
    status: CommandStatus,
    messages: Vec<Object>,
}

impl LocalQueueCommandResult {
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn status(&self) -> CommandStatus {
        self.status
    }

    /// Messages consumed by the command, in delivery order.
    pub fn messages(&self) -> &[Object] {
        &self.messages
    }

    /// Decodes the first consumed message.
    pub fn first_message<T: DeserializeOwned>(&self) -> ProcessResult<Option<T>> {
        match self.messages.first() {
            Some(message) => message.get(),
            None => Err(ProcessError::command_result(format!(
                "local queue '{}' result has no messages",
                self.queue_name
            ))),
        }
    }
}

/// All command results handed to `execute`.
#[derive(Debug, Clone, Default)]
pub struct CommandResults {
    timer_results: Vec<TimerResult>,
    local_queue_results: Vec<LocalQueueCommandResult>,
}

impl CommandResults {
    /// Builds the results from the wire form. `None` yields empty results.
    pub fn from_api(results: Option<api::CommandResults>, encoder: &SharedObjectEncoder) -> Self {
        let Some(results) = results else {
            return Self::default();
        };
        let timer_results = results
            .timer_results
            .into_iter()
            .map(|t| TimerResult { status: t.status })
            .collect();
        let local_queue_results = results
            .local_queue_results
            .into_iter()
            .map(|q| LocalQueueCommandResult {
                queue_name: q.queue_name,
                status: q.status,
                messages: q
                    .messages
                    .into_iter()
                    .map(|m| Object::from_optional(m.payload, encoder.clone()))
                    .collect(),
            })
            .collect();
        Self {
            timer_results,
            local_queue_results,
        }
    }

    pub fn timer_results(&self) -> &[TimerResult] {
        &self.timer_results
    }

    pub fn local_queue_results(&self) -> &[LocalQueueCommandResult] {
        &self.local_queue_results
    }

    /// Status of the timer command at `index`.
    pub fn timer_status(&self, index: usize) -> ProcessResult<CommandStatus> {
        self.timer_results
            .get(index)
            .map(|t| t.status)
            .ok_or_else(|| out_of_range("timer", index, self.timer_results.len()))
    }

    pub fn first_timer_status(&self) -> ProcessResult<CommandStatus> {
        self.timer_status(0)
    }

    /// Result of the local queue command at `index`.
    pub fn local_queue_command(&self, index: usize) -> ProcessResult<&LocalQueueCommandResult> {
        self.local_queue_results
            .get(index)
            .ok_or_else(|| out_of_range("local queue", index, self.local_queue_results.len()))
    }

    pub fn first_local_queue_command(&self) -> ProcessResult<&LocalQueueCommandResult> {
        self.local_queue_command(0)
    }
}

fn out_of_range(kind: &str, index: usize, len: usize) -> ProcessError {
    ProcessError::command_result(format!(
        "{} result index {} out of range, {} results available",
        kind, index, len
    ))
}
