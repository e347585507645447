//! Commands a state waits on before its `execute` phase runs.
//!
//! A [`CommandRequest`] is purely declarative. The server interprets the
//! waiting type and invokes `execute` once the request is satisfied; nothing
//! is polled or awaited on the worker side.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use durable_process_sdk::{Command, CommandRequest};
//!
//! let request = CommandRequest::all_of(vec![
//!     Command::timer(Duration::from_secs(5)),
//!     Command::local_queue("payments", 2),
//! ])
//! .unwrap();
//! assert_eq!(request.commands().len(), 2);
//!
//! assert!(CommandRequest::any_of(vec![]).is_err());
//! ```

use std::time::Duration;

use crate::api::{self, CommandWaitingType};
use crate::error::{ProcessError, ProcessResult};

/// A single wait condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fires after a delay.
    Timer {
        /// Whole seconds to wait
        delay_in_seconds: i64,
    },
    /// Completes once `count` messages arrived on a local queue.
    LocalQueue {
        queue_name: String,
        count: i32,
    },
}

impl Command {
    /// A timer command. Sub-second precision is dropped and delays beyond
    /// `i64::MAX` seconds saturate.
    pub fn timer(delay: Duration) -> Self {
        Self::Timer {
            delay_in_seconds: i64::try_from(delay.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// A local queue command waiting for `count` messages.
    pub fn local_queue(queue_name: impl Into<String>, count: i32) -> Self {
        Self::LocalQueue {
            queue_name: queue_name.into(),
            count,
        }
    }
}

/// The wait condition returned by `wait_until`.
///
/// An [`empty`](Self::empty) request carries no commands; any-of and all-of
/// requests carry at least one. The fields are private so no other shape can
/// be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    commands: Vec<Command>,
    waiting_type: CommandWaitingType,
}

impl CommandRequest {
    /// Proceed to `execute` right away.
    pub fn empty() -> Self {
        Self {
            commands: Vec::new(),
            waiting_type: CommandWaitingType::EmptyCommand,
        }
    }

    /// Proceed once any of the commands completes.
    pub fn any_of(commands: Vec<Command>) -> ProcessResult<Self> {
        Self::with_waiting_type(commands, CommandWaitingType::AnyOfCompletion)
    }

    /// Proceed once all of the commands complete.
    pub fn all_of(commands: Vec<Command>) -> ProcessResult<Self> {
        Self::with_waiting_type(commands, CommandWaitingType::AllOfCompletion)
    }

    fn with_waiting_type(commands: Vec<Command>, waiting_type: CommandWaitingType) -> ProcessResult<Self> {
        if commands.is_empty() {
            return Err(ProcessError::process_definition(format!(
                "{:?} command request requires at least one command, use CommandRequest::empty() to proceed immediately",
                waiting_type
            )));
        }
        Ok(Self {
            commands,
            waiting_type,
        })
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn waiting_type(&self) -> CommandWaitingType {
        self.waiting_type
    }

    /// Converts to the wire form, splitting commands by kind in request order.
    pub fn to_api(&self) -> api::CommandRequest {
        let mut timer_commands = Vec::new();
        let mut local_queue_commands = Vec::new();
        for command in &self.commands {
            match command {
                Command::Timer { delay_in_seconds } => timer_commands.push(api::TimerCommand {
                    delay_in_seconds: *delay_in_seconds,
                }),
                Command::LocalQueue { queue_name, count } => {
                    local_queue_commands.push(api::LocalQueueCommand {
                        queue_name: queue_name.clone(),
                        count: Some(*count),
                    })
                }
            }
        }
        api::CommandRequest {
            waiting_type: self.waiting_type,
            timer_commands,
            local_queue_commands,
        }
    }
}

impl Default for CommandRequest {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn command_strategy() -> impl Strategy<Value = Command> {
        prop_oneof![
            (0u64..86_400).prop_map(|secs| Command::timer(Duration::from_secs(secs))),
            ("[a-z]{1,8}", 1i32..10).prop_map(|(name, count)| Command::local_queue(name, count)),
        ]
    }

    #[test]
    fn test_empty_request() {
        let request = CommandRequest::empty();
        assert!(request.commands().is_empty());
        assert_eq!(request.waiting_type(), CommandWaitingType::EmptyCommand);
        assert_eq!(CommandRequest::default(), request);

        let json = serde_json::to_string(&request.to_api()).unwrap();
        assert_eq!(json, r#"{"waitingType":"EmptyCommand"}"#);
    }

    #[test]
    fn test_any_of_and_all_of_reject_zero_commands() {
        let err = CommandRequest::any_of(vec![]).unwrap_err();
        assert!(err.is_process_definition_error());
        let err = CommandRequest::all_of(vec![]).unwrap_err();
        assert!(err.is_process_definition_error());
    }

    #[test]
    fn test_timer_drops_sub_second_precision() {
        assert_eq!(
            Command::timer(Duration::from_millis(5_900)),
            Command::Timer { delay_in_seconds: 5 }
        );
    }

    #[test]
    fn test_timer_saturates_huge_delays() {
        assert_eq!(Command::timer(Duration::MAX), Command::Timer { delay_in_seconds: i64::MAX });
        assert_eq!(
            Command::timer(Duration::from_secs(i64::MAX as u64)),
            Command::Timer { delay_in_seconds: i64::MAX }
        );
    }

    #[test]
    fn test_to_api_keeps_order_per_kind() {
        let request = CommandRequest::any_of(vec![
            Command::local_queue("b", 1),
            Command::timer(Duration::from_secs(10)),
            Command::local_queue("a", 3),
            Command::timer(Duration::from_secs(20)),
        ])
        .unwrap();
        let wire = request.to_api();
        assert_eq!(wire.waiting_type, CommandWaitingType::AnyOfCompletion);
        assert_eq!(
            wire.timer_commands.iter().map(|t| t.delay_in_seconds).collect::<Vec<_>>(),
            vec![10, 20]
        );
        assert_eq!(
            wire.local_queue_commands
                .iter()
                .map(|q| (q.queue_name.as_str(), q.count))
                .collect::<Vec<_>>(),
            vec![("b", Some(1)), ("a", Some(3))]
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_waiting_type_matches_command_count(
            commands in prop::collection::vec(command_strategy(), 0..6),
            all in any::<bool>(),
        ) {
            let result = if all {
                CommandRequest::all_of(commands.clone())
            } else {
                CommandRequest::any_of(commands.clone())
            };
            match result {
                Ok(request) => {
                    prop_assert!(!commands.is_empty());
                    prop_assert_ne!(request.waiting_type(), CommandWaitingType::EmptyCommand);
                    let wire = request.to_api();
                    prop_assert_eq!(
                        wire.timer_commands.len() + wire.local_queue_commands.len(),
                        commands.len()
                    );
                }
                Err(err) => {
                    prop_assert!(commands.is_empty());
                    prop_assert!(err.is_process_definition_error());
                }
            }
        }
    }
}
