//! Error types for the durable process SDK.
//!
//! Errors fall into four families:
//!
//! - **Definition errors** ([`ProcessError::ProcessDefinition`]): a process,
//!   state, or persistence schema is misused. These are detected while
//!   registering processes or while building wire configuration, and are meant
//!   to fail worker startup.
//! - **Argument errors** ([`ProcessError::InvalidArgument`]): a caller passed an
//!   unregistered process or left out a required start option.
//! - **API errors** ([`ProcessError::Api`]): the remote server answered with a
//!   non-success status. Use the `is_*` predicates to branch on the sub-case.
//! - **Worker execution errors** ([`ProcessError::WorkerExecution`]): user phase
//!   code returned an error or panicked. The worker dispatcher produces these
//!   at a single recovery point and returns them as a structured error body.
//!
//! The client never retries transport calls on its own; every API error is
//! handed back to the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::ApiErrorResponse;
use crate::serdes::SerDesError;

/// Result alias used throughout the SDK and by user phase functions.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// The main error type for the durable process SDK.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A process, state, or schema definition is invalid.
    #[error("ProcessDefinitionError: {message}")]
    ProcessDefinition {
        /// What is wrong with the definition
        message: String,
    },

    /// A caller supplied an invalid argument.
    #[error("InvalidArgumentError: {message}")]
    InvalidArgument {
        /// What is wrong with the argument
        message: String,
    },

    /// The remote server returned a non-success status.
    #[error("ApiError (status {status_code}): {message}")]
    Api {
        /// HTTP status code returned by the server
        status_code: u16,
        /// Raw error message or response body
        message: String,
        /// Structured error body, when the server sent one
        response: Option<ApiErrorResponse>,
    },

    /// User phase code failed; produced by the worker dispatcher.
    #[error("WorkerExecutionError: {message}")]
    WorkerExecution {
        /// Message of the original error or panic payload
        message: String,
        /// Stack trace captured at the recovery point
        stack_trace: String,
    },

    /// A command result was accessed in a way that cannot succeed.
    #[error("CommandResultError: {message}")]
    CommandResult {
        /// What went wrong
        message: String,
    },

    /// Encoding or decoding a payload failed.
    #[error("SerDesError: {message}")]
    SerDes {
        /// Error message describing the serialization failure
        message: String,
    },

    /// The HTTP request could not be sent or its response could not be read.
    #[error("TransportError: {message}")]
    Transport {
        /// Error message from the HTTP layer
        message: String,
    },

    /// An error raised by user code that is not one of the SDK errors.
    #[error("{error_type}: {message}")]
    UserCode {
        /// Error message from the user code
        message: String,
        /// The type of error
        error_type: String,
    },
}

impl ProcessError {
    /// Creates a new ProcessDefinition error.
    pub fn process_definition(message: impl Into<String>) -> Self {
        Self::ProcessDefinition {
            message: message.into(),
        }
    }

    /// Creates a new InvalidArgument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a new CommandResult error.
    pub fn command_result(message: impl Into<String>) -> Self {
        Self::CommandResult {
            message: message.into(),
        }
    }

    /// Creates a new SerDes error.
    pub fn serdes(message: impl Into<String>) -> Self {
        Self::SerDes {
            message: message.into(),
        }
    }

    /// Creates a new user code error with the generic `UserCodeError` type.
    pub fn user_code(message: impl Into<String>) -> Self {
        Self::UserCode {
            message: message.into(),
            error_type: "UserCodeError".to_string(),
        }
    }

    /// Creates a new WorkerExecution error.
    pub fn worker_execution(message: impl Into<String>, stack_trace: impl Into<String>) -> Self {
        Self::WorkerExecution {
            message: message.into(),
            stack_trace: stack_trace.into(),
        }
    }

    /// Creates an API error from a status code and response body.
    ///
    /// The body is parsed as an [`ApiErrorResponse`] when possible; otherwise
    /// it is kept verbatim as the message.
    pub fn api(status_code: u16, body: &[u8]) -> Self {
        let response = serde_json::from_slice::<ApiErrorResponse>(body).ok();
        let message = match &response {
            Some(resp) => resp.detail.clone().unwrap_or_default(),
            None => String::from_utf8_lossy(body).into_owned(),
        };
        Self::Api {
            status_code,
            message,
            response,
        }
    }

    /// Returns the HTTP status code if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    fn has_api_response(&self) -> bool {
        matches!(self, Self::Api { response: Some(_), .. })
    }

    /// Returns true for a 4xx API error.
    pub fn is_client_error(&self) -> bool {
        matches!(self.status_code(), Some(code) if (400..500).contains(&code))
    }

    /// Returns true if the server reports the process execution already started (409).
    pub fn is_process_already_started(&self) -> bool {
        self.has_api_response() && self.status_code() == Some(409)
    }

    /// Returns true if the server reports the process execution does not exist (404).
    pub fn is_process_not_exists(&self) -> bool {
        self.has_api_response() && self.status_code() == Some(404)
    }

    /// Returns true if the server could not acquire attribute locks (423).
    pub fn is_locking_failure(&self) -> bool {
        self.has_api_response() && self.status_code() == Some(423)
    }

    /// Returns true if waiting on the server exceeded its timeout (408).
    pub fn is_waiting_exceeding_timeout(&self) -> bool {
        self.has_api_response() && self.status_code() == Some(408)
    }

    /// Returns true if a worker RPC failed on the server side (424).
    pub fn is_rpc_execution_error(&self) -> bool {
        self.has_api_response() && self.status_code() == Some(424)
    }

    /// Returns true if this is a definition error.
    pub fn is_process_definition_error(&self) -> bool {
        matches!(self, Self::ProcessDefinition { .. })
    }

    /// Returns true if this is an invalid argument error.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Returns true if this error came out of the worker recovery point.
    pub fn is_worker_execution_error(&self) -> bool {
        matches!(self, Self::WorkerExecution { .. })
    }

    /// Short name of the error kind, used as `errorType` on the wire.
    pub fn error_type(&self) -> &str {
        match self {
            Self::ProcessDefinition { .. } => "ProcessDefinitionError",
            Self::InvalidArgument { .. } => "InvalidArgumentError",
            Self::Api { .. } => "ApiError",
            Self::WorkerExecution { .. } => "WorkerExecutionError",
            Self::CommandResult { .. } => "CommandResultError",
            Self::SerDes { .. } => "SerDesError",
            Self::Transport { .. } => "TransportError",
            Self::UserCode { error_type, .. } => error_type,
        }
    }
}

/// Error body returned by the worker endpoints when a phase fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerErrorResponse {
    /// Human readable error detail
    #[serde(rename = "detail")]
    pub detail: String,
    /// The error type/name
    #[serde(rename = "errorType")]
    pub error_type: String,
    /// Optional stack trace
    #[serde(rename = "stackTrace", skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl WorkerErrorResponse {
    /// Creates a new WorkerErrorResponse.
    pub fn new(error_type: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            error_type: error_type.into(),
            stack_trace: None,
        }
    }
}

impl From<&ProcessError> for WorkerErrorResponse {
    fn from(error: &ProcessError) -> Self {
        match error {
            ProcessError::WorkerExecution {
                message,
                stack_trace,
            } => Self {
                detail: message.clone(),
                error_type: error.error_type().to_string(),
                stack_trace: Some(stack_trace.clone()),
            },
            other => Self::new(other.error_type(), other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ProcessError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerDes {
            message: error.to_string(),
        }
    }
}

impl From<SerDesError> for ProcessError {
    fn from(error: SerDesError) -> Self {
        Self::SerDes {
            message: error.to_string(),
        }
    }
}

impl From<reqwest::Error> for ProcessError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport {
            message: error.to_string(),
        }
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ProcessError {
    fn from(error: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::user_code(error.to_string())
    }
}
