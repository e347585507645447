//! Invocation context handed to state phases.

use chrono::{DateTime, Utc};

use crate::api::{self, StateApiType};

/// Read-only view of the context the server sent with a callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    inner: api::Context,
}

impl Context {
    pub fn new(inner: api::Context) -> Self {
        Self { inner }
    }

    pub fn process_id(&self) -> &str {
        &self.inner.process_id
    }

    pub fn process_execution_id(&self) -> &str {
        &self.inner.process_execution_id
    }

    pub fn state_execution_id(&self) -> Option<&str> {
        self.inner.state_execution_id.as_deref()
    }

    /// Attempt number of the current phase, starting at 1.
    ///
    /// Returns 1 when the server did not send an attempt number.
    pub fn attempt(&self) -> i32 {
        self.inner.attempt.unwrap_or(1)
    }

    pub fn process_started_at(&self) -> Option<DateTime<Utc>> {
        self.inner
            .process_started_timestamp
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    pub fn first_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.inner
            .first_attempt_timestamp
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Execution id of the failed state this recovery state runs for.
    pub fn recover_from_state_execution_id(&self) -> Option<&str> {
        self.inner.recover_from_state_execution_id.as_deref()
    }

    /// Phase of the failed state this recovery state runs for.
    pub fn recover_from_state_api(&self) -> Option<StateApiType> {
        self.inner.recover_from_api
    }

    /// Returns true if this invocation is a failure recovery.
    pub fn is_recovering(&self) -> bool {
        self.inner.recover_from_api.is_some()
    }

    pub fn as_api(&self) -> &api::Context {
        &self.inner
    }
}

impl From<api::Context> for Context {
    fn from(inner: api::Context) -> Self {
        Self::new(inner)
    }
}
