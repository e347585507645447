//! Configuration types for processes, states, and process starts.
//!
//! All options are plain structs with `Default` implementations and
//! builder-style `with_*` methods. Values left unset are not sent to the
//! server, which then applies its own defaults:
//!
//! - phase timeouts default to 10 seconds and are capped at 60 seconds;
//! - phase retry policies default to infinite retries with a 1 second initial
//!   interval, a 120 second maximum interval, and a backoff coefficient of 2;
//! - the process timeout defaults to none;
//! - the id reuse policy defaults to [`ProcessIdReusePolicy::AllowIfNoRunning`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{
    AsyncStateConfig, GlobalAttributeConfig, LocalAttributeConfig, ProcessIdReusePolicy, WriteConflictMode,
};
use crate::error::{ProcessError, ProcessResult};

/// Retry policy of one state phase.
///
/// Policies are declarations only: the server computes the backoff and
/// decides when to give up. All fields are optional on the wire.
///
/// # Example
///
/// ```
/// use durable_process_sdk::RetryPolicy;
///
/// let policy = RetryPolicy::new()
///     .with_initial_interval_seconds(1)
///     .with_backoff_coefficient(2.0)
///     .with_maximum_attempts(5);
/// assert_eq!(policy.maximum_attempts, Some(5));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(rename = "initialIntervalSeconds", skip_serializing_if = "Option::is_none", default)]
    pub initial_interval_seconds: Option<i32>,
    #[serde(rename = "backoffCoefficient", skip_serializing_if = "Option::is_none", default)]
    pub backoff_coefficient: Option<f32>,
    #[serde(rename = "maximumIntervalSeconds", skip_serializing_if = "Option::is_none", default)]
    pub maximum_interval_seconds: Option<i32>,
    #[serde(rename = "maximumAttempts", skip_serializing_if = "Option::is_none", default)]
    pub maximum_attempts: Option<i32>,
    #[serde(rename = "maximumAttemptsDurationSeconds", skip_serializing_if = "Option::is_none", default)]
    pub maximum_attempts_duration_seconds: Option<i32>,
}

impl RetryPolicy {
    /// Creates an empty policy that leaves every field to the server default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy that gives up after `attempts` attempts.
    pub fn with_max_attempts(attempts: i32) -> Self {
        Self::new().with_maximum_attempts(attempts)
    }

    pub fn with_initial_interval_seconds(mut self, seconds: i32) -> Self {
        self.initial_interval_seconds = Some(seconds);
        self
    }

    pub fn with_backoff_coefficient(mut self, coefficient: f32) -> Self {
        self.backoff_coefficient = Some(coefficient);
        self
    }

    pub fn with_maximum_interval_seconds(mut self, seconds: i32) -> Self {
        self.maximum_interval_seconds = Some(seconds);
        self
    }

    pub fn with_maximum_attempts(mut self, attempts: i32) -> Self {
        self.maximum_attempts = Some(attempts);
        self
    }

    pub fn with_maximum_attempts_duration_seconds(mut self, seconds: i32) -> Self {
        self.maximum_attempts_duration_seconds = Some(seconds);
        self
    }
}

/// Redirection to a recovery state once a phase exhausts its retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecovery {
    /// Id of the state whose `execute` runs after the failure
    pub state_id: String,
}

/// Options of an async state.
///
/// # Example
///
/// ```
/// use durable_process_sdk::{AsyncStateOptions, RetryPolicy};
///
/// let options = AsyncStateOptions::new()
///     .with_skip_wait_until()
///     .with_execute_timeout_seconds(30)
///     .with_execute_retry_policy(RetryPolicy::with_max_attempts(3))
///     .with_failure_recovery("RefundState");
/// assert!(options.skip_wait_until);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AsyncStateOptions {
    /// Go straight to `execute`; the server never calls `wait_until`.
    pub skip_wait_until: bool,
    /// Timeout of the `wait_until` call, server default when `None`.
    pub wait_until_timeout_seconds: Option<i32>,
    /// Timeout of the `execute` call, server default when `None`.
    pub execute_timeout_seconds: Option<i32>,
    pub wait_until_retry_policy: Option<RetryPolicy>,
    pub execute_retry_policy: Option<RetryPolicy>,
    /// Recovery state invoked after a phase exhausts its retries.
    pub failure_recovery: Option<FailureRecovery>,
    /// Name of an override policy of the process persistence schema.
    pub persistence_policy_name: Option<String>,
}

impl AsyncStateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skip_wait_until(mut self) -> Self {
        self.skip_wait_until = true;
        self
    }

    pub fn with_wait_until_timeout_seconds(mut self, seconds: i32) -> Self {
        self.wait_until_timeout_seconds = Some(seconds);
        self
    }

    pub fn with_execute_timeout_seconds(mut self, seconds: i32) -> Self {
        self.execute_timeout_seconds = Some(seconds);
        self
    }

    pub fn with_wait_until_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.wait_until_retry_policy = Some(policy);
        self
    }

    pub fn with_execute_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.execute_retry_policy = Some(policy);
        self
    }

    /// Proceeds to the given state when a phase of this state exhausts its
    /// retry policy. The target must be registered in the same process and
    /// must not declare a recovery of its own.
    pub fn with_failure_recovery(mut self, state_id: impl Into<String>) -> Self {
        self.failure_recovery = Some(FailureRecovery {
            state_id: state_id.into(),
        });
        self
    }

    pub fn with_persistence_policy_name(mut self, name: impl Into<String>) -> Self {
        self.persistence_policy_name = Some(name.into());
        self
    }
}

/// Options of a process definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Explicit process type. Derived from the type name when `None`.
    pub process_type: Option<String>,
    /// Process execution timeout, none when `None`.
    pub timeout_seconds: Option<i32>,
    pub id_reuse_policy: Option<ProcessIdReusePolicy>,
}

impl ProcessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process_type(mut self, process_type: impl Into<String>) -> Self {
        self.process_type = Some(process_type.into());
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: i32) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn with_id_reuse_policy(mut self, policy: ProcessIdReusePolicy) -> Self {
        self.id_reuse_policy = Some(policy);
        self
    }
}

/// Row selection and initial writes of one global attribute table.
#[derive(Debug, Clone, PartialEq)]
pub struct DbTableConfig {
    pub table_name: String,
    /// Primary key value of the row this process execution works on
    pub pk_value: Value,
    /// Attribute key to initial value, written when the execution starts
    pub initial_attributes: BTreeMap<String, Value>,
    /// Required when `initial_attributes` is not empty
    pub initial_write_conflict_mode: Option<WriteConflictMode>,
}

impl DbTableConfig {
    /// Creates a table config selecting the row with the given primary key.
    pub fn new(table_name: impl Into<String>, pk_value: impl Into<Value>) -> Self {
        Self {
            table_name: table_name.into(),
            pk_value: pk_value.into(),
            initial_attributes: BTreeMap::new(),
            initial_write_conflict_mode: None,
        }
    }

    pub fn with_initial_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.initial_attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_initial_write_conflict_mode(mut self, mode: WriteConflictMode) -> Self {
        self.initial_write_conflict_mode = Some(mode);
        self
    }
}

/// Global attribute settings of a process start.
///
/// Every table declared in the process persistence schema must be configured.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalAttributeOptions {
    pub table_configs: Vec<DbTableConfig>,
}

impl GlobalAttributeOptions {
    pub fn new(table_configs: Vec<DbTableConfig>) -> Self {
        Self { table_configs }
    }

    pub(crate) fn table_config(&self, table_name: &str) -> Option<&DbTableConfig> {
        self.table_configs
            .iter()
            .find(|config| config.table_name == table_name)
    }
}

/// Options of a single process start. Values set here override the
/// process definition's [`ProcessOptions`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessStartOptions {
    pub timeout_seconds: Option<i32>,
    pub id_reuse_policy: Option<ProcessIdReusePolicy>,
    /// Required when the process declares global attribute tables
    pub global_attribute_options: Option<GlobalAttributeOptions>,
    /// Local attribute key to initial value
    pub initial_local_attributes: BTreeMap<String, Value>,
}

impl ProcessStartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout_seconds(mut self, seconds: i32) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn with_id_reuse_policy(mut self, policy: ProcessIdReusePolicy) -> Self {
        self.id_reuse_policy = Some(policy);
        self
    }

    pub fn with_global_attribute_options(mut self, options: GlobalAttributeOptions) -> Self {
        self.global_attribute_options = Some(options);
        self
    }

    pub fn with_initial_local_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.initial_local_attributes.insert(key.into(), value.into());
        self
    }
}

/// Wire-level options of a start that bypasses the registry.
///
/// Used with [`Client::basic_start_process`](crate::Client::basic_start_process)
/// when the process type is defined by another worker, so the caller
/// supplies the starting state's configuration itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicProcessStartOptions {
    pub id_reuse_policy: Option<ProcessIdReusePolicy>,
    pub start_state_config: Option<AsyncStateConfig>,
    pub timeout_seconds: Option<i32>,
    pub global_attribute_config: Option<GlobalAttributeConfig>,
    pub local_attribute_config: Option<LocalAttributeConfig>,
}

impl BasicProcessStartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_reuse_policy(mut self, policy: ProcessIdReusePolicy) -> Self {
        self.id_reuse_policy = Some(policy);
        self
    }

    pub fn with_start_state_config(mut self, config: AsyncStateConfig) -> Self {
        self.start_state_config = Some(config);
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: i32) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn with_global_attribute_config(mut self, config: GlobalAttributeConfig) -> Self {
        self.global_attribute_config = Some(config);
        self
    }

    pub fn with_local_attribute_config(mut self, config: LocalAttributeConfig) -> Self {
        self.local_attribute_config = Some(config);
        self
    }
}

/// Deduplication settings of a local queue message.
///
/// `dedup_uuid` wins over `dedup_seed`; a seed is turned into a name based
/// UUID so publishing the same seed twice yields the same dedup id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalQueuePublishOptions {
    pub dedup_seed: Option<String>,
    pub dedup_uuid: Option<String>,
}

impl LocalQueuePublishOptions {
    pub fn with_dedup_seed(seed: impl Into<String>) -> Self {
        Self {
            dedup_seed: Some(seed.into()),
            dedup_uuid: None,
        }
    }

    pub fn with_dedup_uuid(uuid: impl Into<String>) -> Self {
        Self {
            dedup_seed: None,
            dedup_uuid: Some(uuid.into()),
        }
    }

    /// Checks that an explicit `dedup_uuid` is a UUID.
    pub fn validate(&self) -> ProcessResult<()> {
        if let Some(dedup_uuid) = &self.dedup_uuid {
            uuid::Uuid::parse_str(dedup_uuid).map_err(|e| {
                ProcessError::invalid_argument(format!("invalid dedup uuid '{}': {}", dedup_uuid, e))
            })?;
        }
        Ok(())
    }

    /// Resolves the dedup id sent to the server.
    pub fn dedup_id(&self) -> Option<String> {
        if let Some(uuid) = &self.dedup_uuid {
            return Some(uuid.clone());
        }
        self.dedup_seed
            .as_ref()
            .map(|seed| uuid::Uuid::new_v3(&uuid::Uuid::NAMESPACE_OID, seed.as_bytes()).to_string())
    }
}

/// A message for a batch publish.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalQueuePublishMessage {
    pub queue_name: String,
    pub payload: Value,
    pub options: LocalQueuePublishOptions,
}

impl LocalQueuePublishMessage {
    /// Creates a message. Use `serde_json::to_value` for struct payloads.
    pub fn new(queue_name: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            queue_name: queue_name.into(),
            payload: payload.into(),
            options: LocalQueuePublishOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LocalQueuePublishOptions) -> Self {
        self.options = options;
        self
    }
}
