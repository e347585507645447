//! Wire types exchanged with the process orchestration server.
//!
//! Field names are a server contract and are spelled out with explicit
//! `#[serde(rename)]` attributes. Enum values serialize as their variant
//! names. Optional collections are omitted from the JSON when empty and
//! default to empty when absent.

use serde::{Deserialize, Serialize};

use crate::config::RetryPolicy;

/// The universal payload envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedObject {
    /// Encoding tag, checked by decoders before reading `data`
    #[serde(rename = "encoding", default)]
    pub encoding: String,
    /// Encoded payload
    #[serde(rename = "data", default)]
    pub data: String,
}

impl EncodedObject {
    /// Creates a new EncodedObject.
    pub fn new(encoding: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            encoding: encoding.into(),
            data: data.into(),
        }
    }

    /// Returns true if the object carries no payload.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Invocation context sent with every worker callback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(rename = "processId")]
    pub process_id: String,
    #[serde(rename = "processExecutionId")]
    pub process_execution_id: String,
    #[serde(rename = "stateExecutionId", skip_serializing_if = "Option::is_none", default)]
    pub state_execution_id: Option<String>,
    #[serde(rename = "firstAttemptTimestamp", skip_serializing_if = "Option::is_none", default)]
    pub first_attempt_timestamp: Option<i64>,
    #[serde(rename = "processStartedTimestamp", skip_serializing_if = "Option::is_none", default)]
    pub process_started_timestamp: Option<i64>,
    /// 1-indexed attempt number of the current phase
    #[serde(rename = "attempt", skip_serializing_if = "Option::is_none", default)]
    pub attempt: Option<i32>,
    #[serde(rename = "recoverFromStateExecutionId", skip_serializing_if = "Option::is_none", default)]
    pub recover_from_state_execution_id: Option<String>,
    #[serde(rename = "recoverFromApi", skip_serializing_if = "Option::is_none", default)]
    pub recover_from_api: Option<StateApiType>,
}

/// How the server should wait on the commands of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandWaitingType {
    /// No commands, proceed to execute immediately
    EmptyCommand,
    /// Proceed once any command completes
    AnyOfCompletion,
    /// Proceed once every command completes
    AllOfCompletion,
}

/// Status of a single requested command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    /// Still waiting
    WaitingCommand,
    /// Completed
    CompletedCommand,
    /// Not waited on because the request was already satisfied
    SkippedCommand,
}

/// Terminal outcome of a process execution branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadCloseType {
    /// Complete the process once all other branches end
    GracefulCompleteProcess,
    /// Complete the process right away
    ForceCompleteProcess,
    /// Fail the process right away
    ForceFailProcess,
    /// End this branch without affecting the process outcome
    DeadEnd,
}

/// Phase of an async state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateApiType {
    WaitUntilApi,
    ExecuteApi,
}

/// What the server does when a phase exhausts its retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateFailureRecoveryPolicy {
    FailProcess,
    ProceedToConfiguredState,
}

/// Row or attribute locking applied when the server loads attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseLockingType {
    NoLocking,
    ShareLock,
    ExclusiveLock,
}

/// Policy for reusing a business process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessIdReusePolicy {
    AllowIfNoRunning,
    AllowIfPreviousExitAbnormally,
    DisallowReuse,
    TerminateIfRunning,
}

/// Status of a process execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStatus {
    Running,
    Completed,
    Failed,
    Timeout,
    Terminated,
}

impl ProcessStatus {
    /// Returns true once the execution can no longer make progress.
    pub fn is_closed(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// How an external stop request ends a process execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessExecutionStopType {
    Terminate,
    Fail,
}

/// How initial attribute writes resolve conflicts with existing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteConflictMode {
    ReturnErrorOnConflict,
    OverrideOnConflict,
    IgnoreConflict,
}

/// Sub status carried by server error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSubStatus {
    UncategorizedSubStatus,
    ExecutionAlreadyStartedSubStatus,
    ExecutionNotExistsSubStatus,
    /// A sub status this SDK version does not know about
    #[serde(other)]
    Unknown,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerCommand {
    #[serde(rename = "delayInSeconds")]
    pub delay_in_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalQueueCommand {
    #[serde(rename = "queueName")]
    pub queue_name: String,
    #[serde(rename = "count", skip_serializing_if = "Option::is_none", default)]
    pub count: Option<i32>,
}

/// Commands requested by a wait-until phase, split by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(rename = "waitingType")]
    pub waiting_type: CommandWaitingType,
    #[serde(rename = "timerCommands", skip_serializing_if = "Vec::is_empty", default)]
    pub timer_commands: Vec<TimerCommand>,
    #[serde(rename = "localQueueCommands", skip_serializing_if = "Vec::is_empty", default)]
    pub local_queue_commands: Vec<LocalQueueCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerResult {
    #[serde(rename = "status")]
    pub status: CommandStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalQueueMessageResult {
    #[serde(rename = "dedupId", skip_serializing_if = "Option::is_none", default)]
    pub dedup_id: Option<String>,
    #[serde(rename = "payload", skip_serializing_if = "Option::is_none", default)]
    pub payload: Option<EncodedObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalQueueResult {
    #[serde(rename = "queueName")]
    pub queue_name: String,
    #[serde(rename = "status")]
    pub status: CommandStatus,
    #[serde(rename = "messages", skip_serializing_if = "Vec::is_empty", default)]
    pub messages: Vec<LocalQueueMessageResult>,
}

/// Results of the commands requested by wait-until, in request order per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResults {
    #[serde(rename = "timerResults", skip_serializing_if = "Vec::is_empty", default)]
    pub timer_results: Vec<TimerResult>,
    #[serde(rename = "localQueueResults", skip_serializing_if = "Vec::is_empty", default)]
    pub local_queue_results: Vec<LocalQueueResult>,
}

/// A message to publish to a local queue of a process execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalQueueMessage {
    #[serde(rename = "queueName")]
    pub queue_name: String,
    #[serde(rename = "dedupId", skip_serializing_if = "Option::is_none", default)]
    pub dedup_id: Option<String>,
    #[serde(rename = "payload", skip_serializing_if = "Option::is_none", default)]
    pub payload: Option<EncodedObject>,
}

// ---------------------------------------------------------------------------
// Decisions and state configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadCloseDecision {
    #[serde(rename = "closeType")]
    pub close_type: ThreadCloseType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMovement {
    #[serde(rename = "stateId")]
    pub state_id: String,
    #[serde(rename = "stateInput", skip_serializing_if = "Option::is_none", default)]
    pub state_input: Option<EncodedObject>,
    #[serde(rename = "stateConfig", skip_serializing_if = "Option::is_none", default)]
    pub state_config: Option<AsyncStateConfig>,
}

/// Exactly one of `next_states` and `thread_close_decision` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDecision {
    #[serde(rename = "nextStates", skip_serializing_if = "Vec::is_empty", default)]
    pub next_states: Vec<StateMovement>,
    #[serde(rename = "threadCloseDecision", skip_serializing_if = "Option::is_none", default)]
    pub thread_close_decision: Option<ThreadCloseDecision>,
}

/// Execution configuration of a state, derived from its options and the
/// process persistence schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AsyncStateConfig {
    #[serde(rename = "skipWaitUntil", skip_serializing_if = "Option::is_none", default)]
    pub skip_wait_until: Option<bool>,
    #[serde(rename = "waitUntilApiTimeoutSeconds", skip_serializing_if = "Option::is_none", default)]
    pub wait_until_api_timeout_seconds: Option<i32>,
    #[serde(rename = "executeApiTimeoutSeconds", skip_serializing_if = "Option::is_none", default)]
    pub execute_api_timeout_seconds: Option<i32>,
    #[serde(rename = "waitUntilApiRetryPolicy", skip_serializing_if = "Option::is_none", default)]
    pub wait_until_api_retry_policy: Option<RetryPolicy>,
    #[serde(rename = "executeApiRetryPolicy", skip_serializing_if = "Option::is_none", default)]
    pub execute_api_retry_policy: Option<RetryPolicy>,
    #[serde(rename = "stateFailureRecoveryOptions", skip_serializing_if = "Option::is_none", default)]
    pub state_failure_recovery_options: Option<StateFailureRecoveryOptions>,
    #[serde(rename = "loadGlobalAttributesRequest", skip_serializing_if = "Option::is_none", default)]
    pub load_global_attributes_request: Option<LoadGlobalAttributesRequest>,
    #[serde(rename = "loadLocalAttributesRequest", skip_serializing_if = "Option::is_none", default)]
    pub load_local_attributes_request: Option<LoadLocalAttributesRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFailureRecoveryOptions {
    #[serde(rename = "policy")]
    pub policy: StateFailureRecoveryPolicy,
    #[serde(rename = "stateFailureProceedStateId", skip_serializing_if = "Option::is_none", default)]
    pub state_failure_proceed_state_id: Option<String>,
    #[serde(rename = "stateFailureProceedStateConfig", skip_serializing_if = "Option::is_none", default)]
    pub state_failure_proceed_state_config: Option<Box<AsyncStateConfig>>,
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumnDef {
    #[serde(rename = "dbColumn")]
    pub db_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReadRequest {
    #[serde(rename = "tableName")]
    pub table_name: String,
    #[serde(rename = "lockingType", skip_serializing_if = "Option::is_none", default)]
    pub locking_type: Option<DatabaseLockingType>,
    #[serde(rename = "columns", default)]
    pub columns: Vec<TableColumnDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadGlobalAttributesRequest {
    #[serde(rename = "tableRequests")]
    pub table_requests: Vec<TableReadRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumnValue {
    #[serde(rename = "dbColumn")]
    pub db_column: String,
    #[serde(rename = "dbQueryValue")]
    pub db_query_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReadResponse {
    #[serde(rename = "tableName")]
    pub table_name: String,
    #[serde(rename = "columns", default)]
    pub columns: Vec<TableColumnValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadGlobalAttributeResponse {
    #[serde(rename = "tableResponses", default)]
    pub table_responses: Vec<TableReadResponse>,
}

/// Column writes of one table row, produced by an execute phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalAttributeTableRowUpdate {
    #[serde(rename = "tableName")]
    pub table_name: String,
    #[serde(rename = "updateColumns")]
    pub update_columns: Vec<TableColumnValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadLocalAttributesRequest {
    #[serde(rename = "lockingType", skip_serializing_if = "Option::is_none", default)]
    pub locking_type: Option<DatabaseLockingType>,
    #[serde(rename = "keysToLoadNoLock", skip_serializing_if = "Vec::is_empty", default)]
    pub keys_to_load_no_lock: Vec<String>,
    #[serde(rename = "keysToLoadWithLock", skip_serializing_if = "Vec::is_empty", default)]
    pub keys_to_load_with_lock: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    #[serde(rename = "key")]
    pub key: String,
    #[serde(rename = "value")]
    pub value: EncodedObject,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadLocalAttributesResponse {
    #[serde(rename = "attributes", default)]
    pub attributes: Vec<KeyValue>,
}

// ---------------------------------------------------------------------------
// Worker callbacks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncStateWaitUntilRequest {
    #[serde(rename = "processType")]
    pub process_type: String,
    #[serde(rename = "stateId")]
    pub state_id: String,
    #[serde(rename = "stateInput", skip_serializing_if = "Option::is_none", default)]
    pub state_input: Option<EncodedObject>,
    #[serde(rename = "context")]
    pub context: Context,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncStateWaitUntilResponse {
    #[serde(rename = "commandRequest")]
    pub command_request: CommandRequest,
    #[serde(rename = "publishToLocalQueue", skip_serializing_if = "Vec::is_empty", default)]
    pub publish_to_local_queue: Vec<LocalQueueMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncStateExecuteRequest {
    #[serde(rename = "processType")]
    pub process_type: String,
    #[serde(rename = "stateId")]
    pub state_id: String,
    #[serde(rename = "stateInput", skip_serializing_if = "Option::is_none", default)]
    pub state_input: Option<EncodedObject>,
    #[serde(rename = "context")]
    pub context: Context,
    #[serde(rename = "commandResults", skip_serializing_if = "Option::is_none", default)]
    pub command_results: Option<CommandResults>,
    #[serde(rename = "loadedGlobalAttributes", skip_serializing_if = "Option::is_none", default)]
    pub loaded_global_attributes: Option<LoadGlobalAttributeResponse>,
    #[serde(rename = "loadedLocalAttributes", skip_serializing_if = "Option::is_none", default)]
    pub loaded_local_attributes: Option<LoadLocalAttributesResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncStateExecuteResponse {
    #[serde(rename = "stateDecision")]
    pub state_decision: StateDecision,
    #[serde(rename = "publishToLocalQueue", skip_serializing_if = "Vec::is_empty", default)]
    pub publish_to_local_queue: Vec<LocalQueueMessage>,
    #[serde(rename = "writeToGlobalAttributes", skip_serializing_if = "Vec::is_empty", default)]
    pub write_to_global_attributes: Vec<GlobalAttributeTableRowUpdate>,
    #[serde(rename = "writeToLocalAttributes", skip_serializing_if = "Vec::is_empty", default)]
    pub write_to_local_attributes: Vec<KeyValue>,
}

// ---------------------------------------------------------------------------
// Process execution service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalAttributeTableConfig {
    #[serde(rename = "tableName")]
    pub table_name: String,
    #[serde(rename = "primaryKey")]
    pub primary_key: TableColumnValue,
    #[serde(rename = "initialWrite", skip_serializing_if = "Vec::is_empty", default)]
    pub initial_write: Vec<TableColumnValue>,
    #[serde(rename = "initialWriteMode", skip_serializing_if = "Option::is_none", default)]
    pub initial_write_mode: Option<WriteConflictMode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalAttributeConfig {
    #[serde(rename = "tableConfigs")]
    pub table_configs: Vec<GlobalAttributeTableConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAttributeConfig {
    #[serde(rename = "initialWrite", default)]
    pub initial_write: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStartConfig {
    #[serde(rename = "timeoutSeconds", skip_serializing_if = "Option::is_none", default)]
    pub timeout_seconds: Option<i32>,
    #[serde(rename = "idReusePolicy", skip_serializing_if = "Option::is_none", default)]
    pub id_reuse_policy: Option<ProcessIdReusePolicy>,
    #[serde(rename = "globalAttributeConfig", skip_serializing_if = "Option::is_none", default)]
    pub global_attribute_config: Option<GlobalAttributeConfig>,
    #[serde(rename = "localAttributeConfig", skip_serializing_if = "Option::is_none", default)]
    pub local_attribute_config: Option<LocalAttributeConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessExecutionStartRequest {
    #[serde(rename = "namespace")]
    pub namespace: String,
    #[serde(rename = "processId")]
    pub process_id: String,
    #[serde(rename = "processType")]
    pub process_type: String,
    #[serde(rename = "workerUrl")]
    pub worker_url: String,
    #[serde(rename = "startStateId", skip_serializing_if = "Option::is_none", default)]
    pub start_state_id: Option<String>,
    #[serde(rename = "startStateInput", skip_serializing_if = "Option::is_none", default)]
    pub start_state_input: Option<EncodedObject>,
    #[serde(rename = "startStateConfig", skip_serializing_if = "Option::is_none", default)]
    pub start_state_config: Option<AsyncStateConfig>,
    #[serde(rename = "processStartConfig", skip_serializing_if = "Option::is_none", default)]
    pub process_start_config: Option<ProcessStartConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessExecutionStartResponse {
    #[serde(rename = "processExecutionId")]
    pub process_execution_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessExecutionStopRequest {
    #[serde(rename = "namespace")]
    pub namespace: String,
    #[serde(rename = "processId")]
    pub process_id: String,
    #[serde(rename = "stopType", skip_serializing_if = "Option::is_none", default)]
    pub stop_type: Option<ProcessExecutionStopType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessExecutionDescribeRequest {
    #[serde(rename = "namespace")]
    pub namespace: String,
    #[serde(rename = "processId")]
    pub process_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessExecutionDescribeResponse {
    #[serde(rename = "processExecutionId", skip_serializing_if = "Option::is_none", default)]
    pub process_execution_id: Option<String>,
    #[serde(rename = "processType", skip_serializing_if = "Option::is_none", default)]
    pub process_type: Option<String>,
    #[serde(rename = "workerUrl", skip_serializing_if = "Option::is_none", default)]
    pub worker_url: Option<String>,
    /// Unix seconds
    #[serde(rename = "startTimestamp", skip_serializing_if = "Option::is_none", default)]
    pub start_timestamp: Option<i64>,
    #[serde(rename = "status", skip_serializing_if = "Option::is_none", default)]
    pub status: Option<ProcessStatus>,
}

impl ProcessExecutionDescribeResponse {
    /// Start time of the execution, if the server reported one.
    pub fn started_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.start_timestamp
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishToLocalQueueRequest {
    #[serde(rename = "namespace")]
    pub namespace: String,
    #[serde(rename = "processId")]
    pub process_id: String,
    #[serde(rename = "messages")]
    pub messages: Vec<LocalQueueMessage>,
}

/// Structured error body returned by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(rename = "detail", skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
    #[serde(rename = "errorSubStatus", skip_serializing_if = "Option::is_none", default)]
    pub error_sub_status: Option<ErrorSubStatus>,
    #[serde(rename = "originalWorkerErrorDetail", skip_serializing_if = "Option::is_none", default)]
    pub original_worker_error_detail: Option<String>,
    #[serde(rename = "originalWorkerErrorType", skip_serializing_if = "Option::is_none", default)]
    pub original_worker_error_type: Option<String>,
}
