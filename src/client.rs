//! Client for the process execution service.
//!
//! Two layers:
//!
//! - [`ProcessServiceClient`] is the raw REST surface of the server, one
//!   method per endpoint. [`RestProcessServiceClient`] implements it with
//!   `reqwest`; tests substitute their own implementation.
//! - [`Client`] is registry aware. It derives the start request of a
//!   registered process (starting state, state configuration, attribute
//!   initialization) and encodes payloads with the configured encoders.
//!
//! The client never retries. Non-success statuses surface as
//! [`ProcessError::Api`] with the server's structured error body when it
//! sent one.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::api::{
    GlobalAttributeConfig, GlobalAttributeTableConfig, KeyValue, LocalAttributeConfig, LocalQueueMessage,
    ProcessExecutionDescribeRequest, ProcessExecutionDescribeResponse, ProcessExecutionStartRequest,
    ProcessExecutionStartResponse, ProcessExecutionStopRequest, ProcessExecutionStopType, ProcessStartConfig,
    PublishToLocalQueueRequest, TableColumnValue,
};
use crate::config::{
    BasicProcessStartOptions, LocalQueuePublishMessage, LocalQueuePublishOptions, ProcessStartOptions,
};
use crate::error::{ProcessError, ProcessResult};
use crate::registry::{RegisteredProcess, Registry};
use crate::serdes::{BasicDbConverter, JsonObjectEncoder, SharedDbConverter, SharedObjectEncoder};
use crate::state::Process;

/// Path of the start endpoint.
pub const API_PATH_PROCESS_EXECUTION_START: &str = "/api/v1/xcherry/service/process-execution/start";
/// Path of the stop endpoint.
pub const API_PATH_PROCESS_EXECUTION_STOP: &str = "/api/v1/xcherry/service/process-execution/stop";
/// Path of the describe endpoint.
pub const API_PATH_PROCESS_EXECUTION_DESCRIBE: &str = "/api/v1/xcherry/service/process-execution/describe";
/// Path of the local queue publish endpoint.
pub const API_PATH_PUBLISH_TO_LOCAL_QUEUE: &str = "/api/v1/xcherry/service/process-execution/publish-to-local-queue";

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8801";
pub const DEFAULT_WORKER_URL: &str = "http://localhost:8803";

/// Raw calls to the process execution service.
///
/// This trait abstracts the transport so that the [`Client`] can run against
/// a mock in tests.
#[async_trait]
pub trait ProcessServiceClient: Send + Sync {
    /// Starts a process execution.
    ///
    /// # Returns
    ///
    /// The id of the new process execution, or [`ProcessError::Api`] if the
    /// server refused the start (see
    /// [`ProcessError::is_process_already_started`]).
    async fn start_process(
        &self,
        request: ProcessExecutionStartRequest,
    ) -> ProcessResult<ProcessExecutionStartResponse>;

    /// Stops the current execution of a process.
    async fn stop_process(&self, request: ProcessExecutionStopRequest) -> ProcessResult<()>;

    /// Describes the current execution of a process.
    async fn describe_current_process_execution(
        &self,
        request: ProcessExecutionDescribeRequest,
    ) -> ProcessResult<ProcessExecutionDescribeResponse>;

    /// Publishes messages to local queues of the current execution of a process.
    async fn publish_to_local_queue(&self, request: PublishToLocalQueueRequest) -> ProcessResult<()>;
}

/// Type alias for a shared ProcessServiceClient.
pub type SharedProcessServiceClient = Arc<dyn ProcessServiceClient>;

/// `reqwest` implementation of [`ProcessServiceClient`].
#[derive(Debug, Clone)]
pub struct RestProcessServiceClient {
    http_client: reqwest::Client,
    server_url: String,
    enable_debug_logging: bool,
}

impl RestProcessServiceClient {
    /// Creates a client for the server at `server_url`.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            server_url: server_url.into().trim_end_matches('/').to_string(),
            enable_debug_logging: false,
        }
    }

    /// Creates a client from the server URL and logging flag of `options`.
    pub fn from_options(options: &ClientOptions) -> Self {
        Self::new(options.server_url.clone()).with_debug_logging(options.enable_debug_logging)
    }

    /// Uses the given HTTP client, e.g. one with custom timeouts.
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Logs every request and response at debug level.
    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.enable_debug_logging = enabled;
        self
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Posts `request` as JSON and returns the response body of a 2xx answer.
    async fn post<Req: Serialize + Sync>(&self, path: &str, request: &Req) -> ProcessResult<Vec<u8>> {
        let url = format!("{}{}", self.server_url, path);
        if self.enable_debug_logging {
            tracing::debug!(
                path = path,
                request = %serde_json::to_string(request).unwrap_or_default(),
                "Process service request"
            );
        }

        let response = self.http_client.post(&url).json(request).send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        if self.enable_debug_logging {
            tracing::debug!(
                path = path,
                status = status.as_u16(),
                response = %String::from_utf8_lossy(&body),
                "Process service response"
            );
        }

        if !status.is_success() {
            return Err(ProcessError::api(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn post_for<Req: Serialize + Sync, Resp: DeserializeOwned>(
        &self,
        path: &str,
        request: &Req,
    ) -> ProcessResult<Resp> {
        let body = self.post(path, request).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ProcessServiceClient for RestProcessServiceClient {
    async fn start_process(
        &self,
        request: ProcessExecutionStartRequest,
    ) -> ProcessResult<ProcessExecutionStartResponse> {
        self.post_for(API_PATH_PROCESS_EXECUTION_START, &request).await
    }

    async fn stop_process(&self, request: ProcessExecutionStopRequest) -> ProcessResult<()> {
        self.post(API_PATH_PROCESS_EXECUTION_STOP, &request).await?;
        Ok(())
    }

    async fn describe_current_process_execution(
        &self,
        request: ProcessExecutionDescribeRequest,
    ) -> ProcessResult<ProcessExecutionDescribeResponse> {
        self.post_for(API_PATH_PROCESS_EXECUTION_DESCRIBE, &request).await
    }

    async fn publish_to_local_queue(&self, request: PublishToLocalQueueRequest) -> ProcessResult<()> {
        self.post(API_PATH_PUBLISH_TO_LOCAL_QUEUE, &request).await?;
        Ok(())
    }
}

/// Options of a [`Client`].
///
/// # Example
///
/// ```
/// use durable_process_sdk::ClientOptions;
///
/// let options = ClientOptions::new()
///     .with_namespace("payments")
///     .with_server_url("http://xcherry:8801")
///     .with_debug_logging(true);
/// assert_eq!(options.worker_url, "http://localhost:8803");
/// ```
#[derive(Clone)]
pub struct ClientOptions {
    pub namespace: String,
    pub server_url: String,
    /// URL the server calls back for state phases
    pub worker_url: String,
    pub object_encoder: SharedObjectEncoder,
    pub db_converter: SharedDbConverter,
    /// Log every request and response at debug level
    pub enable_debug_logging: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            worker_url: DEFAULT_WORKER_URL.to_string(),
            object_encoder: JsonObjectEncoder::shared(),
            db_converter: BasicDbConverter::shared(),
            enable_debug_logging: false,
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_worker_url(mut self, url: impl Into<String>) -> Self {
        self.worker_url = url.into();
        self
    }

    pub fn with_object_encoder(mut self, encoder: SharedObjectEncoder) -> Self {
        self.object_encoder = encoder;
        self
    }

    pub fn with_db_converter(mut self, converter: SharedDbConverter) -> Self {
        self.db_converter = converter;
        self
    }

    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.enable_debug_logging = enabled;
        self
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("namespace", &self.namespace)
            .field("server_url", &self.server_url)
            .field("worker_url", &self.worker_url)
            .field("object_encoder", &self.object_encoder.encoding())
            .field("enable_debug_logging", &self.enable_debug_logging)
            .finish()
    }
}

/// Registry aware client.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use durable_process_sdk::{Client, ClientOptions, Registry};
///
/// # async fn run(registry: Arc<Registry>) -> durable_process_sdk::ProcessResult<()> {
/// let client = Client::new(registry, ClientOptions::default());
/// let status = client.describe_current_process_execution("order-1").await?.status;
/// println!("{:?}", status);
/// # Ok(())
/// # }
/// ```
pub struct Client {
    registry: Arc<Registry>,
    service_client: SharedProcessServiceClient,
    options: ClientOptions,
}

impl Client {
    /// Creates a client talking REST to `options.server_url`.
    pub fn new(registry: Arc<Registry>, options: ClientOptions) -> Self {
        let service_client = Arc::new(RestProcessServiceClient::from_options(&options));
        Self::with_service_client(registry, service_client, options)
    }

    /// Creates a client on top of the given service client.
    pub fn with_service_client(
        registry: Arc<Registry>,
        service_client: SharedProcessServiceClient,
        options: ClientOptions,
    ) -> Self {
        Self {
            registry,
            service_client,
            options,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn service_client(&self) -> &SharedProcessServiceClient {
        &self.service_client
    }

    /// Starts a registered process with default start options.
    ///
    /// Returns the process execution id.
    pub async fn start_process<T: Serialize + ?Sized>(
        &self,
        process: &dyn Process,
        process_id: &str,
        input: &T,
    ) -> ProcessResult<String> {
        self.start_process_with_options(process, process_id, input, &ProcessStartOptions::default())
            .await
    }

    /// Starts a registered process.
    ///
    /// Fails with [`ProcessError::InvalidArgument`] when the process is not
    /// registered, when the process declares global attribute tables and
    /// `options` does not configure every one of them, or when an initial
    /// attribute is not declared in the persistence schema.
    pub async fn start_process_with_options<T: Serialize + ?Sized>(
        &self,
        process: &dyn Process,
        process_id: &str,
        input: &T,
        options: &ProcessStartOptions,
    ) -> ProcessResult<String> {
        let request = self.start_request(&process.process_type(), process_id, input, options)?;
        tracing::debug!(
            process_type = %request.process_type,
            process_id = %process_id,
            "Starting process"
        );
        let response = self.service_client.start_process(request).await?;
        Ok(response.process_execution_id)
    }

    /// Starts a process type this client has no definition for.
    ///
    /// Nothing is derived from the registry: the request carries the given
    /// starting state, its configuration from `options`, and the encoded
    /// input. `start_state_id` of `None` starts the process without a state.
    pub async fn basic_start_process<T: Serialize + ?Sized>(
        &self,
        process_type: &str,
        start_state_id: Option<&str>,
        process_id: &str,
        input: &T,
        options: &BasicProcessStartOptions,
    ) -> ProcessResult<String> {
        if process_type.is_empty() {
            return Err(ProcessError::invalid_argument("process type must not be empty"));
        }
        let input = self.options.object_encoder.encode(input)?;
        let start_config = ProcessStartConfig {
            timeout_seconds: options.timeout_seconds,
            id_reuse_policy: options.id_reuse_policy,
            global_attribute_config: options.global_attribute_config.clone(),
            local_attribute_config: options.local_attribute_config.clone(),
        };
        let request = ProcessExecutionStartRequest {
            namespace: self.options.namespace.clone(),
            process_id: process_id.to_string(),
            process_type: process_type.to_string(),
            worker_url: self.options.worker_url.clone(),
            start_state_id: start_state_id.filter(|id| !id.is_empty()).map(str::to_string),
            start_state_input: (!input.is_empty()).then_some(input),
            start_state_config: options.start_state_config.clone(),
            process_start_config: (start_config != ProcessStartConfig::default()).then_some(start_config),
        };
        tracing::debug!(process_type = %process_type, process_id = %process_id, "Starting process");
        let response = self.service_client.start_process(request).await?;
        Ok(response.process_execution_id)
    }

    fn start_request<T: Serialize + ?Sized>(
        &self,
        process_type: &str,
        process_id: &str,
        input: &T,
        options: &ProcessStartOptions,
    ) -> ProcessResult<ProcessExecutionStartRequest> {
        let process = self.registry.get(process_type).ok_or_else(|| {
            ProcessError::invalid_argument(format!("process type '{}' is not registered", process_type))
        })?;

        let (start_state_id, start_state_config) = match process.starting_state() {
            Some(state) => (
                Some(state.state_id().to_string()),
                Some(process.state_config(state.state_id())?),
            ),
            None => (None, None),
        };

        let start_config = ProcessStartConfig {
            timeout_seconds: options.timeout_seconds.or(process.options().timeout_seconds),
            id_reuse_policy: options.id_reuse_policy.or(process.options().id_reuse_policy),
            global_attribute_config: self.global_attribute_config(process, options)?,
            local_attribute_config: self.local_attribute_config(process, options)?,
        };

        let input = self.options.object_encoder.encode(input)?;

        Ok(ProcessExecutionStartRequest {
            namespace: self.options.namespace.clone(),
            process_id: process_id.to_string(),
            process_type: process.process_type().to_string(),
            worker_url: self.options.worker_url.clone(),
            start_state_id,
            start_state_input: (!input.is_empty()).then_some(input),
            start_state_config,
            process_start_config: (start_config != ProcessStartConfig::default()).then_some(start_config),
        })
    }

    fn global_attribute_config(
        &self,
        process: &RegisteredProcess,
        options: &ProcessStartOptions,
    ) -> ProcessResult<Option<GlobalAttributeConfig>> {
        let tables = process.persistence_schema().tables();
        if tables.is_empty() {
            return Ok(None);
        }
        let global_options = options.global_attribute_options.as_ref().ok_or_else(|| {
            ProcessError::invalid_argument(format!(
                "global attribute options are required to start process '{}'",
                process.process_type()
            ))
        })?;
        if let Some(unknown) = global_options
            .table_configs
            .iter()
            .find(|config| !tables.iter().any(|t| t.table_name == config.table_name))
        {
            return Err(ProcessError::invalid_argument(format!(
                "table '{}' is not declared in the persistence schema",
                unknown.table_name
            )));
        }

        let converter = &self.options.db_converter;
        let index = process.schema_index();
        let mut table_configs = Vec::with_capacity(tables.len());
        for table in tables {
            let config = global_options.table_config(&table.table_name).ok_or_else(|| {
                ProcessError::invalid_argument(format!(
                    "global attribute options are missing table '{}'",
                    table.table_name
                ))
            })?;
            if !config.initial_attributes.is_empty() && config.initial_write_conflict_mode.is_none() {
                return Err(ProcessError::invalid_argument(format!(
                    "initial attributes of table '{}' require a write conflict mode",
                    table.table_name
                )));
            }

            let mut initial_write = Vec::with_capacity(config.initial_attributes.len());
            for (key, value) in &config.initial_attributes {
                let def = index
                    .global_attribute(key)
                    .filter(|def| def.table_name == table.table_name)
                    .ok_or_else(|| {
                        ProcessError::invalid_argument(format!(
                            "'{}' is not a global attribute of table '{}'",
                            key, table.table_name
                        ))
                    })?;
                initial_write.push(TableColumnValue {
                    db_column: def.column.clone(),
                    db_query_value: converter.to_db_value(value, def.hint.as_ref())?,
                });
            }

            table_configs.push(GlobalAttributeTableConfig {
                table_name: table.table_name.clone(),
                primary_key: TableColumnValue {
                    db_column: table.primary_key.clone(),
                    db_query_value: converter.to_db_value(&config.pk_value, None)?,
                },
                initial_write,
                initial_write_mode: config.initial_write_conflict_mode,
            });
        }
        Ok(Some(GlobalAttributeConfig { table_configs }))
    }

    fn local_attribute_config(
        &self,
        process: &RegisteredProcess,
        options: &ProcessStartOptions,
    ) -> ProcessResult<Option<LocalAttributeConfig>> {
        if options.initial_local_attributes.is_empty() {
            return Ok(None);
        }
        let mut initial_write = Vec::with_capacity(options.initial_local_attributes.len());
        for (key, value) in &options.initial_local_attributes {
            if !process.schema_index().has_local_attribute(key) {
                return Err(ProcessError::invalid_argument(format!(
                    "'{}' is not a local attribute of process '{}'",
                    key,
                    process.process_type()
                )));
            }
            initial_write.push(KeyValue {
                key: key.clone(),
                value: self.options.object_encoder.encode_value(value)?,
            });
        }
        Ok(Some(LocalAttributeConfig { initial_write }))
    }

    /// Stops the current execution of a process.
    pub async fn stop_process(&self, process_id: &str, stop_type: ProcessExecutionStopType) -> ProcessResult<()> {
        self.service_client
            .stop_process(ProcessExecutionStopRequest {
                namespace: self.options.namespace.clone(),
                process_id: process_id.to_string(),
                stop_type: Some(stop_type),
            })
            .await
    }

    /// Describes the current execution of a process.
    pub async fn describe_current_process_execution(
        &self,
        process_id: &str,
    ) -> ProcessResult<ProcessExecutionDescribeResponse> {
        self.service_client
            .describe_current_process_execution(ProcessExecutionDescribeRequest {
                namespace: self.options.namespace.clone(),
                process_id: process_id.to_string(),
            })
            .await
    }

    /// Publishes one message to a local queue of the current execution.
    pub async fn publish_to_local_queue<T: Serialize + ?Sized>(
        &self,
        process_id: &str,
        queue_name: &str,
        payload: &T,
        options: Option<&LocalQueuePublishOptions>,
    ) -> ProcessResult<()> {
        let payload = serde_json::to_value(payload)?;
        let message = self.to_api_message(queue_name, &payload, options.cloned().unwrap_or_default())?;
        self.publish(process_id, vec![message]).await
    }

    /// Publishes several messages in one request, in the given order.
    pub async fn batch_publish_to_local_queue(
        &self,
        process_id: &str,
        messages: Vec<LocalQueuePublishMessage>,
    ) -> ProcessResult<()> {
        let messages = messages
            .into_iter()
            .map(|m| self.to_api_message(&m.queue_name, &m.payload, m.options))
            .collect::<ProcessResult<Vec<_>>>()?;
        self.publish(process_id, messages).await
    }

    async fn publish(&self, process_id: &str, messages: Vec<LocalQueueMessage>) -> ProcessResult<()> {
        self.service_client
            .publish_to_local_queue(PublishToLocalQueueRequest {
                namespace: self.options.namespace.clone(),
                process_id: process_id.to_string(),
                messages,
            })
            .await
    }

    fn to_api_message(
        &self,
        queue_name: &str,
        payload: &serde_json::Value,
        options: LocalQueuePublishOptions,
    ) -> ProcessResult<LocalQueueMessage> {
        options.validate()?;
        let payload = self.options.object_encoder.encode_value(payload)?;
        Ok(LocalQueueMessage {
            queue_name: queue_name.to_string(),
            dedup_id: options.dedup_id(),
            payload: (!payload.is_empty()).then_some(payload),
        })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("process_types", &self.registry.process_types())
            .field("options", &self.options)
            .finish()
    }
}

/// A mock implementation of ProcessServiceClient for testing.
#[cfg(test)]
#[derive(Default)]
pub struct MockProcessServiceClient {
    start_responses: std::sync::Mutex<Vec<ProcessResult<ProcessExecutionStartResponse>>>,
    start_requests: std::sync::Mutex<Vec<ProcessExecutionStartRequest>>,
    publish_requests: std::sync::Mutex<Vec<PublishToLocalQueueRequest>>,
}

#[cfg(test)]
impl MockProcessServiceClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_response(self, response: ProcessResult<ProcessExecutionStartResponse>) -> Self {
        self.start_responses.lock().unwrap().push(response);
        self
    }

    pub fn start_requests(&self) -> Vec<ProcessExecutionStartRequest> {
        self.start_requests.lock().unwrap().clone()
    }

    pub fn publish_requests(&self) -> Vec<PublishToLocalQueueRequest> {
        self.publish_requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ProcessServiceClient for MockProcessServiceClient {
    async fn start_process(
        &self,
        request: ProcessExecutionStartRequest,
    ) -> ProcessResult<ProcessExecutionStartResponse> {
        self.start_requests.lock().unwrap().push(request);
        let mut responses = self.start_responses.lock().unwrap();
        if responses.is_empty() {
            Ok(ProcessExecutionStartResponse {
                process_execution_id: "mock-execution".to_string(),
            })
        } else {
            responses.remove(0)
        }
    }

    async fn stop_process(&self, _request: ProcessExecutionStopRequest) -> ProcessResult<()> {
        Ok(())
    }

    async fn describe_current_process_execution(
        &self,
        _request: ProcessExecutionDescribeRequest,
    ) -> ProcessResult<ProcessExecutionDescribeResponse> {
        Ok(ProcessExecutionDescribeResponse::default())
    }

    async fn publish_to_local_queue(&self, request: PublishToLocalQueueRequest) -> ProcessResult<()> {
        self.publish_requests.lock().unwrap().push(request);
        Ok(())
    }
}
