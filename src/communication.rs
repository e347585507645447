//! Side effects a state phase asks the server to perform.

use serde::Serialize;

use crate::api::LocalQueueMessage;
use crate::config::LocalQueuePublishOptions;
use crate::error::ProcessResult;
use crate::serdes::SharedObjectEncoder;

/// Collects local queue publishes of one phase invocation.
///
/// Messages are returned to the server in call order with the phase
/// response; the server delivers them. A `Communication` belongs to exactly
/// one invocation.
pub struct Communication {
    encoder: SharedObjectEncoder,
    messages: Vec<LocalQueueMessage>,
}

impl Communication {
    pub fn new(encoder: SharedObjectEncoder) -> Self {
        Self {
            encoder,
            messages: Vec::new(),
        }
    }

    /// Publishes a message to a local queue of the current process execution.
    pub fn publish_to_local_queue<T: Serialize + ?Sized>(
        &mut self,
        queue_name: impl Into<String>,
        payload: &T,
    ) -> ProcessResult<()> {
        self.publish_to_local_queue_with_options(queue_name, payload, &LocalQueuePublishOptions::default())
    }

    /// Publishes a message with deduplication options.
    ///
    /// An explicit dedup uuid that does not parse is an `InvalidArgument`
    /// error and nothing is published.
    pub fn publish_to_local_queue_with_options<T: Serialize + ?Sized>(
        &mut self,
        queue_name: impl Into<String>,
        payload: &T,
        options: &LocalQueuePublishOptions,
    ) -> ProcessResult<()> {
        options.validate()?;
        let payload = self.encoder.encode(payload)?;
        self.messages.push(LocalQueueMessage {
            queue_name: queue_name.into(),
            dedup_id: options.dedup_id(),
            payload: (!payload.is_empty()).then_some(payload),
        });
        Ok(())
    }

    /// Messages published so far.
    pub fn messages(&self) -> &[LocalQueueMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<LocalQueueMessage> {
        self.messages
    }
}

impl std::fmt::Debug for Communication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communication")
            .field("messages", &self.messages.len())
            .finish()
    }
}
