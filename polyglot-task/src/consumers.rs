//! Task store finalizer consumers
//!
//! The task service observes the end of the pipeline on two topics:
//! `encoding.completed` finalizes a successful run, `task.failed` records a
//! stage failure. Both run on the generic stage loop with no downstream
//! topic and no failure notification (a finalizer that failed to finalize
//! must not publish onto the failure topic it consumes).
//!
//! Known gap, preserved from the original design: finalization does not
//! check the current status first, so a task cancelled while a stage was
//! in flight can be overwritten to COMPLETED or FAILED afterwards.

use async_trait::async_trait;
use tracing::{info, warn};

use polyglot_common::consumer::{Outbound, StageHandler};
use polyglot_common::messages::{EncodingCompletedMessage, TaskFailedMessage};
use polyglot_common::task::TaskStatus;
use polyglot_common::{topics, Result};

use crate::store::TaskStore;

pub const CONSUMER_GROUP: &str = "task-service-group";

/// Finalizes a task when the encoding stage reports completion.
pub struct EncodingCompletedHandler {
    store: TaskStore,
}

impl EncodingCompletedHandler {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StageHandler for EncodingCompletedHandler {
    fn topic(&self) -> &'static str {
        topics::ENCODING_COMPLETED
    }

    fn group(&self) -> &'static str {
        CONSUMER_GROUP
    }

    fn failure_service(&self) -> Option<&'static str> {
        None
    }

    async fn process(&self, key: &str, payload: &[u8]) -> Result<Option<Outbound>> {
        let message: EncodingCompletedMessage = serde_json::from_slice(payload)?;
        info!(
            "encoding completed: taskId={}, encodedFiles={}, compressionRatio={:.3}",
            message.task_id, message.encoded_files, message.compression_ratio
        );
        if !self
            .store
            .record_completion(&message.task_id, message.encoded_files)
            .await?
        {
            warn!("encoding completed for unknown task: taskId={key}");
        }
        Ok(None)
    }
}

/// Marks a task FAILED when any stage publishes to the failure topic.
pub struct TaskFailedHandler {
    store: TaskStore,
}

impl TaskFailedHandler {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StageHandler for TaskFailedHandler {
    fn topic(&self) -> &'static str {
        topics::TASK_FAILED
    }

    fn group(&self) -> &'static str {
        CONSUMER_GROUP
    }

    fn failure_service(&self) -> Option<&'static str> {
        None
    }

    async fn process(&self, key: &str, payload: &[u8]) -> Result<Option<Outbound>> {
        let message: TaskFailedMessage = serde_json::from_slice(payload)?;
        info!(
            "task failed: taskId={}, service={}, error={}",
            message.task_id, message.service, message.error_message
        );
        if !self
            .store
            .update_status(
                &message.task_id,
                TaskStatus::Failed,
                Some(&message.error_message),
            )
            .await?
        {
            warn!("failure message for unknown task: taskId={key}");
        }
        Ok(None)
    }
}
