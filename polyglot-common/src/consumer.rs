//! Generic stage consumer loop
//!
//! Every stage worker follows the same discipline: pull one delivery,
//! consult the memory governor, invoke the stage's capability as a single
//! blocking unit, publish the downstream message keyed by task id, then
//! acknowledge. On any failure the stage publishes to the shared failure
//! topic and acknowledges anyway - a message is consumed exactly once
//! regardless of outcome, and recovery is a manual restart, never a
//! redelivery-based retry.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::bus::{publish_json, Delivery, MessageBus};
use crate::memory::MemoryGovernor;
use crate::messages::TaskFailedMessage;
use crate::{topics, Result};

/// Downstream message produced by a successful stage pass.
#[derive(Debug)]
pub struct Outbound {
    pub topic: &'static str,
    pub payload: Vec<u8>,
}

impl Outbound {
    /// Serialize `message` as the downstream payload for `topic`.
    pub fn json<T: serde::Serialize>(topic: &'static str, message: &T) -> Result<Self> {
        Ok(Self {
            topic,
            payload: serde_json::to_vec(message)?,
        })
    }
}

/// One pipeline stage: which topic it consumes and what it does with a
/// delivery. The surrounding loop owns governor checks, downstream
/// publishing, failure notification, and acknowledgment.
#[async_trait]
pub trait StageHandler: Send + Sync {
    /// Upstream topic this stage consumes.
    fn topic(&self) -> &'static str;

    /// Consumer group name (one group per service).
    fn group(&self) -> &'static str;

    /// Service name recorded in failure messages, or `None` for handlers
    /// (like the task service finalizers) whose own failures must not loop
    /// back onto the failure topic.
    fn failure_service(&self) -> Option<&'static str>;

    /// Process one delivery. `key` is the task id. Returning
    /// `Ok(Some(outbound))` publishes downstream before the ack;
    /// `Ok(None)` means the stage has no downstream topic.
    async fn process(&self, key: &str, payload: &[u8]) -> Result<Option<Outbound>>;
}

/// Publishes failure messages and marks the inbound message consumed.
/// Publish errors are logged and swallowed: a stage that cannot reach the
/// failure topic must still make progress.
#[derive(Clone)]
pub struct FailureNotifier {
    bus: Arc<dyn MessageBus>,
}

impl FailureNotifier {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }

    pub async fn notify(&self, task_id: &str, service: &str, error_message: String) {
        let message = TaskFailedMessage {
            task_id: task_id.to_string(),
            service: service.to_string(),
            error_message,
            failed_time: Utc::now(),
        };
        match publish_json(self.bus.as_ref(), topics::TASK_FAILED, task_id, &message).await {
            Ok(()) => info!("published task failure: taskId={task_id}, service={service}"),
            Err(e) => error!("failed to publish task failure for taskId={task_id}: {e}"),
        }
    }
}

/// Run one stage worker until its subscription closes.
///
/// Memory pressure abandons the delivery without acknowledging it; whether
/// the broker redelivers depends entirely on its unacked-pull handling.
pub async fn run_stage<H: StageHandler>(
    bus: Arc<dyn MessageBus>,
    governor: MemoryGovernor,
    handler: Arc<H>,
) -> Result<()> {
    let mut subscription = bus.subscribe(handler.topic(), handler.group()).await?;
    let notifier = FailureNotifier::new(bus.clone());
    info!(
        "stage consumer started: topic={}, group={}",
        handler.topic(),
        handler.group()
    );

    while let Some(delivery) = subscription.next().await {
        if governor.should_stop_consuming() {
            warn!(
                "memory pressure, abandoning message: taskId={}, topic={}",
                delivery.key, delivery.topic
            );
            governor.relieve_pressure().await;
            continue; // no ack: redelivery is the broker's call
        }
        handle_delivery(&bus, handler.as_ref(), &notifier, delivery).await;
    }

    info!("stage consumer stopped: topic={}", handler.topic());
    Ok(())
}

async fn handle_delivery<H: StageHandler + ?Sized>(
    bus: &Arc<dyn MessageBus>,
    handler: &H,
    notifier: &FailureNotifier,
    delivery: Delivery,
) {
    let task_id = delivery.key.clone();
    info!(
        "received message: taskId={task_id}, topic={}, offset={}",
        delivery.topic, delivery.offset
    );

    let outcome = handler.process(&task_id, &delivery.payload).await;
    match outcome {
        Ok(Some(outbound)) => {
            let topic = outbound.topic;
            match bus.publish(topic, &task_id, outbound.payload).await {
                Ok(()) => {
                    info!("published downstream message: taskId={task_id}, topic={topic}");
                }
                Err(e) => {
                    error!("downstream publish failed: taskId={task_id}, topic={topic}: {e}");
                    if let Some(service) = handler.failure_service() {
                        notifier
                            .notify(&task_id, service, format!("failed to publish result: {e}"))
                            .await;
                    }
                }
            }
        }
        Ok(None) => {}
        Err(e) => {
            error!(
                "stage processing failed: taskId={task_id}, topic={}: {e}",
                delivery.topic
            );
            if let Some(service) = handler.failure_service() {
                notifier.notify(&task_id, service, e.to_string()).await;
            }
        }
    }

    // Consumed exactly once regardless of outcome; failed messages are not
    // retried, recovery is a manual task restart.
    delivery.ack();
    info!("message processing finished: taskId={task_id}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::memory::{MemoryProbe, MemorySample};
    use crate::{topics, Error};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProbe(MemorySample);
    impl MemoryProbe for FixedProbe {
        fn sample(&self) -> MemorySample {
            self.0
        }
    }

    fn calm_governor() -> MemoryGovernor {
        MemoryGovernor::new(Arc::new(FixedProbe(MemorySample {
            used: 1,
            limit: Some(100),
            total: 100,
        })))
    }

    struct EchoStage {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl StageHandler for EchoStage {
        fn topic(&self) -> &'static str {
            "in.topic"
        }
        fn group(&self) -> &'static str {
            "echo-group"
        }
        fn failure_service(&self) -> Option<&'static str> {
            Some("echo-service")
        }
        async fn process(&self, _key: &str, payload: &[u8]) -> Result<Option<Outbound>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Capability("boom".into()));
            }
            Ok(Some(Outbound {
                topic: "out.topic",
                payload: payload.to_vec(),
            }))
        }
    }

    async fn settle() {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn success_publishes_downstream_and_acks() {
        let bus = Arc::new(MemoryBus::new());
        let handler = Arc::new(EchoStage {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let worker = tokio::spawn(run_stage(
            bus.clone() as Arc<dyn MessageBus>,
            calm_governor(),
            handler.clone(),
        ));
        // Worker must be subscribed before the publish; the bus does not
        // replay history.
        settle().await;

        bus.publish("in.topic", "t1", b"payload".to_vec())
            .await
            .unwrap();
        settle().await;

        let out = bus.published("out.topic");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key, "t1");
        assert_eq!(out[0].payload, b"payload");
        assert_eq!(bus.acked_offsets("in.topic", "echo-group"), vec![0]);
        assert!(bus.published(topics::TASK_FAILED).is_empty());
        worker.abort();
    }

    #[tokio::test]
    async fn failure_notifies_and_still_acks() {
        let bus = Arc::new(MemoryBus::new());
        let handler = Arc::new(EchoStage {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let worker = tokio::spawn(run_stage(
            bus.clone() as Arc<dyn MessageBus>,
            calm_governor(),
            handler.clone(),
        ));
        settle().await;

        bus.publish("in.topic", "t2", b"payload".to_vec())
            .await
            .unwrap();
        settle().await;

        assert!(bus.published("out.topic").is_empty());
        let failed = bus.published(topics::TASK_FAILED);
        assert_eq!(failed.len(), 1);
        let msg: TaskFailedMessage = serde_json::from_slice(&failed[0].payload).unwrap();
        assert_eq!(msg.task_id, "t2");
        assert_eq!(msg.service, "echo-service");
        assert!(msg.error_message.contains("boom"));
        // Acked anyway: single attempt, no redelivery-based retry.
        assert_eq!(bus.acked_offsets("in.topic", "echo-group"), vec![0]);
        worker.abort();
    }

    #[tokio::test]
    async fn memory_pressure_abandons_without_ack() {
        let bus = Arc::new(MemoryBus::new());
        let pressured = MemoryGovernor::new(Arc::new(FixedProbe(MemorySample {
            used: 90,
            limit: Some(100),
            total: 100,
        })));
        let handler = Arc::new(EchoStage {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let worker = tokio::spawn(run_stage(
            bus.clone() as Arc<dyn MessageBus>,
            pressured,
            handler.clone(),
        ));
        settle().await;

        bus.publish("in.topic", "t3", b"payload".to_vec())
            .await
            .unwrap();
        settle().await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert!(bus.published("out.topic").is_empty());
        assert!(bus.acked_offsets("in.topic", "echo-group").is_empty());
        worker.abort();
    }
}
