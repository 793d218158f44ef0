//! Message bus abstraction
//!
//! The pipeline treats the bus as an external collaborator behind the
//! [`MessageBus`] trait. Semantics assumed by every consumer:
//!
//! - named topics, durable and partitioned by message key
//! - at-least-once delivery: a message may arrive more than once
//! - messages with the same key are totally ordered within a topic;
//!   there is no ordering guarantee across topics
//! - a delivery is consumed only once [`Delivery::ack`] is called; an
//!   abandoned (un-acked) delivery may be redelivered by the broker
//!
//! [`memory::MemoryBus`] is the in-process implementation used by tests and
//! single-process deployments.

pub mod memory;

pub use memory::MemoryBus;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::Result;

/// Publish/subscribe transport with named topics and keyed partitioning.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish one message to `topic`, partitioned by `key`.
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()>;

    /// Join `group` on `topic` and return a stream of deliveries. Consumers
    /// in the same group split the topic's key space between them.
    async fn subscribe(&self, topic: &str, group: &str) -> Result<Subscription>;
}

/// Serialize `message` as JSON and publish it.
pub async fn publish_json<T: Serialize + Sync>(
    bus: &dyn MessageBus,
    topic: &str,
    key: &str,
    message: &T,
) -> Result<()> {
    let payload = serde_json::to_vec(message)?;
    bus.publish(topic, key, payload).await
}

/// One message pulled from a subscription.
///
/// The delivery is not considered consumed until [`ack`](Self::ack) is
/// called; dropping it un-acked leaves the message eligible for redelivery.
#[derive(Debug)]
pub struct Delivery {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
    pub offset: u64,
    acked: Arc<AtomicBool>,
}

impl Delivery {
    pub(crate) fn new(
        topic: String,
        key: String,
        payload: Vec<u8>,
        offset: u64,
        acked: Arc<AtomicBool>,
    ) -> Self {
        Self {
            topic,
            key,
            payload,
            offset,
            acked,
        }
    }

    /// Mark this delivery consumed.
    pub fn ack(&self) {
        self.acked.store(true, Ordering::SeqCst);
    }

    pub fn is_acked(&self) -> bool {
        self.acked.load(Ordering::SeqCst)
    }

    /// Deserialize the JSON payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Consumer-group membership on one topic.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Subscription {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Delivery>) -> Self {
        Self { rx }
    }

    /// Next delivery, or `None` once the bus has shut down.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}
