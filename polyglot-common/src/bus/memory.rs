//! In-process message bus
//!
//! Backs single-process deployments and every test. Keeps the published log
//! per topic so tests can inspect traffic, tracks per-group ack flags, and
//! can redeliver a logged record to exercise at-least-once behavior.
//!
//! Group members are assigned messages by key hash, so all messages for one
//! key land on the same member in publish order. Subscriptions do not replay
//! history: a group only sees messages published after it joined.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

use super::{Delivery, MessageBus, Subscription};
use crate::{Error, Result};

/// One record retained in a topic's published log.
#[derive(Debug, Clone)]
pub struct PublishedRecord {
    pub offset: u64,
    pub key: String,
    pub payload: Vec<u8>,
}

struct GroupState {
    members: Vec<mpsc::UnboundedSender<Delivery>>,
    /// Ack flag per delivered record offset, shared with the `Delivery`.
    acks: Vec<(u64, Arc<AtomicBool>)>,
}

#[derive(Default)]
struct TopicState {
    next_offset: u64,
    log: Vec<PublishedRecord>,
    groups: HashMap<String, GroupState>,
}

#[derive(Default)]
struct BusState {
    topics: HashMap<String, TopicState>,
}

/// In-process broker implementing [`MessageBus`].
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<Mutex<BusState>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records published to `topic`, in publish order.
    pub fn published(&self, topic: &str) -> Vec<PublishedRecord> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state
            .topics
            .get(topic)
            .map(|t| t.log.clone())
            .unwrap_or_default()
    }

    /// Offsets `group` has acknowledged on `topic`.
    pub fn acked_offsets(&self, topic: &str, group: &str) -> Vec<u64> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state
            .topics
            .get(topic)
            .and_then(|t| t.groups.get(group))
            .map(|g| {
                g.acks
                    .iter()
                    .filter(|(_, acked)| acked.load(Ordering::SeqCst))
                    .map(|(offset, _)| *offset)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Redeliver a logged record to every group on the topic, as a broker
    /// would after an un-acked pull. Used to exercise duplicate-delivery
    /// behavior.
    pub fn redeliver(&self, topic: &str, offset: u64) -> Result<()> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let topic_state = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| Error::Bus(format!("unknown topic: {topic}")))?;
        let record = topic_state
            .log
            .iter()
            .find(|r| r.offset == offset)
            .cloned()
            .ok_or_else(|| Error::Bus(format!("no record at offset {offset} on {topic}")))?;
        for group in topic_state.groups.values_mut() {
            deliver_to_group(group, topic, &record);
        }
        Ok(())
    }
}

fn member_for_key(key: &str, members: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % members
}

fn deliver_to_group(group: &mut GroupState, topic: &str, record: &PublishedRecord) {
    if group.members.is_empty() {
        return;
    }
    let member = member_for_key(&record.key, group.members.len());
    let acked = Arc::new(AtomicBool::new(false));
    let delivery = Delivery::new(
        topic.to_string(),
        record.key.clone(),
        record.payload.clone(),
        record.offset,
        acked.clone(),
    );
    if group.members[member].send(delivery).is_ok() {
        group.acks.push((record.offset, acked));
    } else {
        debug!("bus: dropped delivery to departed group member on {topic}");
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let topic_state = state.topics.entry(topic.to_string()).or_default();
        let record = PublishedRecord {
            offset: topic_state.next_offset,
            key: key.to_string(),
            payload,
        };
        topic_state.next_offset += 1;
        topic_state.log.push(record.clone());
        for group in topic_state.groups.values_mut() {
            deliver_to_group(group, topic, &record);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str, group: &str) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let topic_state = state.topics.entry(topic.to_string()).or_default();
        let group_state = topic_state
            .groups
            .entry(group.to_string())
            .or_insert_with(|| GroupState {
                members: Vec::new(),
                acks: Vec::new(),
            });
        group_state.members.push(tx);
        Ok(Subscription::new(rx))
    }
}
