//! polyglot-encode - Result encoding stage
//!
//! Final pipeline stage: aggregates the per-file translations of a task
//! into one text block per language, compresses the block, stores the
//! encoded bundle, and publishes `encoding.completed` for the task
//! service finalizer.

pub mod config;
pub mod consumer;
pub mod encoder;
pub mod store;
