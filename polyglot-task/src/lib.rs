//! polyglot-task - Task service
//!
//! System entry service: owns the task store (sole source of truth for
//! task status and progress), creates tasks and publishes the initiating
//! message, implements cancel and restart, and finalizes tasks from the
//! `encoding.completed` and `task.failed` topics.

pub mod config;
pub mod consumers;
pub mod service;
pub mod store;
