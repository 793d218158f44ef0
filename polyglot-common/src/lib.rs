//! # Polyglot Common Library
//!
//! Shared code for all polyglot pipeline services including:
//! - Task model and status state machine
//! - Inter-stage message types and topic names
//! - Message bus abstraction (trait + in-process broker)
//! - Memory-pressure admission control for consumers
//! - Generic stage consumer loop and failure notifier
//! - Configuration loading
//! - Common error types

pub mod bus;
pub mod config;
pub mod consumer;
pub mod error;
pub mod language;
pub mod memory;
pub mod messages;
pub mod task;
pub mod topics;

pub use error::{Error, Result};
