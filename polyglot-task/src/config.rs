//! Task service configuration

use serde::Deserialize;

/// Configuration for the task service, loaded via
/// `polyglot_common::config::load_config("polyglot-task")`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Root folder containing one subdirectory of audio files per task.
    pub audio_source_path: String,
    /// SQLite database file for task records.
    pub database_path: String,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            audio_source_path: "./audio-source".to_string(),
            database_path: "./polyglot.db".to_string(),
        }
    }
}
