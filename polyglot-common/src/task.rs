//! Task model and status state machine
//!
//! One `TranslationTask` row exists per pipeline run. The task service is
//! the only component that mutates a row; stage workers request mutation
//! through its update operation. Status transitions follow a fixed graph:
//! only `restart` moves a task backward (terminal failure -> CREATED).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Task lifecycle status.
///
/// Wire and database representation is the SCREAMING_SNAKE name
/// (`SPEECH_RECOGNITION` etc.), matching the strings stage workers and
/// external callers see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Created,
    Processing,
    SpeechRecognition,
    Translation,
    Encoding,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "CREATED",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::SpeechRecognition => "SPEECH_RECOGNITION",
            TaskStatus::Translation => "TRANSLATION",
            TaskStatus::Encoding => "ENCODING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    /// True for states from which no further stage processing occurs
    /// without an explicit restart.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// True while the task is anywhere between creation and a terminal state.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Cancellation succeeds only from non-terminal states.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Restart succeeds only from FAILED or CANCELLED. COMPLETED tasks
    /// cannot be restarted.
    pub fn can_restart(&self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::Cancelled)
    }

    /// Edge check for the status transition graph.
    ///
    /// - CREATED -> PROCESSING on successful initial publish
    /// - CREATED -> FAILED on publish failure (rollback path)
    /// - active states may advance through the stage markers, FAILED,
    ///   CANCELLED, or COMPLETED (final stage only)
    /// - FAILED/CANCELLED -> CREATED is the restart edge, the only
    ///   backward transition
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Created, Processing) | (Created, Failed) | (Created, Cancelled) => true,
            (Processing, SpeechRecognition)
            | (Processing, Translation)
            | (Processing, Encoding)
            | (Processing, Completed)
            | (Processing, Failed)
            | (Processing, Cancelled) => true,
            (SpeechRecognition, Translation)
            | (SpeechRecognition, Encoding)
            | (SpeechRecognition, Completed)
            | (SpeechRecognition, Failed)
            | (SpeechRecognition, Cancelled) => true,
            (Translation, Encoding)
            | (Translation, Completed)
            | (Translation, Failed)
            | (Translation, Cancelled) => true,
            (Encoding, Completed) | (Encoding, Failed) | (Encoding, Cancelled) => true,
            // Restart: the only backward edge
            (Failed, Created) | (Cancelled, Created) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CREATED" => Ok(TaskStatus::Created),
            "PROCESSING" => Ok(TaskStatus::Processing),
            "SPEECH_RECOGNITION" => Ok(TaskStatus::SpeechRecognition),
            "TRANSLATION" => Ok(TaskStatus::Translation),
            "ENCODING" => Ok(TaskStatus::Encoding),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            "CANCELLED" => Ok(TaskStatus::Cancelled),
            other => Err(Error::InvalidInput(format!("unknown task status: {other}"))),
        }
    }
}

/// Task type constants (wire strings).
pub mod task_type {
    pub const AUDIO_TRANSLATION: &str = "AUDIO_TRANSLATION";
    pub const TEXT_TRANSLATION: &str = "TEXT_TRANSLATION";
    pub const BATCH_TRANSLATION: &str = "BATCH_TRANSLATION";
}

/// One pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationTask {
    /// Database row id (assigned on insert).
    pub id: i64,
    /// Opaque unique task id, assigned at creation, immutable. Used as the
    /// message bus partition key for every message belonging to this task.
    pub task_id: String,
    pub task_type: String,
    pub audio_directory_path: String,
    pub source_language: String,
    /// Target language codes, comma-joined (transport form).
    pub target_languages: String,
    pub status: TaskStatus,
    pub total_files: i64,
    pub processed_files: i64,
    pub success_files: i64,
    pub failed_files: i64,
    /// Derived: processed / total * 100. Monotonically non-decreasing while
    /// the task is active.
    pub progress_percent: f64,
    pub error_message: Option<String>,
    pub result_file_path: Option<String>,
    /// Lower value = higher priority. Advisory only; the bus does not
    /// enforce it.
    pub priority: i64,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub complete_time: Option<DateTime<Utc>>,
}

impl TranslationTask {
    /// Target languages split out of the comma-joined transport form.
    pub fn target_language_list(&self) -> Vec<String> {
        split_languages(&self.target_languages)
    }
}

/// Split a comma-joined language list, dropping empty segments.
pub fn split_languages(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join language codes into the comma-joined transport form.
pub fn join_languages(codes: &[String]) -> String {
    codes.join(",")
}

/// Percentage progress from file counters.
pub fn progress_percent(processed: i64, total: i64) -> f64 {
    if total <= 0 {
        0.0
    } else {
        (processed as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            TaskStatus::Created,
            TaskStatus::Processing,
            TaskStatus::SpeechRecognition,
            TaskStatus::Translation,
            TaskStatus::Encoding,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("RUNNING".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn cancel_only_from_non_terminal_states() {
        assert!(TaskStatus::Created.can_cancel());
        assert!(TaskStatus::Processing.can_cancel());
        assert!(TaskStatus::SpeechRecognition.can_cancel());
        assert!(TaskStatus::Translation.can_cancel());
        assert!(TaskStatus::Encoding.can_cancel());
        assert!(!TaskStatus::Completed.can_cancel());
        assert!(!TaskStatus::Failed.can_cancel());
        assert!(!TaskStatus::Cancelled.can_cancel());
    }

    #[test]
    fn restart_only_from_failed_or_cancelled() {
        assert!(TaskStatus::Failed.can_restart());
        assert!(TaskStatus::Cancelled.can_restart());
        assert!(!TaskStatus::Completed.can_restart());
        assert!(!TaskStatus::Processing.can_restart());
        assert!(!TaskStatus::Created.can_restart());
    }

    #[test]
    fn no_direct_created_to_completed_edge() {
        assert!(!TaskStatus::Created.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Created.can_transition_to(TaskStatus::Processing));
        assert!(TaskStatus::Created.can_transition_to(TaskStatus::Failed));
    }

    #[test]
    fn restart_is_the_only_backward_edge() {
        assert!(TaskStatus::Failed.can_transition_to(TaskStatus::Created));
        assert!(TaskStatus::Cancelled.can_transition_to(TaskStatus::Created));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Created));
        assert!(!TaskStatus::Processing.can_transition_to(TaskStatus::Created));
        assert!(!TaskStatus::Translation.can_transition_to(TaskStatus::SpeechRecognition));
    }

    #[test]
    fn language_list_round_trip() {
        let list = split_languages("en, ja,,ko");
        assert_eq!(list, vec!["en", "ja", "ko"]);
        assert_eq!(join_languages(&list), "en,ja,ko");
    }

    #[test]
    fn progress_handles_zero_total() {
        assert_eq!(progress_percent(0, 0), 0.0);
        assert_eq!(progress_percent(1, 4), 25.0);
        assert_eq!(progress_percent(3, 3), 100.0);
    }
}
