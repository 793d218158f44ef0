//! Inter-stage message types
//!
//! Immutable value records exchanged over the message bus. Each carries the
//! task id (also used as the partition key) plus everything the next stage
//! needs to operate without re-querying the task store: context propagates
//! through the message chain, not through shared state.
//!
//! Wire format is JSON with camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Published by the task service when a task is created (or restarted);
/// consumed by the speech recognition stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreatedMessage {
    pub task_id: String,
    pub audio_directory_path: String,
    pub source_language: String,
    /// Target language codes, comma-joined.
    pub target_languages: String,
    pub task_type: String,
    pub created_time: DateTime<Utc>,
    /// 1-10, lower = higher priority. Advisory only.
    #[serde(default = "default_priority")]
    pub priority: i64,
}

fn default_priority() -> i64 {
    5
}

/// Per-file outcome of speech recognition, including the path of the
/// sidecar text file written next to the audio source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub audio_file_name: String,
    pub recognized_text: String,
    pub confidence: f64,
    pub text_file_path: String,
}

/// Published by the speech stage on success; consumed by the translation
/// stage. Carries only the files that recognized successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRecognitionCompletedMessage {
    pub task_id: String,
    pub audio_directory_path: String,
    pub source_language: String,
    pub target_languages: String,
    pub recognition_results: Vec<RecognitionResult>,
    pub completed_time: DateTime<Utc>,
}

/// Per-file translation outcome: original text plus one translation per
/// target language, and the path of the sidecar JSON written next to the
/// audio source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub audio_file_name: String,
    pub original_text: String,
    /// Target language code -> translated text. Only successful
    /// translations appear here.
    pub translations: HashMap<String, String>,
    pub translation_file_path: String,
}

/// Published by the translation stage on success; consumed by the encoding
/// stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationCompletedMessage {
    pub task_id: String,
    pub audio_directory_path: String,
    pub translation_results: Vec<TranslationResult>,
    pub completed_time: DateTime<Utc>,
}

/// Published by the encoding stage on success; consumed by the task service
/// to finalize the task record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingCompletedMessage {
    pub task_id: String,
    /// Id of the stored encoded bundle.
    pub encoding_id: String,
    /// Files that made it through the whole pipeline.
    pub encoded_files: i64,
    pub original_size: i64,
    pub compressed_size: i64,
    pub compression_ratio: f64,
    pub completed_time: DateTime<Utc>,
}

/// Published to the shared failure topic by any stage; consumed by the task
/// service failure handler, which marks the task FAILED.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFailedMessage {
    pub task_id: String,
    /// Originating service name, e.g. "speech-service".
    pub service: String,
    pub error_message: String,
    pub failed_time: DateTime<Utc>,
}
