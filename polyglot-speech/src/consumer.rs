//! Recognition stage consumer
//!
//! Consumes `task.created`, recognizes all audio files in the task's
//! directory, writes one `<name>_recognition.txt` sidecar per successful
//! file (before publishing: downstream stages may reference the paths),
//! and publishes `speech.recognition.completed` carrying the successful
//! per-file results.

use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use polyglot_common::consumer::{Outbound, StageHandler};
use polyglot_common::messages::{
    RecognitionResult, SpeechRecognitionCompletedMessage, TaskCreatedMessage,
};
use polyglot_common::{topics, Error, Result};

use crate::recognizer::{recognize_directory, SpeechRecognizer};

pub const SERVICE_NAME: &str = "speech-service";
pub const CONSUMER_GROUP: &str = "speech-service-group";

pub struct RecognitionStage {
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl RecognitionStage {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self { recognizer }
    }
}

/// Sidecar path for a recognized audio file: `<base>_recognition.txt` next
/// to the source audio.
fn text_file_path(audio_directory: &str, audio_file_name: &str) -> String {
    let base = audio_file_name
        .rsplit_once('.')
        .map(|(base, _)| base)
        .unwrap_or(audio_file_name);
    format!("{audio_directory}/{base}_recognition.txt")
}

#[async_trait]
impl StageHandler for RecognitionStage {
    fn topic(&self) -> &'static str {
        topics::TASK_CREATED
    }

    fn group(&self) -> &'static str {
        CONSUMER_GROUP
    }

    fn failure_service(&self) -> Option<&'static str> {
        Some(SERVICE_NAME)
    }

    async fn process(&self, key: &str, payload: &[u8]) -> Result<Option<Outbound>> {
        let message: TaskCreatedMessage = serde_json::from_slice(payload)?;
        info!(
            "starting speech recognition: taskId={key}, audioDirectory={}, sourceLanguage={}",
            message.audio_directory_path, message.source_language
        );

        if !self.recognizer.is_available().await {
            return Err(Error::Capability(
                "speech recognition model is not available".to_string(),
            ));
        }

        let batch = recognize_directory(
            self.recognizer.as_ref(),
            Path::new(&message.audio_directory_path),
            &message.source_language,
        )
        .await?;

        info!(
            "speech recognition finished: taskId={key}, totalFiles={}, success={}, failed={}",
            batch.total_files, batch.success_count, batch.failure_count
        );

        // A batch with zero successes fails the task here, not downstream.
        if batch.success_count == 0 {
            return Err(Error::Capability(format!(
                "speech recognition failed for all {} files",
                batch.total_files
            )));
        }

        let mut recognition_results = Vec::with_capacity(batch.success_count);
        for result in batch.results.into_iter().filter(|r| r.success) {
            let recognized_text = result.recognized_text.unwrap_or_default();
            let path = text_file_path(&message.audio_directory_path, &result.audio_file_name);
            // Sidecar must exist before the downstream message references it
            tokio::fs::write(&path, &recognized_text).await?;
            recognition_results.push(RecognitionResult {
                audio_file_name: result.audio_file_name,
                recognized_text,
                confidence: result.confidence,
                text_file_path: path,
            });
        }

        let completed = SpeechRecognitionCompletedMessage {
            task_id: message.task_id,
            audio_directory_path: message.audio_directory_path,
            source_language: message.source_language,
            target_languages: message.target_languages,
            recognition_results,
            completed_time: Utc::now(),
        };
        Ok(Some(Outbound::json(
            topics::SPEECH_RECOGNITION_COMPLETED,
            &completed,
        )?))
    }
}
