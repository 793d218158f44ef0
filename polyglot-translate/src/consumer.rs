//! Translation stage consumer
//!
//! Consumes `speech.recognition.completed`, translates every non-empty
//! recognized text into every target language, writes one
//! `<name>_translations.json` sidecar per file (before publishing), and
//! publishes `translation.completed`. Files whose translation failed for
//! every target are skipped with a warning; a single bad file does not
//! fail the task.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use polyglot_common::consumer::{Outbound, StageHandler};
use polyglot_common::messages::{
    SpeechRecognitionCompletedMessage, TranslationCompletedMessage, TranslationResult,
};
use polyglot_common::task::split_languages;
use polyglot_common::{topics, Error, Result};

use crate::translator::{translate_batch, Translator};

pub const SERVICE_NAME: &str = "translate-service";
pub const CONSUMER_GROUP: &str = "translate-service-group";

pub struct TranslationStage {
    translator: Arc<dyn Translator>,
}

impl TranslationStage {
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        Self { translator }
    }
}

/// Sidecar document written next to the audio source for each translated
/// file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslationSidecar<'a> {
    audio_file_name: &'a str,
    original_text: &'a str,
    source_language: &'a str,
    translations: &'a HashMap<String, String>,
    translation_time: chrono::DateTime<Utc>,
}

fn translation_file_path(audio_directory: &str, audio_file_name: &str) -> String {
    let base = audio_file_name
        .rsplit_once('.')
        .map(|(base, _)| base)
        .unwrap_or(audio_file_name);
    format!("{audio_directory}/{base}_translations.json")
}

#[async_trait]
impl StageHandler for TranslationStage {
    fn topic(&self) -> &'static str {
        topics::SPEECH_RECOGNITION_COMPLETED
    }

    fn group(&self) -> &'static str {
        CONSUMER_GROUP
    }

    fn failure_service(&self) -> Option<&'static str> {
        Some(SERVICE_NAME)
    }

    async fn process(&self, key: &str, payload: &[u8]) -> Result<Option<Outbound>> {
        let message: SpeechRecognitionCompletedMessage = serde_json::from_slice(payload)?;
        let targets = split_languages(&message.target_languages);
        info!(
            "starting translation: taskId={key}, sourceLanguage={}, targets={:?}",
            message.source_language, targets
        );

        if !self.translator.is_available().await {
            return Err(Error::Capability(
                "translation service is not available, check API configuration".to_string(),
            ));
        }

        // Only non-empty recognized texts are translatable.
        let source_texts: HashMap<String, String> = message
            .recognition_results
            .iter()
            .filter(|r| !r.recognized_text.trim().is_empty())
            .map(|r| (r.audio_file_name.clone(), r.recognized_text.clone()))
            .collect();
        if source_texts.is_empty() {
            return Err(Error::Capability(
                "no non-empty recognition results to translate".to_string(),
            ));
        }

        let batch = translate_batch(
            self.translator.as_ref(),
            &source_texts,
            &message.source_language,
            &targets,
        )
        .await;

        let mut translation_results = Vec::with_capacity(batch.len());
        for (audio_file_name, file) in &batch {
            if !file.any_success() {
                warn!("skipping file with no successful translation: {audio_file_name}");
                continue;
            }
            let translations = file.successful();
            let path = translation_file_path(&message.audio_directory_path, audio_file_name);
            let sidecar = TranslationSidecar {
                audio_file_name,
                original_text: &file.source_text,
                source_language: &message.source_language,
                translations: &translations,
                translation_time: Utc::now(),
            };
            // Sidecar must exist before the downstream message references it
            tokio::fs::write(&path, serde_json::to_vec_pretty(&sidecar)?).await?;

            translation_results.push(TranslationResult {
                audio_file_name: audio_file_name.clone(),
                original_text: file.source_text.clone(),
                translations,
                translation_file_path: path,
            });
        }
        // Stable output order regardless of map iteration
        translation_results.sort_by(|a, b| a.audio_file_name.cmp(&b.audio_file_name));

        info!(
            "translation finished: taskId={key}, totalFiles={}, translated={}",
            source_texts.len(),
            translation_results.len()
        );

        let completed = TranslationCompletedMessage {
            task_id: message.task_id,
            audio_directory_path: message.audio_directory_path,
            translation_results,
            completed_time: Utc::now(),
        };
        Ok(Some(Outbound::json(topics::TRANSLATION_COMPLETED, &completed)?))
    }
}
