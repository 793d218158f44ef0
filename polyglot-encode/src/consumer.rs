//! Encoding stage consumer
//!
//! Consumes `translation.completed`, concatenates each language's
//! translations across the task's files (in file-name order), compresses
//! the result into one stored bundle, and publishes `encoding.completed`
//! with the size metrics the task finalizer records.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use polyglot_common::consumer::{Outbound, StageHandler};
use polyglot_common::messages::{EncodingCompletedMessage, TranslationCompletedMessage};
use polyglot_common::{topics, Error, Result};

use crate::encoder::TextEncoder;
use crate::store::EncodingStore;

pub const SERVICE_NAME: &str = "encoding-service";
pub const CONSUMER_GROUP: &str = "encoding-service-group";

pub struct EncodingStage {
    encoder: Arc<dyn TextEncoder>,
    store: Arc<dyn EncodingStore>,
}

impl EncodingStage {
    pub fn new(encoder: Arc<dyn TextEncoder>, store: Arc<dyn EncodingStore>) -> Self {
        Self { encoder, store }
    }
}

/// One text block per language: every file's translation in file-name
/// order, blank-line separated.
fn aggregate_by_language(message: &TranslationCompletedMessage) -> BTreeMap<String, String> {
    let mut results: Vec<_> = message.translation_results.iter().collect();
    results.sort_by(|a, b| a.audio_file_name.cmp(&b.audio_file_name));

    let mut texts: BTreeMap<String, String> = BTreeMap::new();
    for result in results {
        for (language, translation) in &result.translations {
            let block = texts.entry(language.clone()).or_default();
            if !block.is_empty() {
                block.push_str("\n\n");
            }
            block.push_str(translation);
        }
    }
    texts
}

#[async_trait]
impl StageHandler for EncodingStage {
    fn topic(&self) -> &'static str {
        topics::TRANSLATION_COMPLETED
    }

    fn group(&self) -> &'static str {
        CONSUMER_GROUP
    }

    fn failure_service(&self) -> Option<&'static str> {
        Some(SERVICE_NAME)
    }

    async fn process(&self, key: &str, payload: &[u8]) -> Result<Option<Outbound>> {
        let message: TranslationCompletedMessage = serde_json::from_slice(payload)?;
        info!(
            "starting encoding: taskId={key}, files={}",
            message.translation_results.len()
        );

        if message.translation_results.is_empty() {
            return Err(Error::Capability(
                "no translation results to encode".to_string(),
            ));
        }

        let texts = aggregate_by_language(&message);
        let bundle = self.encoder.encode(&texts)?;
        info!(
            "encoded task: taskId={key}, languages={}, originalSize={}, compressedSize={}, ratio={:.3}",
            texts.len(),
            bundle.original_size,
            bundle.compressed_size,
            bundle.compression_ratio
        );

        let completed = EncodingCompletedMessage {
            task_id: message.task_id.clone(),
            encoding_id: bundle.encoding_id.clone(),
            encoded_files: message.translation_results.len() as i64,
            original_size: bundle.original_size,
            compressed_size: bundle.compressed_size,
            compression_ratio: bundle.compression_ratio,
            completed_time: Utc::now(),
        };
        // Store before publish: the finalizer may look the bundle up as
        // soon as it sees the message.
        self.store.put(&message.task_id, bundle).await?;

        Ok(Some(Outbound::json(topics::ENCODING_COMPLETED, &completed)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::DeflateEncoder;
    use crate::store::{lookup_translation, InMemoryEncodingStore};
    use polyglot_common::messages::TranslationResult;
    use std::collections::HashMap;

    fn translation(name: &str, pairs: &[(&str, &str)]) -> TranslationResult {
        TranslationResult {
            audio_file_name: name.to_string(),
            original_text: "source".to_string(),
            translations: pairs
                .iter()
                .map(|(l, t)| (l.to_string(), t.to_string()))
                .collect::<HashMap<_, _>>(),
            translation_file_path: format!("/audio/{name}.json"),
        }
    }

    fn completed(results: Vec<TranslationResult>) -> Vec<u8> {
        serde_json::to_vec(&TranslationCompletedMessage {
            task_id: "t1".to_string(),
            audio_directory_path: "/audio/t1".to_string(),
            translation_results: results,
            completed_time: Utc::now(),
        })
        .unwrap()
    }

    #[test]
    fn aggregation_orders_by_file_name() {
        let message = TranslationCompletedMessage {
            task_id: "t1".to_string(),
            audio_directory_path: "/audio/t1".to_string(),
            translation_results: vec![
                translation("b.mp3", &[("en", "second")]),
                translation("a.mp3", &[("en", "first"), ("ja", "一")]),
            ],
            completed_time: Utc::now(),
        };
        let texts = aggregate_by_language(&message);
        assert_eq!(texts["en"], "first\n\nsecond");
        assert_eq!(texts["ja"], "一");
    }

    #[tokio::test]
    async fn encodes_stores_and_publishes_metrics() {
        let encoder = Arc::new(DeflateEncoder::default());
        let store = Arc::new(InMemoryEncodingStore::new());
        let stage = EncodingStage::new(encoder.clone(), store.clone());

        let payload = completed(vec![
            translation("a.mp3", &[("en", "hello"), ("ja", "こんにちは")]),
            translation("b.mp3", &[("en", "world"), ("ja", "世界")]),
        ]);
        let outbound = stage.process("t1", &payload).await.unwrap().unwrap();

        assert_eq!(outbound.topic, topics::ENCODING_COMPLETED);
        let message: EncodingCompletedMessage =
            serde_json::from_slice(&outbound.payload).unwrap();
        assert_eq!(message.task_id, "t1");
        assert_eq!(message.encoded_files, 2);
        assert!(message.original_size > 0);
        assert!(message.compressed_size > 0);

        let text = lookup_translation(
            store.as_ref(),
            encoder.as_ref(),
            &message.encoding_id,
            "en",
        )
        .await
        .unwrap();
        assert_eq!(text.as_deref(), Some("hello\n\nworld"));
    }

    #[tokio::test]
    async fn empty_translations_fail_the_stage() {
        let stage = EncodingStage::new(
            Arc::new(DeflateEncoder::default()),
            Arc::new(InMemoryEncodingStore::new()),
        );
        let err = stage.process("t1", &completed(vec![])).await.unwrap_err();
        assert!(matches!(err, Error::Capability(_)));
    }
}
