//! Recognition stage integration tests

use async_trait::async_trait;
use polyglot_common::consumer::StageHandler;
use polyglot_common::messages::{SpeechRecognitionCompletedMessage, TaskCreatedMessage};
use polyglot_common::{topics, Error};
use polyglot_speech::consumer::RecognitionStage;
use polyglot_speech::recognizer::{FileRecognition, SpeechRecognizer};
use std::path::Path;
use std::sync::Arc;

struct MockRecognizer {
    available: bool,
}

#[async_trait]
impl SpeechRecognizer for MockRecognizer {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn recognize_file(&self, audio_file: &Path, _language: &str) -> FileRecognition {
        let name = audio_file
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string();
        let success = !name.starts_with("broken");
        FileRecognition {
            audio_file_name: name.clone(),
            success,
            recognized_text: success.then(|| format!("transcript of {name}")),
            confidence: 0.92,
            error_message: (!success).then(|| "corrupt frame".to_string()),
            processing_time_ms: 3,
        }
    }
}

fn task_created(dir: &Path) -> Vec<u8> {
    serde_json::to_vec(&TaskCreatedMessage {
        task_id: "t1".to_string(),
        audio_directory_path: dir.display().to_string(),
        source_language: "zh-CN".to_string(),
        target_languages: "en,ja".to_string(),
        task_type: "AUDIO_TRANSLATION".to_string(),
        created_time: chrono::Utc::now(),
        priority: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn publishes_results_and_writes_sidecars() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("one.mp3"), b"x").unwrap();
    std::fs::write(dir.path().join("two.mp3"), b"x").unwrap();

    let stage = RecognitionStage::new(Arc::new(MockRecognizer { available: true }));
    let outbound = stage
        .process("t1", &task_created(dir.path()))
        .await
        .unwrap()
        .expect("recognition stage has a downstream topic");

    assert_eq!(outbound.topic, topics::SPEECH_RECOGNITION_COMPLETED);
    let message: SpeechRecognitionCompletedMessage =
        serde_json::from_slice(&outbound.payload).unwrap();
    assert_eq!(message.task_id, "t1");
    assert_eq!(message.target_languages, "en,ja");
    assert_eq!(message.recognition_results.len(), 2);

    // Sidecars were written before the message was assembled.
    for result in &message.recognition_results {
        let content = std::fs::read_to_string(&result.text_file_path).unwrap();
        assert_eq!(content, result.recognized_text);
        assert!(result.text_file_path.ends_with("_recognition.txt"));
    }
}

#[tokio::test]
async fn failed_files_are_dropped_from_the_message() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("good.mp3"), b"x").unwrap();
    std::fs::write(dir.path().join("broken.mp3"), b"x").unwrap();

    let stage = RecognitionStage::new(Arc::new(MockRecognizer { available: true }));
    let outbound = stage
        .process("t1", &task_created(dir.path()))
        .await
        .unwrap()
        .unwrap();

    let message: SpeechRecognitionCompletedMessage =
        serde_json::from_slice(&outbound.payload).unwrap();
    assert_eq!(message.recognition_results.len(), 1);
    assert_eq!(message.recognition_results[0].audio_file_name, "good.mp3");
}

#[tokio::test]
async fn batch_with_zero_successes_fails_the_stage() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken1.mp3"), b"x").unwrap();
    std::fs::write(dir.path().join("broken2.mp3"), b"x").unwrap();

    let stage = RecognitionStage::new(Arc::new(MockRecognizer { available: true }));
    let err = stage
        .process("t1", &task_created(dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Capability(_)));
    assert!(err.to_string().contains("all 2 files"));
}

#[tokio::test]
async fn unavailable_recognizer_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("one.mp3"), b"x").unwrap();

    let stage = RecognitionStage::new(Arc::new(MockRecognizer { available: false }));
    let err = stage
        .process("t1", &task_created(dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Capability(_)));

    // Fails fast: no sidecar was written.
    assert!(!dir.path().join("one_recognition.txt").exists());
}
