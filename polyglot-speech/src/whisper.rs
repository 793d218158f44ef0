//! Whisper recognition backend
//!
//! Invokes a Python wrapper script once per audio file and parses its JSON
//! stdout. The script owns model loading and any engine-side timeouts; this
//! side only reports what the subprocess returns.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::process::Command;
use tracing::{error, info};

use crate::config::SpeechConfig;
use crate::recognizer::{FileRecognition, SpeechRecognizer};

/// JSON contract of the wrapper script's stdout.
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    success: bool,
    text: Option<String>,
    confidence: Option<f64>,
    error: Option<String>,
}

pub struct WhisperRecognizer {
    script_path: PathBuf,
    model: String,
}

impl WhisperRecognizer {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            script_path: PathBuf::from(&config.whisper_script_path),
            model: config.whisper_model.clone(),
        }
    }

    fn failure(name: String, error: String, elapsed_ms: u64) -> FileRecognition {
        FileRecognition {
            audio_file_name: name,
            success: false,
            recognized_text: None,
            confidence: 0.0,
            error_message: Some(error),
            processing_time_ms: elapsed_ms,
        }
    }
}

#[async_trait]
impl SpeechRecognizer for WhisperRecognizer {
    async fn is_available(&self) -> bool {
        self.script_path.is_file()
    }

    async fn recognize_file(&self, audio_file: &Path, language: &str) -> FileRecognition {
        let started = Instant::now();
        let name = audio_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| audio_file.display().to_string());

        info!("recognizing audio file: {name}");
        let output = Command::new("python3")
            .arg(&self.script_path)
            .arg(audio_file)
            .arg("--language")
            .arg(language)
            .arg("--model")
            .arg(&self.model)
            .output()
            .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let output = match output {
            Ok(output) => output,
            Err(e) => {
                error!("failed to spawn whisper script: {e}");
                return Self::failure(name, format!("failed to run whisper: {e}"), elapsed_ms);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("whisper exited with {}: {stderr}", output.status);
            return Self::failure(
                name,
                format!("whisper failed ({}): {stderr}", output.status),
                elapsed_ms,
            );
        }

        match serde_json::from_slice::<WhisperOutput>(&output.stdout) {
            Ok(parsed) if parsed.success => FileRecognition {
                audio_file_name: name,
                success: true,
                recognized_text: parsed.text,
                confidence: parsed.confidence.unwrap_or(0.0),
                error_message: None,
                processing_time_ms: elapsed_ms,
            },
            Ok(parsed) => Self::failure(
                name,
                parsed
                    .error
                    .unwrap_or_else(|| "whisper reported failure".to_string()),
                elapsed_ms,
            ),
            Err(e) => Self::failure(name, format!("unparseable whisper output: {e}"), elapsed_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_when_script_missing() {
        let recognizer = WhisperRecognizer::new(&SpeechConfig {
            whisper_script_path: "/no/such/script.py".to_string(),
            whisper_model: "base".to_string(),
        });
        assert!(!recognizer.is_available().await);
    }

    #[test]
    fn parses_script_output_contract() {
        let ok: WhisperOutput =
            serde_json::from_str(r#"{"success": true, "text": "hi", "confidence": 0.8}"#).unwrap();
        assert!(ok.success);
        assert_eq!(ok.text.as_deref(), Some("hi"));

        let failed: WhisperOutput =
            serde_json::from_str(r#"{"success": false, "error": "no audio"}"#).unwrap();
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("no audio"));
    }
}
