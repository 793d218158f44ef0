//! Speech recognition capability interface
//!
//! The recognition engine is an opaque collaborator behind this trait:
//! concrete backends (Whisper today, other ASR models tomorrow) plug in
//! without touching the stage consumer. The availability probe is checked
//! before any batch work begins.

use async_trait::async_trait;
use std::path::Path;

use polyglot_common::{Error, Result};

/// Outcome of recognizing one audio file.
#[derive(Debug, Clone)]
pub struct FileRecognition {
    pub audio_file_name: String,
    pub success: bool,
    /// Present when `success`.
    pub recognized_text: Option<String>,
    pub confidence: f64,
    pub error_message: Option<String>,
    pub processing_time_ms: u64,
}

/// Outcome of recognizing a directory of audio files.
#[derive(Debug, Clone)]
pub struct BatchRecognition {
    pub results: Vec<FileRecognition>,
    pub total_files: usize,
    pub success_count: usize,
    pub failure_count: usize,
}

/// Speech recognition backend.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Availability probe consulted before batch work begins.
    async fn is_available(&self) -> bool;

    /// Recognize a single audio file. Per-file failures are reported in
    /// the result, not as errors.
    async fn recognize_file(&self, audio_file: &Path, language: &str) -> FileRecognition;
}

/// Recognize every `.mp3` file in `dir`, one blocking call per file.
///
/// Fails (as opposed to reporting per-file failures) only when the
/// directory itself cannot be read or holds no audio files.
pub async fn recognize_directory(
    recognizer: &dyn SpeechRecognizer,
    dir: &Path,
    language: &str,
) -> Result<BatchRecognition> {
    let mut audio_files: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("mp3"))
                .unwrap_or(false)
        })
        .collect();
    audio_files.sort();

    if audio_files.is_empty() {
        return Err(Error::Capability(format!(
            "no audio files to recognize in {}",
            dir.display()
        )));
    }

    let mut results = Vec::with_capacity(audio_files.len());
    for audio_file in &audio_files {
        results.push(recognizer.recognize_file(audio_file, language).await);
    }

    let success_count = results.iter().filter(|r| r.success).count();
    let total_files = results.len();
    Ok(BatchRecognition {
        success_count,
        failure_count: total_files - success_count,
        total_files,
        results,
    })
}
