//! Speech service configuration

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Whisper wrapper script invoked per audio file.
    pub whisper_script_path: String,
    /// Whisper model name passed to the script.
    pub whisper_model: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            whisper_script_path: "./scripts/whisper_processor.py".to_string(),
            whisper_model: "base".to_string(),
        }
    }
}
