//! polyglot-speech - Speech recognition stage
//!
//! First pipeline stage: consumes `task.created`, recognizes every audio
//! file in the task's directory through the [`recognizer::SpeechRecognizer`]
//! capability, writes per-file sidecar text files, and publishes
//! `speech.recognition.completed`.

pub mod config;
pub mod consumer;
pub mod recognizer;
pub mod whisper;
