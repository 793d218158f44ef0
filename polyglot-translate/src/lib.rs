//! polyglot-translate - Translation stage
//!
//! Second pipeline stage: consumes `speech.recognition.completed`,
//! translates every recognized text into every target language through the
//! [`translator::Translator`] capability, writes per-file JSON sidecars,
//! and publishes `translation.completed`.

pub mod config;
pub mod consumer;
pub mod deepseek;
pub mod translator;
