//! Translation capability interface
//!
//! The translation model is an opaque collaborator behind this trait.
//! Backends translate one text at a time; the batch helper fans a set of
//! recognized texts out across all target languages and collects
//! per-file/per-language outcomes without failing the whole batch on a
//! single bad translation.

use async_trait::async_trait;
use std::collections::HashMap;

use polyglot_common::Result;

/// Outcome for one source text translated into one target language.
#[derive(Debug, Clone)]
pub struct TranslationOutcome {
    pub success: bool,
    pub translated_text: Option<String>,
    pub error_message: Option<String>,
}

/// Outcome for one source file across all target languages.
#[derive(Debug, Clone)]
pub struct FileTranslation {
    pub source_text: String,
    /// Target language code -> outcome.
    pub translations: HashMap<String, TranslationOutcome>,
}

impl FileTranslation {
    /// True when at least one target language translated successfully.
    pub fn any_success(&self) -> bool {
        self.translations.values().any(|t| t.success)
    }

    /// Successful translations only, as language -> text.
    pub fn successful(&self) -> HashMap<String, String> {
        self.translations
            .iter()
            .filter_map(|(lang, outcome)| {
                outcome
                    .translated_text
                    .as_ref()
                    .filter(|_| outcome.success)
                    .map(|text| (lang.clone(), text.clone()))
            })
            .collect()
    }
}

/// Translation backend.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Availability probe consulted before batch work begins.
    async fn is_available(&self) -> bool;

    /// Translate one text. Errors are backend failures (network, API);
    /// they are captured per-language by the batch helper.
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

/// Translate every text into every target language, one blocking call per
/// (file, language) pair. Per-pair failures are recorded, not propagated.
pub async fn translate_batch(
    translator: &dyn Translator,
    texts: &HashMap<String, String>,
    source: &str,
    targets: &[String],
) -> HashMap<String, FileTranslation> {
    let mut out = HashMap::with_capacity(texts.len());
    for (file_name, text) in texts {
        let mut translations = HashMap::with_capacity(targets.len());
        for target in targets {
            let outcome = match translator.translate(text, source, target).await {
                Ok(translated) => TranslationOutcome {
                    success: true,
                    translated_text: Some(translated),
                    error_message: None,
                },
                Err(e) => TranslationOutcome {
                    success: false,
                    translated_text: None,
                    error_message: Some(e.to_string()),
                },
            };
            translations.insert(target.clone(), outcome);
        }
        out.insert(
            file_name.clone(),
            FileTranslation {
                source_text: text.clone(),
                translations,
            },
        );
    }
    out
}
