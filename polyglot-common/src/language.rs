//! Supported translation languages

use serde::{Deserialize, Serialize};

/// Languages the pipeline accepts as source or target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    ChineseSimplified,
    ChineseTraditional,
    English,
    Japanese,
    /// Source-side only: let the recognizer detect the language.
    AutoDetect,
}

impl Language {
    /// Canonical language code used on the wire and in file names.
    pub fn code(&self) -> &'static str {
        match self {
            Language::ChineseSimplified => "zh-CN",
            Language::ChineseTraditional => "zh-TW",
            Language::English => "en",
            Language::Japanese => "ja",
            Language::AutoDetect => "auto",
        }
    }

    /// ISO 639 short code accepted as an alias.
    pub fn iso639(&self) -> &'static str {
        match self {
            Language::ChineseSimplified => "zh",
            Language::ChineseTraditional => "zh-tw",
            Language::English => "en",
            Language::Japanese => "ja",
            Language::AutoDetect => "auto",
        }
    }

    pub fn english_name(&self) -> &'static str {
        match self {
            Language::ChineseSimplified => "Chinese (Simplified)",
            Language::ChineseTraditional => "Chinese (Traditional)",
            Language::English => "English",
            Language::Japanese => "Japanese",
            Language::AutoDetect => "Auto Detect",
        }
    }

    /// Look up a language by canonical code or ISO 639 alias
    /// (case-insensitive). `None` input means auto-detect.
    pub fn from_code(code: Option<&str>) -> Option<Language> {
        let code = match code {
            None => return Some(Language::AutoDetect),
            Some(c) => c,
        };
        [
            Language::ChineseSimplified,
            Language::ChineseTraditional,
            Language::English,
            Language::Japanese,
            Language::AutoDetect,
        ]
        .into_iter()
        .find(|lang| {
            lang.code().eq_ignore_ascii_case(code) || lang.iso639().eq_ignore_ascii_case(code)
        })
    }

    /// True if `code` names a supported language.
    pub fn is_supported(code: &str) -> bool {
        Language::from_code(Some(code)).is_some()
    }
}
