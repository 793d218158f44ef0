//! Translate service configuration

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Base URL of the DeepSeek-compatible API.
    pub api_url: String,
    /// API key; falls back to the DEEPSEEK_API_KEY environment variable
    /// when empty.
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.deepseek.com".to_string(),
            api_key: String::new(),
            model: "deepseek-chat".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl TranslateConfig {
    /// Effective API key: config value first, environment second.
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        std::env::var("DEEPSEEK_API_KEY").ok().filter(|k| !k.is_empty())
    }
}
