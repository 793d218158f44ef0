//! DeepSeek translation backend
//!
//! Chat-completions client: one POST per (text, target language) with a
//! translation prompt, bearer auth, and the timeout from config. The model
//! side owns generation behavior; this side only shapes the prompt and
//! unwraps the first choice.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use polyglot_common::language::Language;
use polyglot_common::{Error, Result};

use crate::config::TranslateConfig;
use crate::translator::Translator;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    stream: bool,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    error: Option<ApiError>,
}

pub struct DeepSeekTranslator {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl DeepSeekTranslator {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Capability(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.resolved_api_key(),
            model: config.model.clone(),
        })
    }

    fn build_prompt(text: &str, source: &str, target: &str) -> String {
        let source_name = Language::from_code(Some(source))
            .map(|l| l.english_name())
            .unwrap_or(source);
        let target_name = Language::from_code(Some(target))
            .map(|l| l.english_name())
            .unwrap_or(target);
        format!(
            "Translate the following {source_name} text into {target_name}. \
             Preserve the meaning and tone. Return only the translation, \
             with no explanation:\n\n{text}"
        )
    }
}

#[async_trait]
impl Translator for DeepSeekTranslator {
    /// Available when an API key is configured. A full health probe would
    /// cost a model call per poll; key presence is the cheap proxy the
    /// stage checks on every message.
    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Capability("DeepSeek API key is not configured".to_string()))?;

        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: 8000,
            temperature: 0.3,
            stream: false,
            messages: vec![ChatMessage {
                role: "user",
                content: Self::build_prompt(text, source, target),
            }],
        };

        let url = format!("{}{CHAT_COMPLETIONS_PATH}", self.api_url);
        debug!("translating via {url}: {source} -> {target}");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Capability(format!("DeepSeek request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Capability(format!("DeepSeek response unreadable: {e}")))?;
        if !status.is_success() {
            error!("DeepSeek API returned {status}: {body}");
            return Err(Error::Capability(format!(
                "DeepSeek API request failed with status {status}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Capability(format!("unparseable DeepSeek response: {e}")))?;
        if let Some(api_error) = parsed.error {
            return Err(Error::Capability(format!(
                "DeepSeek API error: {}",
                api_error.message.unwrap_or_else(|| "unknown".to_string())
            )));
        }
        parsed
            .choices
            .and_then(|mut choices| {
                if choices.is_empty() {
                    None
                } else {
                    Some(choices.remove(0).message.content)
                }
            })
            .map(|content| content.trim().to_string())
            .ok_or_else(|| Error::Capability("DeepSeek response had no choices".to_string()))
    }
}
