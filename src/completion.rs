//! Language-model completion backends.
//!
//! [`CompletionBackend`] is the single seam to the model: prompt in, reply
//! text out. Backends do not retry; the chat orchestrator retries a failed
//! call once and bounds every attempt with a timeout.
//!
//! | Config `provider` | Backend |
//! |-------------------|---------|
//! | `"openai"` | [`OpenAiCompatibleBackend`] (OpenAI, OpenRouter, any `/chat/completions` API) |
//! | `"disabled"` | [`DisabledBackend`] |

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::CompletionConfig;
use crate::error::{Error, Result};
use crate::prompt::Prompt;

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Generate a reply for `prompt` with at most `max_tokens` output tokens.
    async fn complete(&self, prompt: &Prompt, model: &str, max_tokens: u32) -> Result<String>;
}

/// Backend used when no model is configured; every call fails.
pub struct DisabledBackend;

#[async_trait]
impl CompletionBackend for DisabledBackend {
    async fn complete(&self, _prompt: &Prompt, _model: &str, _max_tokens: u32) -> Result<String> {
        Err(Error::CompletionBackend(
            "completion provider is disabled; set [completion] provider in config".to_string(),
        ))
    }
}

/// Client for OpenAI-compatible `POST {base_url}/chat/completions` APIs.
pub struct OpenAiCompatibleBackend {
    endpoint: String,
    api_key: Option<String>,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    /// Reads the API key from the variable named by `api_key_env`.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when the variable is unset.
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            Error::Configuration(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;
        Self::with_key(config, Some(api_key))
    }

    /// Build against `config.base_url` with an explicit key (`None` sends no
    /// `Authorization` header, as local servers expect).
    pub fn with_key(config: &CompletionConfig, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::CompletionBackend(e.to_string()))?;
        Ok(Self {
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            temperature: config.temperature,
            client,
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompatibleBackend {
    async fn complete(&self, prompt: &Prompt, model: &str, max_tokens: u32) -> Result<String> {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": prompt.system,
        })];
        messages.extend(
            prompt
                .messages
                .iter()
                .map(|m| serde_json::json!({ "role": m.role, "content": m.content })),
        );
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": self.temperature,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(endpoint = %self.endpoint, model, "requesting completion");
        let response = request
            .send()
            .await
            .map_err(|e| Error::CompletionBackend(format!("connection error: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(Error::CompletionBackend("rate limited (HTTP 429)".to_string()));
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::CompletionBackend(format!(
                "API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::CompletionBackend(format!("invalid response: {}", e)))?;
        parse_reply(&json)
    }
}

/// Extract `choices[0].message.content`.
fn parse_reply(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|c| c.trim().to_string())
        .ok_or_else(|| {
            Error::CompletionBackend("invalid response: missing choices[0].message.content".to_string())
        })
}

pub fn create_backend(config: &CompletionConfig) -> Result<Box<dyn CompletionBackend>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledBackend)),
        "openai" => Ok(Box::new(OpenAiCompatibleBackend::new(config)?)),
        other => Err(Error::Configuration(format!(
            "unknown completion provider: {}",
            other
        ))),
    }
}
