//! Chat-completion client.
//!
//! Questions are answered by a hosted model behind an OpenAI-compatible
//! `POST {base_url}/chat/completions` endpoint (Groq by default). Each
//! question is a single attempt: no retries, and no timeout unless
//! `llm.timeout_secs` is configured.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::AppError;

/// A language model that turns a prompt into a text completion.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Sends `prompt` as a single user message and returns the reply text.
    async fn complete(&self, prompt: &str) -> Result<String, AppError>;
}

/// Builds the chat client for a session. Called lazily, once per session.
pub type ChatModelFactory =
    Arc<dyn Fn(&LlmConfig) -> Result<Arc<dyn ChatModel>, AppError> + Send + Sync>;

/// Factory for the real HTTP client.
pub fn http_factory() -> ChatModelFactory {
    Arc::new(|config: &LlmConfig| {
        let client: Arc<dyn ChatModel> = Arc::new(OpenAICompatibleChat::from_config(config)?);
        Ok(client)
    })
}

pub struct OpenAICompatibleChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    api_key: String,
}

impl OpenAICompatibleChat {
    /// Reads the API key from the environment variable named by
    /// `llm.api_key_env`. A missing or empty key is a configuration error.
    pub fn from_config(config: &LlmConfig) -> Result<Self, AppError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "Please add your {} to the .env file",
                    config.api_key_env
                ))
            })?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| AppError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAICompatibleChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, model = %self.model, prompt_chars = prompt.len(), "sending chat completion");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::external("chat", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(AppError::external(
                "chat",
                format!("API error {}: {}", status, body_text),
            ));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::external("chat", format!("invalid response body: {}", e)))?;
        parse_chat_response(&json)
    }
}

/// Extracts `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String, AppError> {
    json.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::external("chat", "invalid response format"))
}
