// src/providers/completion.rs
// Embedding + chat completion provider abstraction.
// Concrete implementation talks to an OpenAI-style HTTP API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{CoreError, CoreResult};

/// Provider of embeddings and chat completions. Both calls may fail with a
/// transport error at any time regardless of prior availability checks.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>>;

    /// Generate a completion for a system + user message pair, bounded by
    /// `max_tokens` output tokens.
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> CoreResult<String>;

    fn model_name(&self) -> &str;
}

/// OpenAI-compatible HTTP provider (`/embeddings` + `/chat/completions`).
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    embed_model: String,
    chat_model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl OpenAiProvider {
    /// Build from configuration. Errors when the API key is absent; callers
    /// gate on the capability registry before constructing.
    pub fn from_config(config: &Config) -> CoreResult<Self> {
        let api_key = config.openai_api_key.clone().ok_or_else(|| {
            CoreError::CapabilityUnavailable {
                kind: crate::capability::CapabilityKind::Completion,
                reason: "OPENAI_API_KEY not set".to_string(),
            }
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        info!(
            base_url = %config.openai_base_url,
            embed_model = %config.embed_model,
            chat_model = %config.chat_model,
            "Initializing completion provider"
        );

        Ok(Self {
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key,
            embed_model: config.embed_model.clone(),
            chat_model: config.chat_model.clone(),
            client,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        debug!(model = %self.embed_model, text_len = text.len(), "Requesting embedding");

        let url = format!("{}/embeddings", self.base_url);
        let req = EmbeddingRequest {
            model: &self.embed_model,
            input: text,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        let row = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Provider("embedding response contained no rows".to_string()))?;

        debug!(dimension = row.embedding.len(), "Embedding received");
        Ok(row.embedding)
    }

    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> CoreResult<String> {
        debug!(model = %self.chat_model, max_tokens, "Requesting completion");

        let url = format!("{}/chat/completions", self.base_url);
        let req = ChatRequest {
            model: &self.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Provider("completion response contained no choices".to_string()))?;

        Ok(choice.message.content.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.chat_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_key() {
        let config = Config::default();
        let provider = OpenAiProvider::from_config(&config);
        assert!(matches!(
            provider,
            Err(CoreError::CapabilityUnavailable { .. })
        ));
    }

    #[test]
    fn test_from_config_with_key() {
        let config = Config {
            openai_api_key: Some("sk-test".to_string()),
            ..Config::default()
        };
        let provider = OpenAiProvider::from_config(&config).unwrap();
        assert_eq!(provider.model_name(), "gpt-4.1-mini");
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let config = Config {
            openai_api_key: Some("sk-test".to_string()),
            openai_base_url: "http://localhost:8080/v1/".to_string(),
            ..Config::default()
        };
        let provider = OpenAiProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }
}
