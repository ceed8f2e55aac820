//! External capability interfaces for the completion and embedding services,
//! plus the OpenAI-backed implementation.
//!
//! The resolvers and parsers only ever see the traits, so they can be tested
//! deterministically against fixed stub responses. Calls are blocking
//! round-trips from the core's point of view: no retry, backoff, or timeout
//! lives here.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{CoreError, Result};

/// Default completion model.
const DEFAULT_MODEL: &str = "gpt-4o";

/// Default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// LLM completion provider: system prompt + user text in, text out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String>;
}

/// Embedding provider: text in, fixed-length float vector out.
/// Fails on empty input.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// OpenAI API client implementing both capabilities.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
    embedding_model: String,
}

impl OpenAiClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: String) -> Self {
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let embedding_model = std::env::var("OPENAI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
        Self {
            api_key,
            client: reqwest::Client::new(),
            model,
            embedding_model,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| CoreError::upstream("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_text}
            ],
            "temperature": 0.1
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::upstream(format!(
                "completion API error {}: {}",
                status, body
            )));
        }

        #[derive(Deserialize)]
        struct Message {
            content: String,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| CoreError::upstream(format!("malformed completion response: {}", e)))?;

        api_response
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| CoreError::upstream("completion API returned no choices"))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(CoreError::upstream("input text is empty"));
        }

        let body = serde_json::json!({
            "model": &self.embedding_model,
            "input": text
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::upstream(format!(
                "embedding API error {}: {}",
                status, body
            )));
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            data: Vec<EmbeddingData>,
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| CoreError::upstream(format!("malformed embedding response: {}", e)))?;

        let embedding = api_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| CoreError::upstream("embedding response missing data"))?;

        if embedding.is_empty() {
            return Err(CoreError::upstream("embedding response invalid or missing"));
        }
        Ok(embedding)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client_defaults() {
        let client = OpenAiClient::new("test-key".to_string());
        assert!(!client.model_name().is_empty());
    }

    #[tokio::test]
    async fn test_embed_rejects_empty_input() {
        let client = OpenAiClient::new("test-key".to_string());
        let err = client.embed("   ").await.expect_err("empty input must fail");
        assert!(matches!(err, CoreError::Upstream { .. }));
    }
}
