//! Embedding providers.
//!
//! The gateway contract is narrow: given N strings, return N vectors in the
//! same order, or fail. Callers decide what a failure means for them.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{EmbeddingError, Result};
use crate::{DEFAULT_MODEL, Embedding};

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Model used to generate embeddings.
    fn model(&self) -> &str;

    /// Check if the provider is available (API key set, etc.).
    fn is_available(&self) -> bool;

    /// Generate embeddings for multiple texts.
    ///
    /// On success the returned vector has exactly one embedding per input,
    /// in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding in response".to_string()))
    }
}

/// OpenAI-compatible embedding provider.
pub struct OpenAIProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model name sent with every request.
    model: String,
}

impl OpenAIProvider {
    /// Create a provider reading its key from `OPENAI_API_KEY`.
    pub fn new() -> Self {
        Self::from_env("OPENAI_API_KEY")
    }

    /// Create a provider reading its key from the given environment variable.
    ///
    /// An unset or blank variable leaves the provider unavailable.
    pub fn from_env(var: &str) -> Self {
        let api_key = std::env::var(var)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self {
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn request(&self, input: serde_json::Value, expected: usize) -> Result<Vec<Embedding>> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(EmbeddingError::ProviderNotConfigured)?;

        let body = serde_json::json!({
            "model": self.model,
            "input": input,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest {
                status: status.as_u16(),
                body,
            });
        }

        let mut result: OpenAIEmbeddingResponse = response.json().await?;
        if result.data.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {expected} embeddings, got {}",
                result.data.len()
            )));
        }

        // Entries carry their input position; keep input order even if the
        // server does not.
        result.data.sort_by_key(|item| item.index);
        Ok(result.data.into_iter().map(|item| item.embedding).collect())
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Generating batch embeddings for {} texts with model: {}",
            texts.len(),
            self.model
        );

        let embeddings = self
            .request(serde_json::json!(texts), texts.len())
            .await?;

        info!("Generated {} batch embeddings", embeddings.len());
        Ok(embeddings)
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        debug!("Generating query embedding with model: {}", self.model);

        self.request(serde_json::json!(text), 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding in response".to_string()))
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}
