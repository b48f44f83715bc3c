//! OpenAI-compatible embedding client implementation.
//!
//! Wraps [`async_openai`] to provide [`EmbedderClient`] for any
//! OpenAI-compatible embeddings endpoint, with chunked batch support and
//! exponential-backoff retry.

use async_openai::{
    config::OpenAIConfig, error::OpenAIError, types::CreateEmbeddingRequestArgs, Client,
};
use backoff::{future::retry, ExponentialBackoffBuilder};
use std::time::Duration;

use crate::embedder::{EmbedderClient, Embedding};
use crate::errors::{MemoryError, Result};

/// Maximum number of inputs per embeddings API call.
const BATCH_CHUNK_SIZE: usize = 2048;

/// Classify an [`OpenAIError`] as transient (should retry) or permanent.
fn classify_error(err: OpenAIError) -> backoff::Error<MemoryError> {
    let msg = err.to_string();
    match &err {
        // Network-level failures (timeouts, connection refused) are transient.
        OpenAIError::Reqwest(e) if e.is_timeout() || e.is_connect() => {
            backoff::Error::transient(MemoryError::Embedder(msg))
        }
        // Everything else (auth errors, bad requests, …) is permanent.
        _ => backoff::Error::permanent(MemoryError::Embedder(msg)),
    }
}

/// OpenAI-compatible embedding client that implements [`EmbedderClient`].
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dim: usize,
}

impl OpenAiEmbedder {
    /// Create a new embedder.
    ///
    /// # Arguments
    /// * `api_key`  – API key for the gateway.
    /// * `api_base` – Base URL of the embeddings endpoint.
    /// * `model`    – Embedding model name.
    /// * `dim`      – Expected vector dimension for this model.
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
        dim: usize,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key.into())
            .with_api_base(api_base.into());
        Self {
            client: Client::with_config(config),
            model: model.into(),
            dim,
        }
    }

    /// Issue a single embeddings API call for up to [`BATCH_CHUNK_SIZE`] texts.
    ///
    /// Retries on transient network failures with exponential back-off
    /// (initial 500 ms, cap 10 s, giving up after 60 s total).
    async fn embed_chunk(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let backoff_policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(10))
            .with_max_elapsed_time(Some(Duration::from_secs(60)))
            .build();

        // Materialise owned data before entering the retry closure.
        let input: Vec<String> = texts.iter().map(|s| (*s).to_owned()).collect();
        let model = self.model.clone();
        let client = self.client.clone();

        retry(backoff_policy, move || {
            let input = input.clone();
            let model = model.clone();
            let client = client.clone();
            async move {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.as_str())
                    .input(input)
                    .build()
                    .map_err(|e| {
                        backoff::Error::permanent(MemoryError::Embedder(e.to_string()))
                    })?;

                let response = client
                    .embeddings()
                    .create(request)
                    .await
                    .map_err(classify_error)?;

                let embeddings: Vec<Embedding> = response
                    .data
                    .into_iter()
                    .map(|item| item.embedding.into_iter().map(|x| x as f32).collect())
                    .collect();

                Ok(embeddings)
            }
        })
        .await
    }
}

impl EmbedderClient for OpenAiEmbedder {
    /// Embed a single text string.
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut embeddings = self.embed_chunk(&[text]).await?;
        embeddings
            .pop()
            .ok_or_else(|| MemoryError::Embedder("empty response from embedding API".to_string()))
    }

    /// Embed multiple texts, automatically splitting into chunks of at most
    /// [`BATCH_CHUNK_SIZE`] items to respect per-call limits.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut result = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_CHUNK_SIZE) {
            let chunk_embeddings = self.embed_chunk(chunk).await?;
            result.extend(chunk_embeddings);
        }
        Ok(result)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    /// Build a JSON body mimicking a real embeddings response.
    fn make_response(count: usize, dim: usize) -> serde_json::Value {
        let data: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "object": "embedding",
                    "index": i,
                    "embedding": vec![0.1_f32; dim],
                })
            })
            .collect();
        serde_json::json!({
            "object": "list",
            "data": data,
            "model": "text-embedding-3-small",
            "usage": { "prompt_tokens": 8, "total_tokens": 8 },
        })
    }

    async fn mount_ok(server: &MockServer, count: usize, dim: usize) {
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(make_response(count, dim)))
            .mount(server)
            .await;
    }

    fn embedder(server: &MockServer) -> OpenAiEmbedder {
        OpenAiEmbedder::new("sk-test", server.uri(), "text-embedding-3-small", 1536)
    }

    #[test]
    fn dim_reports_configured_dimension() {
        assert_eq!(
            OpenAiEmbedder::new("key", "http://localhost", "text-embedding-004", 768).dim(),
            768
        );
    }

    #[tokio::test]
    async fn embed_returns_vector_of_correct_length() {
        let server = MockServer::start().await;
        mount_ok(&server, 1, 4).await;

        let embedding = embedder(&server).embed("hello world").await.unwrap();
        assert_eq!(embedding.len(), 4);
    }

    #[tokio::test]
    async fn embed_empty_data_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "data": [],
                "model": "text-embedding-3-small",
                "usage": { "prompt_tokens": 0, "total_tokens": 0 },
            })))
            .mount(&server)
            .await;

        let result = embedder(&server).embed("test").await;
        assert!(matches!(result.unwrap_err(), MemoryError::Embedder(_)));
    }

    #[tokio::test]
    async fn embed_batch_returns_one_embedding_per_input() {
        let server = MockServer::start().await;
        mount_ok(&server, 3, 4).await;

        let texts = ["alpha", "beta", "gamma"];
        let embeddings = embedder(&server).embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 3);
        for emb in &embeddings {
            assert_eq!(emb.len(), 4);
        }
    }

    #[tokio::test]
    async fn embed_batch_empty_slice_returns_empty_vec() {
        // No HTTP call should be made for an empty input slice.
        let server = MockServer::start().await;
        let embeddings = embedder(&server).embed_batch(&[]).await.unwrap();
        assert!(embeddings.is_empty());
    }

    #[tokio::test]
    async fn api_error_maps_to_embedder_variant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {
                    "message": "Incorrect API key provided.",
                    "type": "authentication_error",
                    "param": null,
                    "code": "invalid_api_key",
                }
            })))
            .mount(&server)
            .await;

        let result = embedder(&server).embed("test").await;
        assert!(matches!(result.unwrap_err(), MemoryError::Embedder(_)));
    }
}
