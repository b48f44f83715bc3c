//! OpenAI-compatible LLM client implementation.
//!
//! Uses `async-openai` for API calls, `moka` for response caching, and
//! `backoff` for exponential-backoff retry on rate limits / transient errors.
//! Works against any OpenAI-compatible gateway via a configurable base URL.

use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::errors::{LlmError, MemoryError, Result};
use crate::utils::extract_json_from_response;

use super::{LlmClient, Message, Role};

// ── Cache configuration ───────────────────────────────────────────────────────

/// Configuration for the in-process response cache.
///
/// Extraction calls the same prompts repeatedly during bulk ingestion; caching
/// identical requests keeps token spend bounded.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries held in memory.
    pub max_capacity: u64,
    /// How long each entry lives before eviction.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1_000,
            ttl: Duration::from_secs(3_600), // 1 hour
        }
    }
}

// ── Client struct ─────────────────────────────────────────────────────────────

/// OpenAI-compatible LLM client implementing [`LlmClient`].
pub struct OpenAiClient {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    /// Keyed by `{type_name}:{md5(model + messages)}` → serialised response text.
    cache: Cache<String, String>,
}

impl OpenAiClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_key`  – API key for the gateway.
    /// * `api_base` – Base URL (e.g. `https://api.openai.com/v1`).
    /// * `model`    – Model name (e.g. `"gpt-4o-mini"`).
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let config = async_openai::config::OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        let client = async_openai::Client::with_config(config);

        let cache_config = CacheConfig::default();
        let cache = Cache::builder()
            .max_capacity(cache_config.max_capacity)
            .time_to_live(cache_config.ttl)
            .build();

        Self {
            client,
            model: model.into(),
            temperature: 0.0,
            max_tokens: 8_192,
            cache,
        }
    }

    /// Override the sampling temperature (default `0.0`).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override the max output token limit (default `8192`).
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the cache capacity and TTL.
    pub fn with_cache(mut self, cache_config: CacheConfig) -> Self {
        self.cache = Cache::builder()
            .max_capacity(cache_config.max_capacity)
            .time_to_live(cache_config.ttl)
            .build();
        self
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Compute an MD5 cache key from model + message sequence.
    fn cache_key(&self, prefix: &str, messages: &[Message]) -> String {
        use md5::{Digest, Md5};
        let mut h = Md5::new();
        h.update(prefix.as_bytes());
        h.update(self.model.as_bytes());
        for m in messages {
            let role = role_str(&m.role);
            h.update(role.as_bytes());
            h.update(m.content.as_bytes());
        }
        format!("{:x}", h.finalize())
    }

    /// Serialise our [`Message`] slice into the JSON array expected by the API.
    fn messages_to_json(messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| {
                json!({
                    "role": role_str(&m.role),
                    "content": m.content,
                })
            })
            .collect()
    }

    /// Call the chat completions endpoint with exponential-backoff retry.
    ///
    /// Retries on [`LlmError::RateLimit`] (HTTP 429) and transient 5xx errors.
    async fn call_with_retry(&self, request: serde_json::Value) -> Result<serde_json::Value> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(60))
            .with_max_elapsed_time(Some(Duration::from_secs(300)))
            .build();

        backoff::future::retry(backoff, || async {
            let outcome: std::result::Result<serde_json::Value, async_openai::error::OpenAIError> =
                self.client.chat().create_byot(request.clone()).await;

            match outcome {
                Ok(response) => Ok(response),
                Err(e) => {
                    let llm_err = map_openai_error(e);
                    match &llm_err {
                        LlmError::RateLimit => {
                            warn!("LLM rate limit hit; retrying with backoff");
                            Err(backoff::Error::transient(llm_err))
                        }
                        LlmError::Api { status, .. } if *status >= 500 => {
                            warn!("LLM transient server error ({}): retrying", status);
                            Err(backoff::Error::transient(llm_err))
                        }
                        _ => Err(backoff::Error::permanent(llm_err)),
                    }
                }
            }
        })
        .await
        .map_err(MemoryError::Llm)
    }

    /// Extract the assistant message text from a chat-completions response.
    fn extract_content(response: &serde_json::Value) -> Result<String> {
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or(MemoryError::Llm(LlmError::EmptyResponse))
    }

    /// Parse a structured response body, tolerating markdown-wrapped JSON from
    /// gateways that ignore `response_format`.
    fn parse_structured<T: DeserializeOwned>(content: &str) -> Result<T> {
        match serde_json::from_str(content) {
            Ok(parsed) => Ok(parsed),
            Err(first_err) => match extract_json_from_response(content) {
                Some(inner) => serde_json::from_str(inner).map_err(MemoryError::Serialization),
                None => Err(MemoryError::Serialization(first_err)),
            },
        }
    }
}

// ── LlmClient implementation ──────────────────────────────────────────────────

impl LlmClient for OpenAiClient {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let key = self.cache_key("text", messages);

        if let Some(cached) = self.cache.get(&key).await {
            debug!("LLM cache hit (text)");
            return Ok(cached);
        }

        let request = json!({
            "model": self.model,
            "messages": Self::messages_to_json(messages),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = self.call_with_retry(request).await?;
        let content = Self::extract_content(&response)?;

        self.cache.insert(key, content.clone()).await;

        Ok(content)
    }

    async fn generate_structured<T>(&self, messages: &[Message]) -> Result<T>
    where
        T: DeserializeOwned + schemars::JsonSchema,
    {
        // Include the target type name in the cache key so different T for the
        // same messages don't collide.
        let prefix = std::any::type_name::<T>();
        let key = self.cache_key(prefix, messages);

        if let Some(cached) = self.cache.get(&key).await {
            debug!("LLM cache hit (structured/{})", prefix);
            return Self::parse_structured(&cached);
        }

        // Build the JSON schema from T via schemars.
        let schema = schemars::schema_for!(T);
        let schema_value = serde_json::to_value(&schema)?;

        let request = json!({
            "model": self.model,
            "messages": Self::messages_to_json(messages),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "response",
                    "schema": schema_value,
                    "strict": true,
                }
            }
        });

        let response = self.call_with_retry(request).await?;
        let content = Self::extract_content(&response)?;

        self.cache.insert(key, content.clone()).await;

        Self::parse_structured(&content)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn role_str(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Map an [`async_openai::error::OpenAIError`] to our [`LlmError`] domain type.
///
/// `ApiError` carries no HTTP status, only the body's `type`/`code` strings,
/// so classification goes by those. A synthetic status of 500 marks server
/// errors for the retry policy; 0 means unclassified.
fn map_openai_error(err: async_openai::error::OpenAIError) -> LlmError {
    use async_openai::error::OpenAIError;

    match err {
        OpenAIError::ApiError(api_err) => {
            let kind = api_err.r#type.as_deref().unwrap_or("");
            let message_lower = api_err.message.to_lowercase();
            if kind == "authentication_error" || message_lower.contains("api key") {
                LlmError::Authentication
            } else if matches!(kind, "rate_limit_error" | "insufficient_quota" | "requests" | "tokens")
                || message_lower.contains("rate limit")
            {
                LlmError::RateLimit
            } else if kind == "server_error" {
                LlmError::Api {
                    status: 500,
                    message: api_err.message,
                }
            } else {
                LlmError::Api {
                    status: 0,
                    message: api_err.message,
                }
            }
        }
        other => LlmError::Api {
            status: 0,
            message: other.to_string(),
        },
    }
}
