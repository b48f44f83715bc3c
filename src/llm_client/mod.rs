//! LLM client abstraction.
//!
//! The extraction capability is a black box behind this trait: given chat
//! messages, return text or schema-constrained JSON. Output may be
//! non-deterministic across calls with identical input, so nothing in the
//! engine assumes otherwise. Test suites substitute deterministic fakes.
//!
//! # Implementations
//! - [`openai::OpenAiClient`]: any OpenAI-compatible chat endpoint.

pub mod openai;

use crate::errors::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A chat message for the LLM conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Speaker role in a chat conversation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Trait for LLM clients supporting structured output (JSON schema).
#[allow(async_fn_in_trait)]
pub trait LlmClient: Send + Sync {
    /// Send a request and parse the response as plain text.
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Send a request and parse the response as a structured JSON type.
    ///
    /// Uses a JSON schema derived from `T` (via `schemars`) to constrain the
    /// model output.
    async fn generate_structured<T>(&self, messages: &[Message]) -> Result<T>
    where
        T: DeserializeOwned + schemars::JsonSchema;
}
