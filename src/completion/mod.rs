pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Text produced by one completion call.
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub content: String,
    pub usage: Option<Usage>,
}

/// Token accounting reported by the provider, when it reports any.
#[derive(Debug, Clone)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A hosted chat model. The tutor uses one for answers and translations.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Complete the conversation. `None` falls back to the model's configured
    /// defaults.
    async fn complete(
        &self,
        messages: &[Message],
        max_tokens: Option<u32>,
        temperature: Option<f64>,
    ) -> anyhow::Result<CompletionResult>;

    fn model_name(&self) -> &str;
}
