use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use super::{CompletionModel, CompletionResult, Message, Usage};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI chat completion model (alternative to Gemini).
pub struct OpenAICompletionModel {
    model_name: String,
    api_key: String,
    default_max_tokens: u32,
    default_temperature: f64,
    http_client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_completion_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct TokenUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// The `error.message` of an OpenAI error body, or the raw body.
pub(crate) fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.to_string())
}

impl ChatResponse {
    fn into_result(self, model_name: &str) -> anyhow::Result<CompletionResult> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("OpenAI completion returned no choices"))?;

        if let Some(refusal) = choice.message.refusal {
            anyhow::bail!("{model_name} refused the request: {refusal}");
        }
        if choice.finish_reason.as_deref() == Some("length") {
            warn!("{model_name} stopped at the token limit; the answer is truncated");
        }

        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("OpenAI completion returned no content"))?;

        let usage = self.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResult { content, usage })
    }
}

impl OpenAICompletionModel {
    pub fn new(
        model_name: &str,
        api_key: &str,
        default_max_tokens: u32,
        default_temperature: f64,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            model_name: model_name.to_string(),
            api_key: api_key.to_string(),
            default_max_tokens,
            default_temperature,
            http_client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl CompletionModel for OpenAICompletionModel {
    async fn complete(
        &self,
        messages: &[Message],
        max_tokens: Option<u32>,
        temperature: Option<f64>,
    ) -> anyhow::Result<CompletionResult> {
        let request = ChatRequest {
            model: &self.model_name,
            messages,
            max_completion_tokens: max_tokens.unwrap_or(self.default_max_tokens),
            temperature: temperature.unwrap_or(self.default_temperature),
        };

        let resp = self
            .http_client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "OpenAI completion API error ({status}): {}",
                api_error_message(&body)
            );
        }

        let response: ChatResponse = resp.json().await?;
        response.into_result(&self.model_name)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
