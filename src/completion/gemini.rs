use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CompletionModel, CompletionResult, Message, Role, Usage};

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini completion model via the `generateContent` REST API.
pub struct GeminiCompletionModel {
    model_name: String,
    api_key: String,
    base_url: String,
    default_max_tokens: u32,
    default_temperature: f64,
    http_client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl GeminiCompletionModel {
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
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            default_max_tokens,
            default_temperature,
            http_client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    fn build_request(
        &self,
        messages: &[Message],
        max_tokens: Option<u32>,
        temperature: Option<f64>,
    ) -> GenerateRequest {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for message in messages {
            let part = Part {
                text: Some(message.content.clone()),
            };
            match message.role {
                Role::System => system_parts.push(part),
                Role::Assistant => contents.push(Content {
                    role: Some("model".to_string()),
                    parts: vec![part],
                }),
                Role::User => contents.push(Content {
                    role: Some("user".to_string()),
                    parts: vec![part],
                }),
            }
        }

        GenerateRequest {
            contents,
            system_instruction: (!system_parts.is_empty()).then(|| Content {
                role: None,
                parts: system_parts,
            }),
            generation_config: GenerationConfig {
                max_output_tokens: max_tokens.unwrap_or(self.default_max_tokens),
                temperature: temperature.unwrap_or(self.default_temperature),
            },
        }
    }
}

impl GenerateResponse {
    fn into_result(self) -> anyhow::Result<CompletionResult> {
        let content: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if content.trim().is_empty() {
            anyhow::bail!("Gemini response contained no text");
        }

        let usage = self.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(CompletionResult { content, usage })
    }
}

#[async_trait]
impl CompletionModel for GeminiCompletionModel {
    async fn complete(
        &self,
        messages: &[Message],
        max_tokens: Option<u32>,
        temperature: Option<f64>,
    ) -> anyhow::Result<CompletionResult> {
        let request = self.build_request(messages, max_tokens, temperature);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model_name
        );

        let resp = self
            .http_client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gemini completion API error ({status}): {body}");
        }

        let response: GenerateResponse = resp.json().await?;
        response.into_result()
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
