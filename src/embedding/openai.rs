use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::EmbeddingModel;
use crate::completion::openai::api_error_message;

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
/// Inputs per request; lecture chunks are small, so this stays well under
/// the per-request token limit.
const BATCH_SIZE: usize = 100;

/// OpenAI embedding model, for running the in-process index with real embeddings.
pub struct OpenAIEmbeddingModel {
    model_name: String,
    api_key: String,
    dimensions: u32,
    http_client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: u32,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    /// Embeddings in input order, checked against the request.
    fn into_embeddings(mut self, inputs: usize, dimensions: u32) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::ensure!(
            self.data.len() == inputs,
            "OpenAI returned {} embeddings for {inputs} inputs",
            self.data.len()
        );
        self.data.sort_by_key(|d| d.index);

        self.data
            .into_iter()
            .enumerate()
            .map(|(position, d)| {
                anyhow::ensure!(d.index == position, "OpenAI embedding index {} is out of range", d.index);
                anyhow::ensure!(
                    d.embedding.len() == dimensions as usize,
                    "Embedding dimension mismatch: expected {dimensions}, got {}",
                    d.embedding.len()
                );
                Ok(d.embedding)
            })
            .collect()
    }
}

impl OpenAIEmbeddingModel {
    pub fn new(
        model_name: &str,
        api_key: &str,
        dimensions: u32,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            model_name: model_name.to_string(),
            api_key: api_key.to_string(),
            dimensions,
            http_client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model_name,
            input: texts,
            dimensions: self.dimensions,
        };

        let resp = self
            .http_client
            .post(EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "OpenAI embedding API error ({status}): {}",
                api_error_message(&body)
            );
        }

        let response: EmbeddingResponse = resp.json().await?;
        response.into_embeddings(texts.len(), self.dimensions)
    }
}

#[async_trait]
impl EmbeddingModel for OpenAIEmbeddingModel {
    async fn embed_for_ingestion(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            embeddings.extend(self.embed_batch(batch).await?);
            debug!("Embedded {}/{} chunks", embeddings.len(), texts.len());
        }
        Ok(embeddings)
    }

    async fn embed_for_query(&self, query: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned for query"))
    }

    fn dimensions(&self) -> u32 {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
