use async_trait::async_trait;
use fastembed::{TextEmbedding, TextInitOptions};
use tokio::sync::Mutex;
use tracing::info;

use super::EmbeddingModel;

/// Local ONNX sentence embeddings via `fastembed`. The model is downloaded
/// on first use and cached by fastembed.
pub struct FastEmbedModel {
    model_name: String,
    dimensions: u32,
    model: Mutex<TextEmbedding>,
}

impl FastEmbedModel {
    /// Load a model by its Hugging Face code, e.g. `BAAI/bge-m3`.
    pub fn new(model_name: &str) -> anyhow::Result<Self> {
        let model_id = model_name
            .parse::<fastembed::EmbeddingModel>()
            .map_err(|e| anyhow::anyhow!("Unknown fastembed model '{model_name}': {e}"))?;

        let mut model = TextEmbedding::try_new(TextInitOptions::new(model_id))?;

        // Read the width off a real vector rather than a model table.
        let dimensions = model
            .embed(vec!["dimension check"], None)?
            .first()
            .map(|v| v.len())
            .ok_or_else(|| anyhow::anyhow!("fastembed returned no vector for '{model_name}'"))?;
        info!("Loaded fastembed model {model_name} ({dimensions} dimensions)");

        Ok(Self {
            model_name: model_name.to_string(),
            dimensions: u32::try_from(dimensions)?,
            model: Mutex::new(model),
        })
    }
}

#[async_trait]
impl EmbeddingModel for FastEmbedModel {
    async fn embed_for_ingestion(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = {
            let mut model = self.model.lock().await;
            model.embed(texts, None)?
        };
        anyhow::ensure!(
            embeddings.len() == texts.len(),
            "fastembed returned {} vectors for {} texts",
            embeddings.len(),
            texts.len()
        );
        Ok(embeddings)
    }

    async fn embed_for_query(&self, query: &str) -> anyhow::Result<Vec<f32>> {
        let mut embeddings = {
            let mut model = self.model.lock().await;
            model.embed(vec![query], None)?
        };
        embeddings
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
