use async_trait::async_trait;

use super::EmbeddingModel;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic bag-of-words embedding via signed feature hashing.
///
/// Needs no network access, so the in-process index can run offline and in
/// tests. Quality is lexical only: texts sharing words score high.
pub struct HashingEmbeddingModel {
    model_name: String,
    dimensions: u32,
}

impl HashingEmbeddingModel {
    pub fn new(model_name: &str, dimensions: u32) -> Self {
        Self {
            model_name: model_name.to_string(),
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let dims = self.dimensions as usize;
        let mut vector = vec![0.0f32; dims];

        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % dims as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl EmbeddingModel for HashingEmbeddingModel {
    async fn embed_for_ingestion(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    async fn embed_for_query(&self, query: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.embed(query))
    }

    fn dimensions(&self) -> u32 {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
