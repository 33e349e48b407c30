use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::{relevance_score, IndexRecord, IndexSpec, SearchHit, VectorIndex};
use crate::embedding::EmbeddingModel;
use crate::models::chunk::ChunkMetadata;

/// In-process vector index. Embeds with a local [`EmbeddingModel`] and
/// ranks by cosine similarity. Contents are lost when the process exits.
pub struct MemoryIndex {
    embedding_model: Arc<dyn EmbeddingModel>,
    indexes: RwLock<HashMap<String, Collection>>,
}

struct Collection {
    records: HashMap<String, StoredRecord>,
}

struct StoredRecord {
    text: String,
    metadata: ChunkMetadata,
    embedding: Vec<f32>,
}

impl MemoryIndex {
    pub fn new(embedding_model: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            embedding_model,
            indexes: RwLock::new(HashMap::new()),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    f64::from(dot / (norm_a * norm_b))
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn has_index(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.indexes.read().await.contains_key(name))
    }

    async fn create_index_for_model(&self, spec: &IndexSpec) -> anyhow::Result<()> {
        let model = self.embedding_model.model_name();
        anyhow::ensure!(
            spec.embed.model == model,
            "Index '{}' requests embedding model '{}' but this index embeds with '{}'",
            spec.name,
            spec.embed.model,
            model
        );

        let mut indexes = self.indexes.write().await;
        if indexes.contains_key(&spec.name) {
            anyhow::bail!("Index '{}' already exists", spec.name);
        }
        indexes.insert(
            spec.name.clone(),
            Collection {
                records: HashMap::new(),
            },
        );
        info!("Created in-memory index '{}' (model={model})", spec.name);
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> anyhow::Result<()> {
        self.indexes.write().await.remove(name);
        Ok(())
    }

    async fn is_ready(&self, name: &str) -> anyhow::Result<bool> {
        self.has_index(name).await
    }

    async fn upsert_records(&self, name: &str, records: &[IndexRecord]) -> anyhow::Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        // Embed before taking the lock.
        let texts: Vec<String> = records.iter().map(|r| r.document.text.clone()).collect();
        let embeddings = self.embedding_model.embed_for_ingestion(&texts).await?;
        anyhow::ensure!(
            embeddings.len() == records.len(),
            "Embedding model returned {} vectors for {} records",
            embeddings.len(),
            records.len()
        );

        let mut indexes = self.indexes.write().await;
        let collection = indexes
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("Index '{name}' not found"))?;

        for (record, embedding) in records.iter().zip(embeddings) {
            collection.records.insert(
                record.id.clone(),
                StoredRecord {
                    text: record.document.text.clone(),
                    metadata: record.document.metadata.clone(),
                    embedding,
                },
            );
        }

        Ok(records.len())
    }

    async fn search(
        &self,
        name: &str,
        query: &str,
        top_k: usize,
    ) -> anyhow::Result<Vec<SearchHit>> {
        let query_embedding = self.embedding_model.embed_for_query(query).await?;

        let indexes = self.indexes.read().await;
        let collection = indexes
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Index '{name}' not found"))?;

        let mut hits: Vec<SearchHit> = collection
            .records
            .iter()
            .map(|(id, record)| SearchHit {
                id: id.clone(),
                text: record.text.clone(),
                score: relevance_score(cosine_similarity(&query_embedding, &record.embedding)),
                metadata: Some(record.metadata.clone()),
            })
            .collect();

        // Ties fall back to chunk position so results are stable.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    let pos = |h: &SearchHit| h.metadata.as_ref().map(|m| m.chunk_id);
                    pos(a).cmp(&pos(b))
                })
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn record_count(&self, name: &str) -> anyhow::Result<usize> {
        let indexes = self.indexes.read().await;
        let collection = indexes
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Index '{name}' not found"))?;
        Ok(collection.records.len())
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}
