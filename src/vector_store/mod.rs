pub mod memory;
pub mod pinecone;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::chunk::{ChunkMetadata, Document};

/// Field of each record that is fed to the embedding model.
pub const TEXT_FIELD: &str = "text";

/// Creation contract for an index whose embeddings are computed by a named model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSpec {
    pub name: String,
    pub cloud: String,
    pub region: String,
    pub embed: EmbedSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedSpec {
    pub model: String,
    /// Maps the model's input field to the record field holding the text.
    pub field_map: BTreeMap<String, String>,
}

impl IndexSpec {
    pub fn for_model(name: &str, cloud: &str, region: &str, model: &str) -> Self {
        let field_map = BTreeMap::from([(TEXT_FIELD.to_string(), TEXT_FIELD.to_string())]);
        Self {
            name: name.to_string(),
            cloud: cloud.to_string(),
            region: region.to_string(),
            embed: EmbedSpec {
                model: model.to_string(),
                field_map,
            },
        }
    }
}

/// A chunk as stored in the index: a document under a generated id.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub id: String,
    pub document: Document,
}

/// One similarity-search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    /// Relevance in [0, 1]; higher is more similar.
    pub score: f64,
    pub metadata: Option<ChunkMetadata>,
}

/// A named vector index that embeds record text with its bound model.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn has_index(&self, name: &str) -> anyhow::Result<bool>;

    /// Create an index bound to `spec.embed.model`. Fails if it already exists.
    async fn create_index_for_model(&self, spec: &IndexSpec) -> anyhow::Result<()>;

    /// Delete the index and every record in it. Missing indexes are not an error.
    async fn delete_index(&self, name: &str) -> anyhow::Result<()>;

    /// Whether a freshly created index accepts reads and writes.
    async fn is_ready(&self, name: &str) -> anyhow::Result<bool>;

    /// Insert or replace records by id. Returns the number written.
    async fn upsert_records(&self, name: &str, records: &[IndexRecord]) -> anyhow::Result<usize>;

    /// Top-k records for a text query, ordered by descending relevance.
    async fn search(&self, name: &str, query: &str, top_k: usize)
        -> anyhow::Result<Vec<SearchHit>>;

    async fn record_count(&self, name: &str) -> anyhow::Result<usize>;

    /// Return the provider name for logging.
    fn provider_name(&self) -> &str;
}

/// Map a cosine similarity in [-1, 1] to a relevance score in [0, 1].
pub fn relevance_score(cosine: f64) -> f64 {
    ((cosine + 1.0) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_spec_serialization() {
        let spec = IndexSpec::for_model("lectures", "aws", "us-east-1", "llama-text-embed-v2");
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["name"], "lectures");
        assert_eq!(json["cloud"], "aws");
        assert_eq!(json["region"], "us-east-1");
        assert_eq!(json["embed"]["model"], "llama-text-embed-v2");
        assert_eq!(json["embed"]["field_map"]["text"], "text");
    }

    #[test]
    fn test_relevance_score_range() {
        assert_eq!(relevance_score(1.0), 1.0);
        assert_eq!(relevance_score(0.0), 0.5);
        assert_eq!(relevance_score(-1.0), 0.0);
        assert_eq!(relevance_score(1.2), 1.0);
    }
}
