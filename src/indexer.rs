use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::info;
use uuid::Uuid;

use crate::config::Settings;
use crate::models::chunk::{load_chunks, ChunkMetadata, Document};
use crate::vector_store::{IndexRecord, IndexSpec, VectorIndex};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Loads persisted chunks and (re)populates the vector index with them.
pub struct Indexer {
    index: Arc<dyn VectorIndex>,
    spec: IndexSpec,
    chunks: Vec<String>,
    source_tag: String,
    ready_timeout: Duration,
}

impl Indexer {
    /// Load the chunks file and make sure the configured index exists.
    pub async fn new(settings: &Settings, index: Arc<dyn VectorIndex>) -> anyhow::Result<Self> {
        let chunks = load_chunks(&settings.chunks_path)?;
        info!(
            "Loaded {} chunks from {}",
            chunks.len(),
            settings.chunks_path.display()
        );

        let indexer = Self {
            index,
            spec: settings.index_spec(),
            chunks,
            source_tag: settings.source_tag.clone(),
            ready_timeout: settings.index_ready_timeout,
        };

        if !indexer.index.has_index(&indexer.spec.name).await? {
            indexer.create_index().await?;
        }

        Ok(indexer)
    }

    pub fn index_name(&self) -> &str {
        &self.spec.name
    }

    /// Records currently stored in the index. Hosted indexes report this
    /// with some delay after an upsert.
    pub async fn record_count(&self) -> anyhow::Result<usize> {
        self.index.record_count(&self.spec.name).await
    }

    /// Wrap each chunk with its source tag and position.
    pub fn prepare_documents(&self) -> Vec<Document> {
        self.chunks
            .iter()
            .enumerate()
            .map(|(i, text)| Document {
                text: text.clone(),
                metadata: ChunkMetadata {
                    source: self.source_tag.clone(),
                    chunk_id: i,
                },
            })
            .collect()
    }

    /// Delete the whole index and recreate it empty, bound to the same model.
    pub async fn clear_index(&self) -> anyhow::Result<()> {
        let name = &self.spec.name;
        if self.index.has_index(name).await? {
            self.index.delete_index(name).await?;
            self.wait_until_deleted().await?;
            info!("Deleted old index '{name}'");
        }
        self.create_index().await?;
        info!("Recreated index '{name}'");
        Ok(())
    }

    /// Replace the index contents with the current chunks under fresh ids.
    pub async fn upload_documents(&self) -> anyhow::Result<usize> {
        self.clear_index().await?;

        let records: Vec<IndexRecord> = self
            .prepare_documents()
            .into_iter()
            .map(|document| IndexRecord {
                id: Uuid::new_v4().to_string(),
                document,
            })
            .collect();

        let uploaded = self.index.upsert_records(&self.spec.name, &records).await?;
        info!(
            "Uploaded {uploaded} documents to {} index '{}'",
            self.index.provider_name(),
            self.spec.name
        );
        Ok(uploaded)
    }

    async fn create_index(&self) -> anyhow::Result<()> {
        self.index.create_index_for_model(&self.spec).await?;
        self.wait_until_ready().await
    }

    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        let deadline = Instant::now() + self.ready_timeout;
        while !self.index.is_ready(&self.spec.name).await? {
            if Instant::now() >= deadline {
                anyhow::bail!(
                    "Index '{}' not ready after {:?}",
                    self.spec.name,
                    self.ready_timeout
                );
            }
            sleep(POLL_INTERVAL).await;
        }
        Ok(())
    }

    async fn wait_until_deleted(&self) -> anyhow::Result<()> {
        let deadline = Instant::now() + self.ready_timeout;
        while self.index.has_index(&self.spec.name).await? {
            if Instant::now() >= deadline {
                anyhow::bail!(
                    "Index '{}' still present {:?} after deletion",
                    self.spec.name,
                    self.ready_timeout
                );
            }
            sleep(POLL_INTERVAL).await;
        }
        Ok(())
    }
}
