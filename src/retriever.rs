use std::sync::Arc;
use tracing::info;

use crate::translation::Translator;
use crate::vector_store::{SearchHit, VectorIndex};

/// Chunks retrieved for one question.
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    pub query: String,
    pub translated_query: String,
    /// Ordered by descending relevance.
    pub hits: Vec<SearchHit>,
    /// Each hit as `- {text}\n Score: {score}`, separated by blank lines.
    pub formatted: String,
}

impl RetrievedContext {
    pub fn count(&self) -> usize {
        self.hits.len()
    }
}

/// Translates questions into the index language and searches the index.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    index_name: String,
    translator: Arc<Translator>,
    query_language: String,
}

impl Retriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        index_name: impl Into<String>,
        translator: Arc<Translator>,
        query_language: impl Into<String>,
    ) -> Self {
        Self {
            index,
            index_name: index_name.into(),
            translator,
            query_language: query_language.into(),
        }
    }

    /// Translate a query, falling back to the original text on failure.
    pub async fn translate_query(&self, query: &str, target_language: &str) -> String {
        self.translator.translate_or_keep(query, target_language).await
    }

    /// Search for the `top_k` chunks most relevant to `query`.
    pub async fn retrieve_relevant_chunks(
        &self,
        query: &str,
        top_k: usize,
    ) -> anyhow::Result<RetrievedContext> {
        let translated_query = self.translate_query(query, &self.query_language).await;

        let mut hits = self
            .index
            .search(&self.index_name, &translated_query, top_k)
            .await?;
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);

        info!(
            "Retrieved {} chunks from '{}' for query {:?}",
            hits.len(),
            self.index_name,
            translated_query
        );

        let formatted = format_hits(&hits);
        Ok(RetrievedContext {
            query: query.to_string(),
            translated_query,
            hits,
            formatted,
        })
    }
}

fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("- {}\n Score: {}", hit.text, hit.score))
        .collect::<Vec<_>>()
        .join("\n\n")
}
