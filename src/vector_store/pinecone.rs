use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{relevance_score, IndexRecord, IndexSpec, SearchHit, VectorIndex, TEXT_FIELD};
use crate::models::chunk::ChunkMetadata;

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2025-04";
/// Upper bound on records per upsert for integrated-embedding indexes.
const UPSERT_BATCH_SIZE: usize = 96;

/// Pinecone index with integrated (server-side) embedding.
pub struct PineconeIndex {
    control_url: String,
    namespace: String,
    http_client: reqwest::Client,
    /// Data-plane host per index name, resolved lazily.
    hosts: RwLock<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct IndexDescription {
    host: String,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Serialize)]
struct UpsertLine<'a> {
    #[serde(rename = "_id")]
    id: &'a str,
    text: &'a str,
    source: &'a str,
    chunk_id: usize,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: SearchQuery<'a>,
    fields: [&'static str; 3],
}

#[derive(Serialize)]
struct SearchQuery<'a> {
    inputs: HashMap<&'static str, &'a str>,
    top_k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: SearchResult,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: f64,
    #[serde(default)]
    fields: HitFields,
}

#[derive(Deserialize, Default)]
struct HitFields {
    #[serde(default)]
    text: String,
    #[serde(default)]
    source: Option<String>,
    /// Pinecone stores record numbers as floats (`1.0`).
    #[serde(default)]
    chunk_id: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceStats>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: usize,
}

impl Hit {
    fn into_search_hit(self) -> SearchHit {
        let chunk_id = self
            .fields
            .chunk_id
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as usize);
        let metadata = match (self.fields.source, chunk_id) {
            (Some(source), Some(chunk_id)) => Some(ChunkMetadata { source, chunk_id }),
            _ => None,
        };
        SearchHit {
            id: self.id,
            text: self.fields.text,
            score: relevance_score(self.score),
            metadata,
        }
    }
}

fn to_ndjson(records: &[IndexRecord]) -> anyhow::Result<String> {
    let mut body = String::new();
    for record in records {
        let line = UpsertLine {
            id: &record.id,
            text: &record.document.text,
            source: &record.document.metadata.source,
            chunk_id: record.document.metadata.chunk_id,
        };
        body.push_str(&serde_json::to_string(&line)?);
        body.push('\n');
    }
    Ok(body)
}

impl PineconeIndex {
    pub fn new(api_key: &str, namespace: &str, timeout: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing Pinecone API key");

        let mut headers = HeaderMap::new();
        headers.insert("Api-Key", HeaderValue::from_str(api_key.trim())?);
        headers.insert("X-Pinecone-API-Version", HeaderValue::from_static(API_VERSION));

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            control_url: CONTROL_PLANE_URL.to_string(),
            namespace: namespace.to_string(),
            http_client,
            hosts: RwLock::new(HashMap::new()),
        })
    }

    async fn describe(&self, name: &str) -> anyhow::Result<Option<IndexDescription>> {
        let resp = self
            .http_client
            .get(format!("{}/indexes/{name}", self.control_url))
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Pinecone describe index error ({status}): {body}");
        }
        Ok(Some(resp.json().await?))
    }

    async fn host(&self, name: &str) -> anyhow::Result<String> {
        if let Some(host) = self.hosts.read().await.get(name) {
            return Ok(host.clone());
        }

        let description = self
            .describe(name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Pinecone index '{name}' not found"))?;
        let host = if description.host.starts_with("http") {
            description.host
        } else {
            format!("https://{}", description.host)
        };

        self.hosts.write().await.insert(name.to_string(), host.clone());
        Ok(host)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn has_index(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.describe(name).await?.is_some())
    }

    async fn create_index_for_model(&self, spec: &IndexSpec) -> anyhow::Result<()> {
        let resp = self
            .http_client
            .post(format!("{}/indexes/create-for-model", self.control_url))
            .json(spec)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Pinecone create index error ({status}): {body}");
        }

        info!(
            "Created Pinecone index '{}' (model={})",
            spec.name, spec.embed.model
        );
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> anyhow::Result<()> {
        self.hosts.write().await.remove(name);

        let resp = self
            .http_client
            .delete(format!("{}/indexes/{name}", self.control_url))
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Pinecone delete index error ({status}): {body}");
        }
        Ok(())
    }

    async fn is_ready(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self
            .describe(name)
            .await?
            .and_then(|d| d.status)
            .is_some_and(|s| s.ready))
    }

    async fn upsert_records(&self, name: &str, records: &[IndexRecord]) -> anyhow::Result<usize> {
        let host = self.host(name).await?;
        let url = format!("{host}/records/namespaces/{}/upsert", self.namespace);
        let mut written = 0;

        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let resp = self
                .http_client
                .post(&url)
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(to_ndjson(batch)?)
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("Pinecone upsert error ({status}): {body}");
            }
            written += batch.len();
            debug!("Upserted {written}/{} records", records.len());
        }

        Ok(written)
    }

    async fn search(
        &self,
        name: &str,
        query: &str,
        top_k: usize,
    ) -> anyhow::Result<Vec<SearchHit>> {
        let host = self.host(name).await?;
        let request = SearchRequest {
            query: SearchQuery {
                inputs: HashMap::from([(TEXT_FIELD, query)]),
                top_k,
            },
            fields: [TEXT_FIELD, "source", "chunk_id"],
        };

        let resp = self
            .http_client
            .post(format!("{host}/records/namespaces/{}/search", self.namespace))
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Pinecone search error ({status}): {body}");
        }

        let response: SearchResponse = resp.json().await?;
        Ok(response
            .result
            .hits
            .into_iter()
            .map(Hit::into_search_hit)
            .collect())
    }

    async fn record_count(&self, name: &str) -> anyhow::Result<usize> {
        let host = self.host(name).await?;
        let resp = self
            .http_client
            .post(format!("{host}/describe_index_stats"))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Pinecone index stats error ({status}): {body}");
        }

        let stats: IndexStats = resp.json().await?;
        Ok(stats
            .namespaces
            .get(&self.namespace)
            .map(|ns| ns.vector_count)
            .unwrap_or(0))
    }

    fn provider_name(&self) -> &str {
        "pinecone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chunk::Document;

    #[test]
    fn test_upsert_body_is_one_record_per_line() {
        let records: Vec<IndexRecord> = (0..2)
            .map(|i| IndexRecord {
                id: format!("id-{i}"),
                document: Document {
                    text: format!("chunk {i}"),
                    metadata: ChunkMetadata {
                        source: "lecture_slide".to_string(),
                        chunk_id: i,
                    },
                },
            })
            .collect();

        let body = to_ndjson(&records).unwrap();
        let lines: Vec<serde_json::Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["_id"], "id-1");
        assert_eq!(lines[1]["text"], "chunk 1");
        assert_eq!(lines[1]["source"], "lecture_slide");
        assert_eq!(lines[1]["chunk_id"], 1);
    }

    #[test]
    fn test_search_request_serialization() {
        let request = SearchRequest {
            query: SearchQuery {
                inputs: HashMap::from([(TEXT_FIELD, "Was ist ein Prozess?")]),
                top_k: 4,
            },
            fields: [TEXT_FIELD, "source", "chunk_id"],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["query"]["inputs"]["text"], "Was ist ein Prozess?");
        assert_eq!(json["query"]["top_k"], 4);
        assert_eq!(json["fields"][0], "text");
    }

    #[test]
    fn test_search_response_maps_scores_and_metadata() {
        let json = r#"{
            "result": {
                "hits": [
                    {"_id": "a", "_score": 0.6, "fields": {"text": "A process is a unit of execution.", "source": "lecture_slide", "chunk_id": 1}},
                    {"_id": "b", "_score": -0.2, "fields": {"text": "The CPU schedules processes."}}
                ]
            },
            "usage": {"read_units": 6, "embed_total_tokens": 8}
        }"#;
        let resp: SearchResponse = serde_json::from_str(json).unwrap();
        let hits: Vec<SearchHit> = resp.result.hits.into_iter().map(Hit::into_search_hit).collect();

        assert_eq!(hits[0].text, "A process is a unit of execution.");
        assert!((hits[0].score - 0.8).abs() < 1e-9);
        assert_eq!(hits[0].metadata.as_ref().unwrap().chunk_id, 1);
        assert!((hits[1].score - 0.4).abs() < 1e-9);
        assert!(hits[1].metadata.is_none());
    }

    #[test]
    fn test_search_response_accepts_float_chunk_ids() {
        let json = r#"{
            "result": {
                "hits": [
                    {"_id": "a", "_score": 0.6, "fields": {"text": "A process is a unit of execution.", "source": "lecture_slide", "chunk_id": 1.0}},
                    {"_id": "b", "_score": 0.1, "fields": {"text": "The CPU schedules processes.", "source": "lecture_slide", "chunk_id": 2.5}}
                ]
            }
        }"#;
        let resp: SearchResponse = serde_json::from_str(json).unwrap();
        let hits: Vec<SearchHit> = resp.result.hits.into_iter().map(Hit::into_search_hit).collect();

        assert_eq!(
            hits[0].metadata,
            Some(ChunkMetadata {
                source: "lecture_slide".to_string(),
                chunk_id: 1
            })
        );
        assert!(hits[1].metadata.is_none());
    }

    #[test]
    fn test_index_stats_deserialization() {
        let json = r#"{
            "namespaces": {"__default__": {"vectorCount": 42}},
            "dimension": 1024,
            "indexFullness": 0.0,
            "totalVectorCount": 42
        }"#;
        let stats: IndexStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.namespaces["__default__"].vector_count, 42);
    }

    #[test]
    fn test_rejects_blank_api_key() {
        assert!(PineconeIndex::new("  ", "__default__", Duration::from_secs(5)).is_err());
    }
}
