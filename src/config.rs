use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::prompt::{
    PromptTemplate, ANSWER_PLACEHOLDERS, DEFAULT_ANSWER_TEMPLATE, DEFAULT_TRANSLATION_TEMPLATE,
    TRANSLATION_PLACEHOLDERS,
};
use crate::vector_store::IndexSpec;

// ──────────────────────────── TOML structure ────────────────────────────

#[derive(Debug, Deserialize, Clone)]
pub struct TomlConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub chunker: ChunkerConfig,
    #[serde(default)]
    pub vector_index: VectorIndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub tutor: TutorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
        }
    }
}

fn default_environment() -> String {
    "development".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkerConfig {
    #[serde(default = "default_pdf_path")]
    pub pdf_path: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_chunks_path")]
    pub output_path: PathBuf,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            pdf_path: default_pdf_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            output_path: default_chunks_path(),
        }
    }
}

fn default_pdf_path() -> PathBuf {
    PathBuf::from("lecture_pdf/lecture_slides.pdf")
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_chunks_path() -> PathBuf {
    PathBuf::from("chunks.json")
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexProvider {
    Pinecone,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorIndexConfig {
    #[serde(default = "default_index_provider")]
    pub provider: IndexProvider,
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_index_name")]
    pub embedding_model: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            name: default_index_name(),
            cloud: default_cloud(),
            region: default_region(),
            embedding_model: default_index_name(),
            namespace: default_namespace(),
            source_tag: default_source_tag(),
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}

fn default_index_provider() -> IndexProvider {
    IndexProvider::Pinecone
}
fn default_index_name() -> String {
    "llama-text-embed-v2".to_string()
}
fn default_cloud() -> String {
    "aws".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_namespace() -> String {
    "__default__".to_string()
}
fn default_source_tag() -> String {
    "lecture_slide".to_string()
}
fn default_ready_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local ONNX model through fastembed.
    FastEmbed,
    OpenAI,
    /// Feature hashing; needs no model download or network.
    Hashing,
}

/// Embedding model for the in-process index. The remote index embeds server-side.
/// `dimensions` applies to `openai` and `hashing`; fastembed models have a fixed width.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: EmbeddingProvider,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
        }
    }
}

fn default_embedding_provider() -> EmbeddingProvider {
    EmbeddingProvider::FastEmbed
}
fn default_embedding_model() -> String {
    "BAAI/bge-m3".to_string()
}
fn default_dimensions() -> u32 {
    512
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompletionProvider {
    Gemini,
    OpenAI,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_provider")]
    pub provider: CompletionProvider,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            model: default_completion_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_completion_provider() -> CompletionProvider {
    CompletionProvider::Gemini
}
fn default_completion_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_temperature() -> f64 {
    0.7
}
fn default_request_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_query_language")]
    pub query_language: String,
    #[serde(default = "default_top_k")]
    pub api_top_k: usize,
    #[serde(default = "default_top_k")]
    pub answer_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            query_language: default_query_language(),
            api_top_k: default_top_k(),
            answer_top_k: default_top_k(),
        }
    }
}

fn default_query_language() -> String {
    "German".to_string()
}
fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct TutorConfig {
    #[serde(default = "default_answer_language")]
    pub answer_language: String,
    #[serde(default)]
    pub answer_template: Option<String>,
    #[serde(default)]
    pub translation_template: Option<String>,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            answer_language: default_answer_language(),
            answer_template: None,
            translation_template: None,
        }
    }
}

fn default_answer_language() -> String {
    "Chinese".to_string()
}

// ──────────────────────────── Flattened settings ────────────────────────────

/// Process-wide settings, loaded once by `main` and passed to each component.
#[derive(Debug, Clone)]
pub struct Settings {
    // API
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Chunker
    pub pdf_path: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunks_path: PathBuf,

    // Vector index
    pub index_provider: IndexProvider,
    pub index_name: String,
    pub index_cloud: String,
    pub index_region: String,
    pub index_embedding_model: String,
    pub namespace: String,
    pub source_tag: String,
    pub index_ready_timeout: Duration,

    // Local embedding
    pub embedding_provider: EmbeddingProvider,
    pub embedding_model: String,
    pub embedding_dimensions: u32,

    // Completion
    pub completion_provider: CompletionProvider,
    pub completion_model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub request_timeout: Duration,

    // Retrieval and tutoring
    pub query_language: String,
    pub api_top_k: usize,
    pub answer_top_k: usize,
    pub answer_language: String,
    pub answer_template: PromptTemplate,
    pub translation_template: PromptTemplate,

    // Secrets
    pub pinecone_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Settings {
    /// Creation contract for the configured index. The in-process index is
    /// bound to the local embedding model; the remote one to its hosted model.
    pub fn index_spec(&self) -> IndexSpec {
        let model = match self.index_provider {
            IndexProvider::Pinecone => &self.index_embedding_model,
            IndexProvider::Memory => &self.embedding_model,
        };
        IndexSpec::for_model(&self.index_name, &self.index_cloud, &self.index_region, model)
    }

    pub fn pinecone_api_key(&self) -> anyhow::Result<&str> {
        require_secret(&self.pinecone_api_key, "PINECONE_API_KEY")
    }

    pub fn google_api_key(&self) -> anyhow::Result<&str> {
        require_secret(&self.google_api_key, "GOOGLE_API_KEY")
    }

    pub fn openai_api_key(&self) -> anyhow::Result<&str> {
        require_secret(&self.openai_api_key, "OPENAI_API_KEY")
    }
}

fn require_secret<'a>(value: &'a Option<String>, name: &str) -> anyhow::Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("{name} environment variable is required"))
}

/// Load settings from a TOML file plus the process environment (and `.env`).
pub fn load_settings_from_path(path: impl AsRef<Path>) -> anyhow::Result<Settings> {
    // Load .env if present (ignore errors)
    let _ = dotenvy::dotenv();

    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {e}", path.display()))?;
    settings_from_toml(&content, |key| std::env::var(key).ok())
}

/// Build settings from TOML text, resolving secrets through `env`.
pub fn settings_from_toml(
    content: &str,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let config: TomlConfig = toml::from_str(content)?;

    anyhow::ensure!(config.chunker.chunk_size > 0, "chunker.chunk_size must be positive");
    anyhow::ensure!(
        config.chunker.chunk_overlap < config.chunker.chunk_size,
        "chunker.chunk_overlap must be smaller than chunker.chunk_size"
    );
    anyhow::ensure!(
        config.retrieval.api_top_k > 0 && config.retrieval.answer_top_k > 0,
        "retrieval top_k values must be positive"
    );

    let answer_template = PromptTemplate::new(
        config
            .tutor
            .answer_template
            .unwrap_or_else(|| DEFAULT_ANSWER_TEMPLATE.to_string()),
        &ANSWER_PLACEHOLDERS,
    )?;
    let translation_template = PromptTemplate::new(
        config
            .tutor
            .translation_template
            .unwrap_or_else(|| DEFAULT_TRANSLATION_TEMPLATE.to_string()),
        &TRANSLATION_PLACEHOLDERS,
    )?;

    Ok(Settings {
        host: config.api.host,
        port: config.api.port,
        environment: config.service.environment,
        pdf_path: config.chunker.pdf_path,
        chunk_size: config.chunker.chunk_size,
        chunk_overlap: config.chunker.chunk_overlap,
        chunks_path: config.chunker.output_path,
        index_provider: config.vector_index.provider,
        index_name: config.vector_index.name,
        index_cloud: config.vector_index.cloud,
        index_region: config.vector_index.region,
        index_embedding_model: config.vector_index.embedding_model,
        namespace: config.vector_index.namespace,
        source_tag: config.vector_index.source_tag,
        index_ready_timeout: Duration::from_secs(config.vector_index.ready_timeout_secs),
        embedding_provider: config.embedding.provider,
        embedding_model: config.embedding.model,
        embedding_dimensions: config.embedding.dimensions,
        completion_provider: config.completion.provider,
        completion_model: config.completion.model,
        max_tokens: config.completion.max_tokens,
        temperature: config.completion.temperature,
        request_timeout: Duration::from_secs(config.completion.request_timeout_secs),
        query_language: config.retrieval.query_language,
        api_top_k: config.retrieval.api_top_k,
        answer_top_k: config.retrieval.answer_top_k,
        answer_language: config.tutor.answer_language,
        answer_template,
        translation_template,
        pinecone_api_key: env("PINECONE_API_KEY"),
        google_api_key: env("GOOGLE_API_KEY"),
        openai_api_key: env("OPENAI_API_KEY"),
    })
}
