mod app;
mod completion;
mod config;
mod embedding;
mod indexer;
mod models;
mod parser;
mod prompt;
mod retriever;
mod routes;
#[cfg(test)]
mod testing;
mod translation;
mod tutor;
mod vector_store;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::AppState;
use completion::gemini::GeminiCompletionModel;
use completion::openai::OpenAICompletionModel;
use completion::CompletionModel;
use config::{load_settings_from_path, CompletionProvider, EmbeddingProvider, IndexProvider, Settings};
use embedding::hashing::HashingEmbeddingModel;
use embedding::local::FastEmbedModel;
use embedding::openai::OpenAIEmbeddingModel;
use embedding::EmbeddingModel;
use indexer::Indexer;
use parser::pdf::PdfChunker;
use retriever::Retriever;
use translation::Translator;
use tutor::Tutor;
use vector_store::memory::MemoryIndex;
use vector_store::pinecone::PineconeIndex;
use vector_store::VectorIndex;

#[derive(Parser)]
#[command(name = "studybuddy", about = "Lecture-slide tutoring assistant", version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "STUDYBUDDY_CONFIG", default_value = "studybuddy.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract text from the lecture PDF and write the chunks file
    Chunk {
        /// PDF to read instead of the configured one
        #[arg(long)]
        pdf: Option<PathBuf>,
    },

    /// Replace the vector index contents with the chunks file
    Index,

    /// Answer one question and print the translated answer
    Ask {
        /// The question, in any language
        question: String,
    },

    /// Start the HTTP server
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration.
    let settings = load_settings_from_path(&cli.config)?;
    info!(
        "Configuration loaded from {}: environment={}, index={} ({:?}), completion={}",
        cli.config.display(),
        settings.environment,
        settings.index_name,
        settings.index_provider,
        settings.completion_model
    );

    match cli.command {
        Command::Chunk { pdf } => chunk(&settings, pdf),
        Command::Index => index(&settings).await,
        Command::Ask { question } => ask(&settings, &question).await,
        Command::Serve => serve(settings).await,
    }
}

fn chunk(settings: &Settings, pdf: Option<PathBuf>) -> anyhow::Result<()> {
    let chunker = PdfChunker::new(
        pdf.unwrap_or_else(|| settings.pdf_path.clone()),
        settings.chunk_size,
        settings.chunk_overlap,
        &settings.chunks_path,
    )?;
    let chunks = chunker.run()?;
    info!("Wrote {} chunks to {}", chunks.len(), chunker.output_path().display());
    Ok(())
}

async fn index(settings: &Settings) -> anyhow::Result<()> {
    if settings.index_provider == IndexProvider::Memory {
        warn!("The memory index lives only as long as this process; `serve` rebuilds it at startup");
    }
    let vector_index = build_vector_index(settings)?;
    let indexer = Indexer::new(settings, vector_index).await?;
    let uploaded = indexer.upload_documents().await?;
    info!("Indexed {uploaded} chunks into '{}'", indexer.index_name());

    let stored = indexer.record_count().await?;
    if stored != uploaded {
        // Pinecone's stats lag behind upserts for a few seconds.
        warn!("Index '{}' reports {stored} records so far", indexer.index_name());
    }
    Ok(())
}

async fn ask(settings: &Settings, question: &str) -> anyhow::Result<()> {
    let (_, tutor) = build_pipeline(settings).await?;
    let answer = tutor.answer_question(question).await?;
    let response = tutor
        .translate_response(&answer, &settings.answer_language)
        .await?;
    println!("{response}");
    Ok(())
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    info!("Starting StudyBuddy server...");
    let (retriever, tutor) = build_pipeline(&settings).await?;

    // Build application state.
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    let state = Arc::new(AppState {
        settings,
        retriever,
        tutor,
    });

    // Build router.
    let app = routes::build_router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    // Start server.
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Wire translator, retriever and tutor around the configured backends. An
/// in-process index starts empty, so it is filled from the chunks file first.
async fn build_pipeline(settings: &Settings) -> anyhow::Result<(Arc<Retriever>, Arc<Tutor>)> {
    let vector_index = build_vector_index(settings)?;
    if settings.index_provider == IndexProvider::Memory {
        Indexer::new(settings, vector_index.clone())
            .await?
            .upload_documents()
            .await?;
    }

    let completion_model = build_completion_model(settings)?;

    let translator = Arc::new(Translator::new(
        completion_model.clone(),
        settings.translation_template.clone(),
    ));
    let retriever = Arc::new(Retriever::new(
        vector_index,
        settings.index_name.clone(),
        translator.clone(),
        settings.query_language.clone(),
    ));
    let tutor = Arc::new(Tutor::new(
        retriever.clone(),
        translator,
        completion_model,
        settings.answer_template.clone(),
        settings.answer_top_k,
    ));
    Ok((retriever, tutor))
}

fn build_vector_index(settings: &Settings) -> anyhow::Result<Arc<dyn VectorIndex>> {
    let vector_index: Arc<dyn VectorIndex> = match settings.index_provider {
        IndexProvider::Pinecone => Arc::new(PineconeIndex::new(
            settings.pinecone_api_key()?,
            &settings.namespace,
            settings.request_timeout,
        )?),
        IndexProvider::Memory => Arc::new(MemoryIndex::new(build_embedding_model(settings)?)),
    };
    info!("Vector index initialized: {}", vector_index.provider_name());
    Ok(vector_index)
}

fn build_embedding_model(settings: &Settings) -> anyhow::Result<Arc<dyn EmbeddingModel>> {
    let embedding_model: Arc<dyn EmbeddingModel> = match settings.embedding_provider {
        EmbeddingProvider::FastEmbed => Arc::new(FastEmbedModel::new(&settings.embedding_model)?),
        EmbeddingProvider::Hashing => Arc::new(HashingEmbeddingModel::new(
            &settings.embedding_model,
            settings.embedding_dimensions,
        )),
        EmbeddingProvider::OpenAI => Arc::new(OpenAIEmbeddingModel::new(
            &settings.embedding_model,
            settings.openai_api_key()?,
            settings.embedding_dimensions,
            settings.request_timeout,
        )?),
    };
    info!(
        "Embedding model initialized: {} ({} dimensions)",
        embedding_model.model_name(),
        embedding_model.dimensions()
    );
    Ok(embedding_model)
}

fn build_completion_model(settings: &Settings) -> anyhow::Result<Arc<dyn CompletionModel>> {
    let completion_model: Arc<dyn CompletionModel> = match settings.completion_provider {
        CompletionProvider::Gemini => Arc::new(GeminiCompletionModel::new(
            &settings.completion_model,
            settings.google_api_key()?,
            settings.max_tokens,
            settings.temperature,
            settings.request_timeout,
        )?),
        CompletionProvider::OpenAI => Arc::new(OpenAICompletionModel::new(
            &settings.completion_model,
            settings.openai_api_key()?,
            settings.max_tokens,
            settings.temperature,
            settings.request_timeout,
        )?),
    };
    info!("Completion model initialized: {}", completion_model.model_name());
    Ok(completion_model)
}
