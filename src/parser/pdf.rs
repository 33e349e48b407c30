use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::models::chunk::{save_chunks, ChunkFileError};

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("PDF file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Failed to read PDF {}: {message}", .path.display())]
    Pdf { path: PathBuf, message: String },
    #[error("Invalid chunker configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    ChunkFile(#[from] ChunkFileError),
}

/// Parses a lecture PDF, splits it into overlapping chunks and persists them.
pub struct PdfChunker {
    pdf_path: PathBuf,
    chunk_size: usize,
    chunk_overlap: usize,
    output_path: PathBuf,
}

impl PdfChunker {
    pub fn new(
        pdf_path: impl Into<PathBuf>,
        chunk_size: usize,
        chunk_overlap: usize,
        output_path: impl Into<PathBuf>,
    ) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::InvalidConfig("chunk_size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            pdf_path: pdf_path.into(),
            chunk_size,
            chunk_overlap,
            output_path: output_path.into(),
        })
    }

    /// Extract the text of every page, one page per line group.
    pub fn extract_text(&self) -> Result<String, ChunkError> {
        if !self.pdf_path.exists() {
            return Err(ChunkError::FileNotFound(self.pdf_path.clone()));
        }

        let pdf_error = |e: &dyn std::fmt::Display| ChunkError::Pdf {
            path: self.pdf_path.clone(),
            message: e.to_string(),
        };

        let mut doc = pdf_oxide::PdfDocument::open(&self.pdf_path).map_err(|e| pdf_error(&e))?;
        let page_count = doc.page_count().map_err(|e| pdf_error(&e))?;

        join_pages(page_count, |page_index| doc.extract_text(page_index))
            .map_err(|(page_index, e)| pdf_error(&format!("page {}: {e}", page_index + 1)))
    }

    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        super::split_text(text, self.chunk_size, self.chunk_overlap)
    }

    pub fn save_chunks(&self, chunks: &[String]) -> Result<(), ChunkError> {
        save_chunks(chunks, &self.output_path)?;
        Ok(())
    }

    /// Extract, chunk and save. The written file becomes the source for indexing.
    pub fn run(&self) -> Result<Vec<String>, ChunkError> {
        info!("Parsing PDF: {}", self.pdf_path.display());
        let text = self.extract_text()?;
        info!("Extracted {} characters", text.chars().count());

        let chunks = self.chunk_text(&text);
        info!(
            "Created {} chunks (size={}, overlap={})",
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );

        self.save_chunks(&chunks)?;
        info!("Saved chunks to {}", self.output_path.display());

        Ok(chunks)
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

/// Page texts joined by newlines. A page without a text layer contributes an
/// empty line; the first page that fails to extract aborts the whole document.
fn join_pages<E>(
    page_count: usize,
    mut extract: impl FnMut(usize) -> Result<String, E>,
) -> Result<String, (usize, E)> {
    let mut pages = Vec::with_capacity(page_count);
    for page_index in 0..page_count {
        pages.push(extract(page_index).map_err(|e| (page_index, e))?);
    }
    Ok(pages.join("\n"))
}
