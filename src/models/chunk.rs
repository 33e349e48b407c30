use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkFileError {
    #[error("Chunks file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to parse chunks file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Chunks file I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Metadata attached to every indexed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Fixed tag naming where the chunk came from.
    pub source: String,
    /// Position of the chunk in the persisted sequence.
    pub chunk_id: usize,
}

/// A chunk prepared for indexing (before it is assigned a record id).
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Load the persisted chunk sequence (a JSON array of strings).
pub fn load_chunks(path: &Path) -> Result<Vec<String>, ChunkFileError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ChunkFileError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&content).map_err(|source| ChunkFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Persist the chunk sequence, replacing any previous file.
pub fn save_chunks(chunks: &[String], path: &Path) -> Result<(), ChunkFileError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(chunks).map_err(io::Error::from)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load_keeps_order_and_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.json");
        let chunks = vec![
            "Prozesse und Threads".to_string(),
            "调度器选择下一个进程".to_string(),
        ];

        save_chunks(&chunks, &path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("调度器"), "non-ASCII text should be written verbatim");
        assert!(raw.contains("\n  \""), "file should be indented");

        assert_eq!(load_chunks(&path).unwrap(), chunks);
    }

    #[test]
    fn test_save_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chunks.json");
        save_chunks(&["old".to_string(), "older".to_string()], &path).unwrap();
        save_chunks(&["new".to_string()], &path).unwrap();
        assert_eq!(load_chunks(&path).unwrap(), vec!["new".to_string()]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_chunks(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ChunkFileError::NotFound(_)));
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.json");
        std::fs::write(&path, "{\"not\": \"a list\"}").unwrap();
        let err = load_chunks(&path).unwrap_err();
        assert!(matches!(err, ChunkFileError::Parse { .. }));
    }
}
