use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct StudyBuddyRequest {
    /// The student's question, in any language.
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudyBuddyResponse {
    /// Answer translated into the configured answer language.
    pub response: String,
    /// Number of chunks used as context.
    pub total_chunks: usize,
    /// The formatted context block given to the model.
    pub sample_chunks: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
}
