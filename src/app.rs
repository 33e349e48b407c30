use std::sync::Arc;

use crate::config::Settings;
use crate::retriever::Retriever;
use crate::tutor::Tutor;

/// Shared application state passed to all route handlers.
pub struct AppState {
    pub settings: Settings,
    pub retriever: Arc<Retriever>,
    pub tutor: Arc<Tutor>,
}
