pub mod error;
pub mod tutor;

use axum::Router;
use std::sync::Arc;

use crate::app::AppState;

/// Build all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new().merge(tutor::routes()).with_state(state)
}
