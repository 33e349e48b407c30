use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::models::api::{RootResponse, StudyBuddyRequest, StudyBuddyResponse};
use crate::routes::error::ApiError;

/// Tutor routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(root).post(study_buddy))
}

/// GET / - Liveness greeting.
async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Hello StudyBuddy!".to_string(),
    })
}

/// POST / - Answer a student's question from the lecture slides.
async fn study_buddy(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StudyBuddyRequest>,
) -> Result<Json<StudyBuddyResponse>, ApiError> {
    // 1. Retrieve once; the same context feeds the answer and the response.
    let context = state
        .retriever
        .retrieve_relevant_chunks(&req.prompt, state.settings.api_top_k)
        .await
        .map_err(ApiError::Retrieval)?;

    // 2. Answer in the index language.
    let answer = state
        .tutor
        .answer_with_context(&req.prompt, &context.formatted)
        .await
        .map_err(ApiError::Generation)?;

    // 3. Translate for the student.
    let response = state
        .tutor
        .translate_response(&answer, &state.settings.answer_language)
        .await
        .map_err(ApiError::Translation)?;

    info!(
        "Answered {:?} (searched as {:?}) with {} chunks in {}",
        context.query,
        context.translated_query,
        context.count(),
        state.settings.answer_language
    );

    Ok(Json(StudyBuddyResponse {
        response,
        total_chunks: context.count(),
        sample_chunks: context.formatted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::tests::{memory_index, memory_settings};
    use crate::config::Settings;
    use crate::indexer::Indexer;
    use crate::models::chunk::save_chunks;
    use crate::retriever::Retriever;
    use crate::routes::build_router;
    use crate::testing::{fake_translator, FakeCompletion, FAKE_ANSWER};
    use crate::tutor::Tutor;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn test_router(model: FakeCompletion) -> (tempfile::TempDir, Router) {
        test_router_with(model, |_| {}).await
    }

    async fn test_router_with(
        model: FakeCompletion,
        configure: impl FnOnce(&mut Settings),
    ) -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.json");
        save_chunks(
            &[
                "The CPU schedules processes.".to_string(),
                "A process is a unit of execution.".to_string(),
            ],
            &path,
        )
        .unwrap();

        let mut settings = memory_settings(&path);
        configure(&mut settings);
        let index = memory_index();
        Indexer::new(&settings, index.clone())
            .await
            .unwrap()
            .upload_documents()
            .await
            .unwrap();

        let model = Arc::new(model);
        let translator = fake_translator(model.clone());
        let retriever = Arc::new(Retriever::new(
            index,
            settings.index_name.clone(),
            translator.clone(),
            settings.query_language.clone(),
        ));
        let tutor = Arc::new(Tutor::new(
            retriever.clone(),
            translator,
            model,
            settings.answer_template.clone(),
            settings.answer_top_k,
        ));

        let state = Arc::new(AppState {
            settings,
            retriever,
            tutor,
        });
        (dir, build_router(state))
    }

    fn ask(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_greeting() {
        let (_dir, app) = test_router(FakeCompletion::new()).await;
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "Hello StudyBuddy!");
    }

    #[tokio::test]
    async fn test_question_is_answered_and_translated() {
        let (_dir, app) = test_router(FakeCompletion::new()).await;
        let response = app.oneshot(ask(r#"{"prompt": "What is a process?"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: StudyBuddyResponse = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(body.response, format!("[Chinese] {FAKE_ANSWER}"));
        assert_eq!(body.total_chunks, 2);
        assert!(body.sample_chunks.starts_with("- A process is a unit of execution."));
    }

    #[tokio::test]
    async fn test_query_translation_failure_still_answers() {
        // German is the query language; the Chinese answer translation works.
        let (_dir, app) = test_router(FakeCompletion::new().failing_translation_into("German")).await;
        let response = app.oneshot(ask(r#"{"prompt": "What is a process?"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: StudyBuddyResponse = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(body.response, format!("[Chinese] {FAKE_ANSWER}"));
        assert_eq!(body.total_chunks, 2);
        assert!(body.sample_chunks.starts_with("- A process is a unit of execution."));
    }

    #[tokio::test]
    async fn test_answer_translation_failure_is_bad_gateway() {
        let (_dir, app) = test_router(FakeCompletion::new().failing_translation_into("Chinese")).await;
        let response = app.oneshot(ask(r#"{"prompt": "What is a process?"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert_eq!(body["stage"], "translation");
        assert!(body["error"].as_str().unwrap().contains("translation to Chinese failed"));
    }

    #[tokio::test]
    async fn test_api_top_k_limits_returned_chunks() {
        let (_dir, app) = test_router_with(FakeCompletion::new(), |settings| settings.api_top_k = 1).await;
        let response = app.oneshot(ask(r#"{"prompt": "What is a process?"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: StudyBuddyResponse = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(body.total_chunks, 1);
        assert!(body.sample_chunks.starts_with("- A process is a unit of execution."));
        assert!(!body.sample_chunks.contains("The CPU schedules processes."));
    }

    #[tokio::test]
    async fn test_generation_failure_is_bad_gateway() {
        let (_dir, app) = test_router(FakeCompletion::new().failing_answer()).await;
        let response = app.oneshot(ask(r#"{"prompt": "What is a process?"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert_eq!(body["stage"], "generation");
        assert!(body["error"].as_str().unwrap().contains("answer backend unavailable"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let (_dir, app) = test_router(FakeCompletion::new()).await;
        let response = app.oneshot(ask(r#"{"question": 1}"#)).await.unwrap();
        assert!(response.status().is_client_error());
    }
}
