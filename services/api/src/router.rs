//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ChatMessage, ChatRequest, ChatResponse, CreateSessionPayload, ErrorResponse,
        FeedbackRequest, FeedbackResponse, MessageRole, ScenarioPayload, ScenarioPreset,
        SessionCreated, SessionView, StatusResponse, TtsRequest, TurnPayload, TurnReply,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::status,
        handlers::list_scenarios,
        handlers::random_scenario,
        handlers::chat,
        handlers::tts,
        handlers::feedback,
        handlers::create_session,
        handlers::get_session,
        handlers::post_turn,
        handlers::session_feedback,
        handlers::reset_session,
        handlers::delete_session,
    ),
    components(
        schemas(
            ChatMessage, ChatRequest, ChatResponse, CreateSessionPayload, ErrorResponse,
            FeedbackRequest, FeedbackResponse, MessageRole, ScenarioPayload, ScenarioPreset,
            SessionCreated, SessionView, StatusResponse, TtsRequest, TurnPayload, TurnReply
        )
    ),
    tags(
        (name = "PitchPerfect API", description = "Sales pitch practice against a simulated prospect")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/api/status", get(handlers::status))
        .route("/api/scenarios", get(handlers::list_scenarios))
        .route("/api/scenarios/random", get(handlers::random_scenario))
        .route("/api/chat", post(handlers::chat))
        .route("/api/tts", post(handlers::tts))
        .route("/api/feedback", post(handlers::feedback))
        .route("/api/sessions", post(handlers::create_session))
        .route(
            "/api/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/api/sessions/{id}/turns", post(handlers::post_turn))
        .route(
            "/api/sessions/{id}/feedback",
            post(handlers::session_feedback),
        )
        .route("/api/sessions/{id}/reset", post(handlers::reset_session))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
