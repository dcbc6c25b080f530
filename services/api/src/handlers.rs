//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for practice
//! conversations, speech and feedback. It uses `utoipa` doc comments to
//! generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use pitchperfect_core::{
    CoachError,
    scenario::{PRESETS, Scenario},
    speech::AUDIO_MIME,
    turn::Turn,
};
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    models::{
        ChatMessage, ChatRequest, ChatResponse, CreateSessionPayload, ErrorResponse,
        FeedbackRequest, FeedbackResponse, ScenarioPayload, ScenarioPreset, SessionCreated,
        SessionView, StatusResponse, TtsRequest, TurnPayload, TurnReply,
    },
    state::AppState,
};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Coach(CoachError),
    Timeout(Duration),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message))).into_response()
            }
            ApiError::Timeout(limit) => {
                warn!(?limit, "Upstream call timed out");
                let message = format!("Upstream service did not answer within {:?}", limit);
                (StatusCode::GATEWAY_TIMEOUT, Json(ErrorResponse::new(message))).into_response()
            }
            ApiError::Coach(CoachError::InvalidRequest(message)) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
            }
            ApiError::Coach(CoachError::UpstreamRejected { status, body }) => {
                warn!(upstream_status = status, "Upstream service rejected the request");
                let response = ErrorResponse {
                    message: "Upstream service rejected the request".to_string(),
                    upstream_status: Some(status),
                    details: Some(body),
                };
                (StatusCode::BAD_GATEWAY, Json(response)).into_response()
            }
            ApiError::Coach(CoachError::UpstreamUnavailable(reason)) => {
                warn!(%reason, "Upstream service unavailable");
                let response = ErrorResponse {
                    details: Some(reason),
                    ..ErrorResponse::new("Upstream service unavailable")
                };
                (StatusCode::SERVICE_UNAVAILABLE, Json(response)).into_response()
            }
            ApiError::Coach(CoachError::MalformedUpstreamResponse(reason)) => {
                error!(%reason, "Malformed upstream response");
                let response = ErrorResponse {
                    details: Some(reason),
                    ..ErrorResponse::new("Upstream service returned an unusable response")
                };
                (StatusCode::BAD_GATEWAY, Json(response)).into_response()
            }
        }
    }
}

impl From<CoachError> for ApiError {
    fn from(err: CoachError) -> Self {
        Self::Coach(err)
    }
}

/// Runs an upstream-bound operation under the configured deadline.
///
/// A timed-out operation is dropped before it records anything.
async fn with_deadline<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, CoachError>>,
) -> Result<T, ApiError> {
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| ApiError::Timeout(limit))?
        .map_err(ApiError::from)
}

fn session_not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Session {} not found", id))
}

/// Report which backends are configured.
#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "Backend configuration status", body = StatusResponse)
    )
)]
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let config = &state.config;
    Json(StatusResponse {
        google_api_key_present: config.google_api_key.is_some(),
        openai_api_key_present: config.openai_api_key.is_some(),
        eleven_labs_api_key_present: config.elevenlabs_api_key.is_some(),
        eleven_labs_voice_id_present: config.elevenlabs_voice_id.is_some(),
        provider: config.provider.to_string(),
        model: config.chat_model.clone(),
        active_sessions: state.sessions.len().await,
    })
}

/// List the built-in scenario presets.
#[utoipa::path(
    get,
    path = "/api/scenarios",
    responses(
        (status = 200, description = "Available presets", body = [ScenarioPreset])
    )
)]
pub async fn list_scenarios() -> Json<Vec<ScenarioPreset>> {
    Json(PRESETS.iter().map(ScenarioPreset::from).collect())
}

/// Draw a random practice scenario.
#[utoipa::path(
    get,
    path = "/api/scenarios/random",
    responses(
        (status = 200, description = "A random scenario", body = ScenarioPayload)
    )
)]
pub async fn random_scenario() -> Json<ScenarioPayload> {
    Json(ScenarioPayload::from(&Scenario::random()))
}

/// Get the prospect's next reply for a caller-held conversation history.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Prospect reply", body = ChatResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 502, description = "Upstream rejected the request", body = ErrorResponse),
        (status = 503, description = "Upstream unavailable", body = ErrorResponse),
        (status = 504, description = "Upstream timed out", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(history = payload.history.len()))]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let scenario = payload.scenario.map(Scenario::try_from).transpose()?;
    let history: Vec<Turn> = payload.history.iter().map(Turn::from).collect();

    let response = with_deadline(
        state.config.upstream_timeout,
        state
            .coach
            .reply_to_history(scenario.as_ref(), &history, &payload.message),
    )
    .await?;

    Ok(Json(ChatResponse { response }))
}

/// Synthesize speech for the given text.
#[utoipa::path(
    post,
    path = "/api/tts",
    request_body = TtsRequest,
    responses(
        (status = 200, description = "MPEG audio", content_type = "audio/mpeg", body = Vec<u8>),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 502, description = "Upstream rejected the request", body = ErrorResponse),
        (status = 503, description = "Speech not configured or unavailable", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(text_len = payload.text.len()))]
pub async fn tts(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TtsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let audio = with_deadline(
        state.config.upstream_timeout,
        state.coach.speak(&payload.text),
    )
    .await?;

    info!(bytes = audio.len(), "Speech synthesized");
    Ok(([(header::CONTENT_TYPE, AUDIO_MIME)], audio))
}

/// Generate a coaching report for a caller-held transcript.
#[utoipa::path(
    post,
    path = "/api/feedback",
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback report", body = FeedbackResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 502, description = "Upstream rejected the request", body = ErrorResponse),
        (status = 503, description = "Upstream unavailable", body = ErrorResponse),
        (status = 504, description = "Upstream timed out", body = ErrorResponse)
    )
)]
pub async fn feedback(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let scenario = Scenario::try_from(payload.scenario)?;

    let report = with_deadline(
        state.config.upstream_timeout,
        state.coach.feedback(&scenario, &payload.conversation),
    )
    .await?;

    Ok(Json(report.into()))
}

/// Start a server-held practice session.
#[utoipa::path(
    post,
    path = "/api/sessions",
    request_body = CreateSessionPayload,
    responses(
        (status = 201, description = "Session created successfully", body = SessionCreated),
        (status = 400, description = "Bad request", body = ErrorResponse)
    )
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let scenario = Scenario::try_from(payload.scenario)?;
    let scenario_view = ScenarioPayload::from(&scenario);

    let (session, opening_line) = state.coach.start_session(scenario);
    let (id, created_at) = state.sessions.insert(session).await;
    info!(session_id = %id, product = %scenario_view.product_name, "Session created");

    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            id,
            scenario: scenario_view,
            opening_line,
            created_at,
        }),
    ))
}

/// Get a session's turns and transcript.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    responses(
        (status = 200, description = "Session details", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let entry = state.sessions.get(id).await.ok_or_else(|| session_not_found(id))?;
    let entry = entry.lock().await;
    let (turns, transcript) = entry.session.snapshot();

    Ok(Json(SessionView {
        id,
        scenario: ScenarioPayload::from(entry.session.scenario()),
        turns: turns.iter().map(ChatMessage::from).collect(),
        transcript,
        created_at: entry.created_at,
    }))
}

/// Send the salesperson's next line and get the prospect's reply.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/turns",
    request_body = TurnPayload,
    responses(
        (status = 200, description = "Prospect reply", body = TurnReply),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 502, description = "Upstream rejected the request", body = ErrorResponse),
        (status = 503, description = "Upstream unavailable", body = ErrorResponse),
        (status = 504, description = "Upstream timed out", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
#[instrument(skip_all, fields(session_id = %id))]
pub async fn post_turn(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TurnPayload>,
) -> Result<Json<TurnReply>, ApiError> {
    let entry = state.sessions.get(id).await.ok_or_else(|| session_not_found(id))?;
    // Held across the upstream call so turns on one session stay ordered.
    let mut entry = entry.lock().await;

    let reply = with_deadline(
        state.config.upstream_timeout,
        state.coach.next_reply(&mut entry.session, &payload.text),
    )
    .await?;

    Ok(Json(TurnReply { reply }))
}

/// Generate a coaching report for everything said in a session so far.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/feedback",
    responses(
        (status = 200, description = "Feedback report", body = FeedbackResponse),
        (status = 400, description = "Session has no transcript", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 502, description = "Upstream rejected the request", body = ErrorResponse),
        (status = 503, description = "Upstream unavailable", body = ErrorResponse),
        (status = 504, description = "Upstream timed out", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
#[instrument(skip_all, fields(session_id = %id))]
pub async fn session_feedback(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let entry = state.sessions.get(id).await.ok_or_else(|| session_not_found(id))?;
    // Work from a copy so turns can continue while the analysis runs.
    let session = entry.lock().await.session.clone();

    let report = with_deadline(
        state.config.upstream_timeout,
        state.coach.session_feedback(&session),
    )
    .await?;

    Ok(Json(report.into()))
}

/// Clear a session's turns and transcript, keeping its scenario.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/reset",
    responses(
        (status = 204, description = "Session reset"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let entry = state.sessions.get(id).await.ok_or_else(|| session_not_found(id))?;
    entry.lock().await.session.reset();
    info!(session_id = %id, "Session reset");
    Ok(StatusCode::NO_CONTENT)
}

/// End a session and discard its state.
#[utoipa::path(
    delete,
    path = "/api/sessions/{id}",
    responses(
        (status = 204, description = "Session deleted"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.sessions.remove(id).await {
        return Err(session_not_found(id));
    }
    info!(session_id = %id, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}
