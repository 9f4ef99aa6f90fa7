use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::billing::entitlement::{evaluate, Entitlement};
use crate::errors::AppError;
use crate::interview::models::SetupPatch;
use crate::interview::records::{summarize, DashboardStats};
use crate::interview::service;
use crate::interview::session::InterviewSession;
use crate::interview::speech::{CaptureMode, RecognitionSegment};
use crate::models::interview::InterviewRecordRow;
use crate::state::AppState;

const MARKDOWN: &str = "text/markdown; charset=utf-8";

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default = "default_true")]
    pub recognition_supported: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioAction {
    Start,
    Stop,
}

#[derive(Debug, Deserialize)]
pub struct AudioRequest {
    pub action: AudioAction,
}

#[derive(Debug, Serialize)]
pub struct PlaybackResponse {
    pub session: InterviewSession,
    /// Text for the browser to synthesize; absent when stopping.
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    pub session: InterviewSession,
    pub mode: Option<CaptureMode>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptResultsRequest {
    pub segments: Vec<RecognitionSegment>,
}

#[derive(Debug, Deserialize)]
pub struct EditTranscriptRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    #[serde(default)]
    pub confirm_skip: bool,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub interviews: Vec<InterviewRecordRow>,
    pub stats: DashboardStats,
    pub entitlement: Entitlement,
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<InterviewSession>), AppError> {
    let session = service::create_session(&state, user.user_id, req.recognition_supported).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<InterviewSession>, AppError> {
    Ok(Json(service::load_owned(&state, user.user_id, id).await?))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_reset_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    service::reset_session(&state, user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/sessions/:id/setup
pub async fn handle_update_setup(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<SetupPatch>,
) -> Result<Json<InterviewSession>, AppError> {
    Ok(Json(service::update_setup(&state, user.user_id, id, patch).await?))
}

/// POST /api/v1/sessions/:id/start
pub async fn handle_start_interview(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<InterviewSession>, AppError> {
    Ok(Json(service::start_interview(&state, user.user_id, id).await?))
}

/// POST /api/v1/sessions/:id/speech/playback
pub async fn handle_playback(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AudioRequest>,
) -> Result<Json<PlaybackResponse>, AppError> {
    let response = match req.action {
        AudioAction::Start => {
            let (session, text) = service::start_playback(&state, user.user_id, id).await?;
            PlaybackResponse {
                session,
                text: Some(text),
            }
        }
        AudioAction::Stop => PlaybackResponse {
            session: service::stop_playback(&state, user.user_id, id).await?,
            text: None,
        },
    };
    Ok(Json(response))
}

/// POST /api/v1/sessions/:id/speech/capture
pub async fn handle_capture(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AudioRequest>,
) -> Result<Json<CaptureResponse>, AppError> {
    let response = match req.action {
        AudioAction::Start => {
            let (session, mode) = service::start_capture(&state, user.user_id, id).await?;
            CaptureResponse {
                session,
                mode: Some(mode),
            }
        }
        AudioAction::Stop => CaptureResponse {
            session: service::stop_capture(&state, user.user_id, id).await?,
            mode: None,
        },
    };
    Ok(Json(response))
}

/// POST /api/v1/sessions/:id/transcript/results
pub async fn handle_transcript_results(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TranscriptResultsRequest>,
) -> Result<Json<InterviewSession>, AppError> {
    Ok(Json(
        service::record_speech(&state, user.user_id, id, &req.segments).await?,
    ))
}

/// PUT /api/v1/sessions/:id/transcript
pub async fn handle_edit_transcript(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<EditTranscriptRequest>,
) -> Result<Json<InterviewSession>, AppError> {
    Ok(Json(
        service::edit_transcript(&state, user.user_id, id, req.text).await?,
    ))
}

/// POST /api/v1/sessions/:id/answers
pub async fn handle_submit_answer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<Json<InterviewSession>, AppError> {
    Ok(Json(
        service::submit_answer(&state, user.user_id, id, req.confirm_skip).await?,
    ))
}

/// POST /api/v1/sessions/:id/score
pub async fn handle_retry_scoring(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<InterviewSession>, AppError> {
    Ok(Json(service::retry_scoring(&state, user.user_id, id).await?))
}

/// POST /api/v1/sessions/:id/persist
pub async fn handle_retry_persist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<InterviewSession>, AppError> {
    Ok(Json(service::retry_persist(&state, user.user_id, id).await?))
}

/// GET /api/v1/sessions/:id/report/export
pub async fn handle_export_session_report(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let markdown = service::export_session_report(&state, user.user_id, id).await?;
    Ok(([(header::CONTENT_TYPE, MARKDOWN)], markdown))
}

/// GET /api/v1/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<DashboardResponse>, AppError> {
    let interviews = state.records.list(user.user_id).await?;
    let stats = summarize(&interviews);
    let subscription = state.usage.subscription(user.user_id).await?;
    Ok(Json(DashboardResponse {
        interviews,
        stats,
        entitlement: evaluate(&subscription, Utc::now()),
    }))
}

/// GET /api/v1/interviews/:id
pub async fn handle_get_interview(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<InterviewRecordRow>, AppError> {
    let row = state.records.get(user.user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Interview {id} not found")))?;
    Ok(Json(row))
}

/// GET /api/v1/interviews/:id/export
pub async fn handle_export_interview(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let markdown = service::export_saved_report(&state, user.user_id, id).await?;
    Ok(([(header::CONTENT_TYPE, MARKDOWN)], markdown))
}
