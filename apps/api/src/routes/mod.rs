pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};

use crate::auth::handle_logout;
use crate::billing::handlers as billing;
use crate::documents::handlers::{handle_parse_document, MAX_UPLOAD_BYTES};
use crate::interview::handlers as interview;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Documents (no auth)
        .route(
            "/api/v1/documents/parse",
            post(handle_parse_document).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        // Interview sessions
        .route("/api/v1/sessions", post(interview::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(interview::handle_get_session).delete(interview::handle_reset_session),
        )
        .route(
            "/api/v1/sessions/:id/setup",
            patch(interview::handle_update_setup),
        )
        .route(
            "/api/v1/sessions/:id/start",
            post(interview::handle_start_interview),
        )
        .route(
            "/api/v1/sessions/:id/speech/playback",
            post(interview::handle_playback),
        )
        .route(
            "/api/v1/sessions/:id/speech/capture",
            post(interview::handle_capture),
        )
        .route(
            "/api/v1/sessions/:id/transcript/results",
            post(interview::handle_transcript_results),
        )
        .route(
            "/api/v1/sessions/:id/transcript",
            put(interview::handle_edit_transcript),
        )
        .route(
            "/api/v1/sessions/:id/answers",
            post(interview::handle_submit_answer),
        )
        .route(
            "/api/v1/sessions/:id/score",
            post(interview::handle_retry_scoring),
        )
        .route(
            "/api/v1/sessions/:id/persist",
            post(interview::handle_retry_persist),
        )
        .route(
            "/api/v1/sessions/:id/report/export",
            get(interview::handle_export_session_report),
        )
        // History
        .route("/api/v1/dashboard", get(interview::handle_dashboard))
        .route("/api/v1/interviews/:id", get(interview::handle_get_interview))
        .route(
            "/api/v1/interviews/:id/export",
            get(interview::handle_export_interview),
        )
        // Billing
        .route("/api/v1/entitlement", get(billing::handle_get_entitlement))
        .route("/api/v1/billing/orders", post(billing::handle_create_order))
        .route("/api/v1/billing/verify", post(billing::handle_verify_payment))
        // Auth
        .route("/api/v1/auth/logout", post(handle_logout))
        .with_state(state)
}
