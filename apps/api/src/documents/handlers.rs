use axum::{extract::Multipart, Json};
use serde::Serialize;
use tracing::info;

use crate::documents::{detect_kind, extract_text, DocumentError};
use crate::errors::AppError;

/// Upload ceiling for resumes and job descriptions.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct ParsedDocument {
    pub text: String,
}

/// POST /api/v1/documents/parse
/// Multipart upload with a single `file` field.
pub async fn handle_parse_document(
    mut multipart: Multipart,
) -> Result<Json<ParsedDocument>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;

        let kind = detect_kind(&filename, content_type.as_deref(), &bytes)?;
        let size = bytes.len();
        let text = tokio::task::spawn_blocking(move || extract_text(kind, &bytes))
            .await
            .map_err(|e| DocumentError::Unreadable(format!("extraction task failed: {e}")))??;

        info!(
            "Parsed {kind:?} upload '{filename}' ({size} bytes -> {} chars)",
            text.len()
        );
        return Ok(Json(ParsedDocument { text }));
    }

    Err(AppError::Validation(
        "Missing 'file' field in upload".to_string(),
    ))
}
