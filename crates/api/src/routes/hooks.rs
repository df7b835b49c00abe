use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use huddle_services::media::{CaptureEvent, SIGNATURE_HEADER, verify_capture_signature};
use huddle_services::meeting::CaptureDisposition;
use tracing::debug;

use crate::{error::ApiError, state::AppState};

// ---- POST /api/hooks/capture (no auth, signed raw body) --------------------

pub async fn capture(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CaptureDisposition>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing capture signature".to_string()))?;

    if !verify_capture_signature(&state.settings.capture.webhook_secret, &body, signature) {
        return Err(ApiError::Unauthorized("Invalid capture signature".to_string()));
    }

    let event: CaptureEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid event payload: {e}")))?;
    debug!(capture_id = %event.capture_id, status = ?event.status, "Capture event received");

    let disposition = state.meetings.on_capture_event(&event).await?;
    Ok(Json(disposition))
}
