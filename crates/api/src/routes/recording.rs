use axum::{
    Json,
    extract::{Path, State},
};

use super::meeting::{RecordingResponse, recording_response};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

pub async fn info(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<RecordingResponse>, ApiError> {
    let recording = state
        .meetings
        .get_recording_info(&meeting_id, &auth.actor())
        .await?;
    Ok(Json(recording_response(recording)))
}

pub async fn start(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<RecordingResponse>, ApiError> {
    let meeting = state
        .meetings
        .start_recording(&meeting_id, &auth.actor())
        .await?;
    Ok(Json(recording_response(meeting.recording)))
}

pub async fn pause(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<RecordingResponse>, ApiError> {
    let meeting = state
        .meetings
        .pause_recording(&meeting_id, &auth.actor())
        .await?;
    Ok(Json(recording_response(meeting.recording)))
}

pub async fn resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<RecordingResponse>, ApiError> {
    let meeting = state
        .meetings
        .resume_recording(&meeting_id, &auth.actor())
        .await?;
    Ok(Json(recording_response(meeting.recording)))
}

pub async fn stop(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<RecordingResponse>, ApiError> {
    let meeting = state
        .meetings
        .stop_recording(&meeting_id, &auth.actor())
        .await?;
    Ok(Json(recording_response(meeting.recording)))
}

/// Admin only.
pub async fn purge(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<RecordingResponse>, ApiError> {
    let meeting = state
        .meetings
        .purge_recording(&meeting_id, &auth.actor())
        .await?;
    Ok(Json(recording_response(meeting.recording)))
}
