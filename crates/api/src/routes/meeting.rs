use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use huddle_db::models::{Meeting, MeetingRecording, MeetingStatus, RecordingStatus};
use huddle_services::{
    dao::{MeetingFilter, PaginatedResult, PaginationParams},
    meeting::{CreateMeetingInput, MeetingPatch, host},
};
use serde::{Deserialize, Serialize};

use super::{opt_timestamp, timestamp};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<MeetingStatus>,
    pub host_id: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl ListQuery {
    fn pagination(&self) -> PaginationParams {
        let defaults = PaginationParams::default();
        PaginationParams {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransferHostRequest {
    pub new_host_id: String,
}

#[derive(Debug, Serialize)]
pub struct MeetingResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: MeetingStatus,
    pub original_host_id: Option<String>,
    pub current_host_id: Option<String>,
    pub invite_code: String,
    pub is_private: bool,
    pub is_locked: bool,
    pub scheduled_for: Option<String>,
    pub actual_start_at: Option<String>,
    pub ended_at: Option<String>,
    pub canceled_at: Option<String>,
    pub duration_min: Option<i64>,
    pub max_participants: u32,
    pub participant_count: u32,
    pub recording: RecordingResponse,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    pub is_recording: bool,
    pub recording_id: Option<String>,
    pub status: RecordingStatus,
    pub started_at: Option<String>,
    pub paused_at: Option<String>,
    pub resumed_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_sec: i64,
    pub url: Option<String>,
    pub size_bytes: Option<i64>,
    pub failure_reason: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateMeetingInput>,
) -> Result<(StatusCode, Json<MeetingResponse>), ApiError> {
    let meeting = state.meetings.create(body, &auth.actor()).await?;
    Ok((StatusCode::CREATED, Json(to_response(meeting))))
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaginatedResult<MeetingResponse>>, ApiError> {
    let host_id = query
        .host_id
        .as_deref()
        .map(|raw| bson::oid::ObjectId::parse_str(raw.trim()))
        .transpose()
        .map_err(|_| ApiError::BadRequest("Invalid host_id".to_string()))?;
    let filter = MeetingFilter {
        status: query.status,
        host_id,
        invite_code: None,
    };

    let result = state.meetings.list(&filter, &query.pagination()).await?;
    Ok(Json(result.map(to_response)))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<MeetingResponse>, ApiError> {
    let meeting = state.meetings.get(&meeting_id).await?;
    Ok(Json(to_response(meeting)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
    Json(body): Json<MeetingPatch>,
) -> Result<Json<MeetingResponse>, ApiError> {
    let meeting = state.meetings.update(&meeting_id, body, &auth.actor()).await?;
    Ok(Json(to_response(meeting)))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.meetings.delete(&meeting_id, &auth.actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn start(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<MeetingResponse>, ApiError> {
    let meeting = state.meetings.start(&meeting_id, &auth.actor()).await?;
    Ok(Json(to_response(meeting)))
}

pub async fn end(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<MeetingResponse>, ApiError> {
    let meeting = state.meetings.end(&meeting_id, &auth.actor()).await?;
    Ok(Json(to_response(meeting)))
}

pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<MeetingResponse>, ApiError> {
    let meeting = state.meetings.cancel(&meeting_id, &auth.actor()).await?;
    Ok(Json(to_response(meeting)))
}

pub async fn rotate_invite_code(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<MeetingResponse>, ApiError> {
    let meeting = state
        .meetings
        .rotate_invite_code(&meeting_id, &auth.actor())
        .await?;
    Ok(Json(to_response(meeting)))
}

pub async fn lock(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<MeetingResponse>, ApiError> {
    let meeting = state.meetings.lock_room(&meeting_id, &auth.actor()).await?;
    Ok(Json(to_response(meeting)))
}

pub async fn unlock(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<MeetingResponse>, ApiError> {
    let meeting = state.meetings.unlock_room(&meeting_id, &auth.actor()).await?;
    Ok(Json(to_response(meeting)))
}

pub async fn transfer_host(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
    Json(body): Json<TransferHostRequest>,
) -> Result<Json<MeetingResponse>, ApiError> {
    let meeting = state
        .meetings
        .transfer_host(&meeting_id, &body.new_host_id, &auth.actor())
        .await?;
    Ok(Json(to_response(meeting)))
}

// ---- Helpers -------------------------------------------------------------

/// Host fields are resolved once per read: a legacy record without a
/// current host reports its creator in both.
pub(crate) fn to_response(m: Meeting) -> MeetingResponse {
    let hosts = host::normalize(&m);
    MeetingResponse {
        id: m.id.map(|id| id.to_hex()).unwrap_or_default(),
        title: m.title,
        description: m.description,
        status: m.status,
        original_host_id: hosts.original.map(|id| id.to_hex()),
        current_host_id: hosts.current.map(|id| id.to_hex()),
        invite_code: m.invite_code,
        is_private: m.is_private,
        is_locked: m.is_locked,
        scheduled_for: opt_timestamp(m.scheduled_for),
        actual_start_at: opt_timestamp(m.actual_start_at),
        ended_at: opt_timestamp(m.ended_at),
        canceled_at: opt_timestamp(m.canceled_at),
        duration_min: m.duration_min,
        max_participants: m.max_participants,
        participant_count: m.participant_count,
        recording: recording_response(m.recording),
        created_at: timestamp(m.created_at),
        updated_at: timestamp(m.updated_at),
    }
}

pub(crate) fn recording_response(r: MeetingRecording) -> RecordingResponse {
    RecordingResponse {
        is_recording: r.is_recording,
        recording_id: r.recording_id,
        status: r.status,
        started_at: opt_timestamp(r.started_at),
        paused_at: opt_timestamp(r.paused_at),
        resumed_at: opt_timestamp(r.resumed_at),
        ended_at: opt_timestamp(r.ended_at),
        duration_sec: r.duration_sec,
        url: r.url,
        size_bytes: r.size_bytes,
        failure_reason: r.failure_reason,
    }
}
