use axum::{
    Json,
    extract::{Path, State},
};
use huddle_db::models::{Participant, ParticipantRole, ParticipantStatus};
use huddle_services::meeting::{JoinOutcome, JoinRequest};
use serde::{Deserialize, Serialize};

use super::meeting::{MeetingResponse, to_response as meeting_response};
use super::{opt_timestamp, timestamp};
use crate::{
    error::ApiError,
    extractors::auth::{AuthUser, MaybeAuthUser},
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct RemoveRequest {
    #[serde(default)]
    pub ban: bool,
}

#[derive(Debug, Serialize)]
pub struct ParticipantResponse {
    pub id: String,
    pub meeting_id: String,
    pub user_id: Option<String>,
    pub display_name: String,
    pub role: ParticipantRole,
    pub status: ParticipantStatus,
    pub sessions: Vec<SessionResponse>,
    pub total_duration_sec: i64,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub joined_at: String,
    pub left_at: Option<String>,
    pub duration_sec: i64,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub meeting: MeetingResponse,
    pub participant: ParticipantResponse,
}

// ---- POST /api/join/{code} (auth optional) ---------------------------------

pub async fn join(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    Path(code): Path<String>,
    Json(body): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, ApiError> {
    let actor = auth.actor();
    let JoinOutcome {
        meeting,
        participant,
    } = state
        .meetings
        .join_by_code(&code, body, actor.as_ref())
        .await?;
    Ok(Json(JoinResponse {
        meeting: meeting_response(meeting),
        participant: to_response(participant),
    }))
}

pub async fn leave(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let participant = state.meetings.leave(&meeting_id, &auth.actor()).await?;
    Ok(Json(to_response(participant)))
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<Vec<ParticipantResponse>>, ApiError> {
    let participants = state.meetings.list_participants(&meeting_id).await?;
    Ok(Json(participants.into_iter().map(to_response).collect()))
}

pub async fn admit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((meeting_id, participant_id)): Path<(String, String)>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let participant = state
        .meetings
        .admit_participant(&meeting_id, &participant_id, &auth.actor())
        .await?;
    Ok(Json(to_response(participant)))
}

pub async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((meeting_id, participant_id)): Path<(String, String)>,
    Json(body): Json<RemoveRequest>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let participant = state
        .meetings
        .remove_participant(&meeting_id, &participant_id, body.ban, &auth.actor())
        .await?;
    Ok(Json(to_response(participant)))
}

fn to_response(p: Participant) -> ParticipantResponse {
    ParticipantResponse {
        id: p.id.map(|id| id.to_hex()).unwrap_or_default(),
        meeting_id: p.meeting_id.to_hex(),
        user_id: p.user_id.map(|id| id.to_hex()),
        display_name: p.display_name,
        role: p.role,
        status: p.status,
        sessions: p
            .sessions
            .into_iter()
            .map(|s| SessionResponse {
                joined_at: timestamp(s.joined_at),
                left_at: opt_timestamp(s.left_at),
                duration_sec: s.duration_sec,
            })
            .collect(),
        total_duration_sec: p.total_duration_sec,
        created_at: timestamp(p.created_at),
    }
}
