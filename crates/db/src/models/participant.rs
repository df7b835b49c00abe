use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub meeting_id: ObjectId,
    /// Absent for guests joining by invite code without an account.
    pub user_id: Option<ObjectId>,
    pub display_name: String,
    #[serde(default)]
    pub role: ParticipantRole,
    #[serde(default)]
    pub mic_state: DeviceState,
    #[serde(default)]
    pub camera_state: DeviceState,
    #[serde(default)]
    pub status: ParticipantStatus,
    #[serde(default)]
    pub sessions: Vec<ParticipantSession>,
    #[serde(default)]
    pub total_duration_sec: i64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Host,
    CoHost,
    Presenter,
    #[default]
    Participant,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    On,
    #[default]
    Off,
    Muted,
    MutedByHost,
    OffByHost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    #[default]
    Waiting,
    Approved,
    Admitted,
    Left,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Waiting => "waiting",
            ParticipantStatus::Approved => "approved",
            ParticipantStatus::Admitted => "admitted",
            ParticipantStatus::Left => "left",
        }
    }

    /// Statuses that count as still attached to the meeting.
    pub const ACTIVE: [ParticipantStatus; 3] = [
        ParticipantStatus::Waiting,
        ParticipantStatus::Approved,
        ParticipantStatus::Admitted,
    ];
}

/// One contiguous join-to-leave interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSession {
    pub joined_at: DateTime,
    pub left_at: Option<DateTime>,
    #[serde(default)]
    pub duration_sec: i64,
}

impl ParticipantSession {
    pub fn is_open(&self) -> bool {
        self.left_at.is_none()
    }
}

impl Participant {
    pub const COLLECTION: &'static str = "participants";

    pub fn open_session(&self) -> Option<&ParticipantSession> {
        self.sessions.iter().find(|s| s.is_open())
    }

    pub fn closed_duration_sum(&self) -> i64 {
        self.sessions
            .iter()
            .filter(|s| !s.is_open())
            .map(|s| s.duration_sec)
            .sum()
    }
}
