use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::user_ref::UserRef;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: MeetingStatus,
    /// Creator of the meeting. Never rewritten after insert.
    pub original_host_id: Option<UserRef>,
    /// Active host. Legacy documents may not carry it.
    pub current_host_id: Option<UserRef>,
    pub invite_code: String,
    #[serde(default)]
    pub is_private: bool,
    pub passcode_hash: Option<String>,
    #[serde(default)]
    pub is_locked: bool,
    pub scheduled_for: Option<DateTime>,
    pub actual_start_at: Option<DateTime>,
    pub ended_at: Option<DateTime>,
    pub canceled_at: Option<DateTime>,
    pub duration_min: Option<i64>,
    pub max_participants: u32,
    #[serde(default)]
    pub participant_count: u32,
    #[serde(default)]
    pub banned_user_ids: Vec<ObjectId>,
    #[serde(default)]
    pub recording: MeetingRecording,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    #[default]
    Created,
    Live,
    Ended,
    Canceled,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Scheduled => "scheduled",
            MeetingStatus::Created => "created",
            MeetingStatus::Live => "live",
            MeetingStatus::Ended => "ended",
            MeetingStatus::Canceled => "canceled",
        }
    }

    /// Ended and canceled meetings accept no further lifecycle transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MeetingStatus::Ended | MeetingStatus::Canceled)
    }
}

/// Recording sub-state carried on the meeting document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingRecording {
    #[serde(default)]
    pub is_recording: bool,
    pub recording_id: Option<String>,
    pub capture_id: Option<String>,
    #[serde(default)]
    pub status: RecordingStatus,
    pub started_at: Option<DateTime>,
    pub paused_at: Option<DateTime>,
    pub resumed_at: Option<DateTime>,
    pub ended_at: Option<DateTime>,
    #[serde(default)]
    pub duration_sec: i64,
    pub url: Option<String>,
    pub storage_ref: Option<String>,
    pub size_bytes: Option<i64>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    #[default]
    None,
    Recording,
    Paused,
    Stopped,
    Failed,
}

impl RecordingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingStatus::None => "none",
            RecordingStatus::Recording => "recording",
            RecordingStatus::Paused => "paused",
            RecordingStatus::Stopped => "stopped",
            RecordingStatus::Failed => "failed",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RecordingStatus::Recording | RecordingStatus::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordingStatus::Stopped | RecordingStatus::Failed)
    }
}

impl Meeting {
    pub const COLLECTION: &'static str = "meetings";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_document_without_current_host_or_recording_decodes() {
        let host = ObjectId::new();
        let now = DateTime::now();
        let doc = bson::doc! {
            "_id": ObjectId::new(),
            "title": "Legacy",
            "status": "scheduled",
            "original_host_id": host,
            "invite_code": "ABCD1234",
            "max_participants": 50,
            "created_at": now,
            "updated_at": now,
        };

        let meeting: Meeting = bson::from_document(doc).unwrap();
        assert_eq!(meeting.status, MeetingStatus::Scheduled);
        assert!(meeting.current_host_id.is_none());
        assert_eq!(meeting.original_host_id.and_then(|r| r.id()), Some(host));
        assert_eq!(meeting.recording.status, RecordingStatus::None);
        assert_eq!(meeting.participant_count, 0);
        assert!(meeting.banned_user_ids.is_empty());
    }

    #[test]
    fn status_strings_match_serde_names() {
        for status in [
            MeetingStatus::Scheduled,
            MeetingStatus::Created,
            MeetingStatus::Live,
            MeetingStatus::Ended,
            MeetingStatus::Canceled,
        ] {
            assert_eq!(bson::to_bson(&status).unwrap(), bson::Bson::String(status.as_str().into()));
        }
        for status in [
            RecordingStatus::None,
            RecordingStatus::Recording,
            RecordingStatus::Paused,
            RecordingStatus::Stopped,
            RecordingStatus::Failed,
        ] {
            assert_eq!(bson::to_bson(&status).unwrap(), bson::Bson::String(status.as_str().into()));
        }
    }
}
