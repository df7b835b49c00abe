//! Store seams for meetings and participants.
//!
//! Every mutating method is a single conditional write: the precondition is
//! evaluated by the store together with the update, never as a separate read.
//! [`super::meeting::MeetingDao`] and [`super::participant::ParticipantDao`]
//! implement these against MongoDB, [`super::memory`] in process.

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use huddle_db::models::{
    Meeting, MeetingRecording, MeetingStatus, Participant, ParticipantSession,
    ParticipantStatus, RecordingStatus, UserRef,
};

use super::base::{DaoResult, PaginatedResult, PaginationParams};

/// Preconditions a meeting must satisfy for a guarded write to apply.
#[derive(Debug, Clone, Default)]
pub struct MeetingGuard {
    pub status_in: Option<Vec<MeetingStatus>>,
    pub recording_status_in: Option<Vec<RecordingStatus>>,
    /// Recording sub-state as last read; the write only applies while the
    /// transition-relevant fields are still the same.
    pub recording_snapshot: Option<RecordingSnapshot>,
    pub capture_id: Option<String>,
}

/// Fields every recording transition rewrites.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSnapshot {
    pub recording_id: Option<String>,
    pub status: RecordingStatus,
    pub paused_at: Option<DateTime>,
    pub resumed_at: Option<DateTime>,
    pub duration_sec: i64,
}

impl From<&MeetingRecording> for RecordingSnapshot {
    fn from(recording: &MeetingRecording) -> Self {
        Self {
            recording_id: recording.recording_id.clone(),
            status: recording.status,
            paused_at: recording.paused_at,
            resumed_at: recording.resumed_at,
            duration_sec: recording.duration_sec,
        }
    }
}

impl MeetingGuard {
    /// Matches any existing meeting.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn status_in(statuses: &[MeetingStatus]) -> Self {
        Self {
            status_in: Some(statuses.to_vec()),
            ..Self::default()
        }
    }

    pub fn recording_status_in(mut self, statuses: &[RecordingStatus]) -> Self {
        self.recording_status_in = Some(statuses.to_vec());
        self
    }

    pub fn recording_unchanged(mut self, recording: &MeetingRecording) -> Self {
        self.recording_snapshot = Some(recording.into());
        self
    }

    pub fn capture_id(mut self, capture_id: &str) -> Self {
        self.capture_id = Some(capture_id.to_string());
        self
    }

    pub fn matches(&self, meeting: &Meeting) -> bool {
        if let Some(statuses) = &self.status_in {
            if !statuses.contains(&meeting.status) {
                return false;
            }
        }
        if let Some(statuses) = &self.recording_status_in {
            if !statuses.contains(&meeting.recording.status) {
                return false;
            }
        }
        if let Some(snapshot) = &self.recording_snapshot {
            if RecordingSnapshot::from(&meeting.recording) != *snapshot {
                return false;
            }
        }
        if let Some(capture_id) = &self.capture_id {
            if meeting.recording.capture_id.as_deref() != Some(capture_id.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Field-level meeting update. `None` leaves a field untouched; for nullable
/// fields `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct MeetingUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<MeetingStatus>,
    pub current_host_id: Option<ObjectId>,
    pub invite_code: Option<String>,
    pub is_private: Option<bool>,
    pub passcode_hash: Option<Option<String>>,
    pub is_locked: Option<bool>,
    pub scheduled_for: Option<Option<DateTime>>,
    pub actual_start_at: Option<DateTime>,
    pub ended_at: Option<DateTime>,
    pub canceled_at: Option<DateTime>,
    pub duration_min: Option<i64>,
    pub max_participants: Option<u32>,
    pub participant_count: Option<u32>,
    pub ban_user_id: Option<ObjectId>,
    pub recording: Option<MeetingRecording>,
}

impl MeetingUpdate {
    pub fn apply_to(&self, meeting: &mut Meeting, now: DateTime) {
        if let Some(title) = &self.title {
            meeting.title = title.clone();
        }
        if let Some(description) = &self.description {
            meeting.description = description.clone();
        }
        if let Some(status) = self.status {
            meeting.status = status;
        }
        if let Some(host) = self.current_host_id {
            meeting.current_host_id = Some(UserRef::Id(host));
        }
        if let Some(code) = &self.invite_code {
            meeting.invite_code = code.clone();
        }
        if let Some(is_private) = self.is_private {
            meeting.is_private = is_private;
        }
        if let Some(hash) = &self.passcode_hash {
            meeting.passcode_hash = hash.clone();
        }
        if let Some(is_locked) = self.is_locked {
            meeting.is_locked = is_locked;
        }
        if let Some(scheduled_for) = self.scheduled_for {
            meeting.scheduled_for = scheduled_for;
        }
        if let Some(at) = self.actual_start_at {
            meeting.actual_start_at = Some(at);
        }
        if let Some(at) = self.ended_at {
            meeting.ended_at = Some(at);
        }
        if let Some(at) = self.canceled_at {
            meeting.canceled_at = Some(at);
        }
        if let Some(duration) = self.duration_min {
            meeting.duration_min = Some(duration);
        }
        if let Some(max) = self.max_participants {
            meeting.max_participants = max;
        }
        if let Some(count) = self.participant_count {
            meeting.participant_count = count;
        }
        if let Some(user_id) = self.ban_user_id {
            if !meeting.banned_user_ids.contains(&user_id) {
                meeting.banned_user_ids.push(user_id);
            }
        }
        if let Some(recording) = &self.recording {
            meeting.recording = recording.clone();
        }
        meeting.updated_at = now;
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeetingFilter {
    pub status: Option<MeetingStatus>,
    /// Matches either the original or the current host.
    pub host_id: Option<ObjectId>,
    pub invite_code: Option<String>,
}

impl MeetingFilter {
    pub fn matches(&self, meeting: &Meeting) -> bool {
        if let Some(status) = self.status {
            if meeting.status != status {
                return false;
            }
        }
        if let Some(host_id) = self.host_id {
            let hosts = [&meeting.original_host_id, &meeting.current_host_id];
            let is_host = hosts
                .into_iter()
                .flatten()
                .any(|r| r.id() == Some(host_id));
            if !is_host {
                return false;
            }
        }
        if let Some(code) = &self.invite_code {
            if &meeting.invite_code != code {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait MeetingStore: Send + Sync {
    /// Fails with `DuplicateKey` when the invite code is already taken.
    async fn insert(&self, meeting: &Meeting) -> DaoResult<Meeting>;

    async fn find_by_id(&self, id: ObjectId) -> DaoResult<Meeting>;

    async fn find_by_invite_code(&self, code: &str) -> DaoResult<Option<Meeting>>;

    async fn find_by_capture_id(&self, capture_id: &str) -> DaoResult<Option<Meeting>>;

    async fn invite_code_exists(&self, code: &str) -> DaoResult<bool>;

    async fn list(
        &self,
        filter: &MeetingFilter,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Meeting>>;

    /// Applies `update` only if the meeting matches `guard`. Returns the
    /// updated meeting, or `None` when the meeting is missing or the guard
    /// rejected the write.
    async fn update_guarded(
        &self,
        id: ObjectId,
        guard: &MeetingGuard,
        update: &MeetingUpdate,
    ) -> DaoResult<Option<Meeting>>;

    /// Atomic increment of `participant_count`, applied only while the
    /// meeting matches `guard`. Negative deltas never take the count below
    /// zero and a positive delta never exceeds `ceiling`; returns `false`
    /// when the guard or a bound prevented the write.
    async fn adjust_participant_count(
        &self,
        id: ObjectId,
        guard: &MeetingGuard,
        delta: i32,
        ceiling: Option<u32>,
    ) -> DaoResult<bool>;

    async fn delete_guarded(&self, id: ObjectId, guard: &MeetingGuard) -> DaoResult<bool>;
}

#[async_trait]
pub trait ParticipantStore: Send + Sync {
    async fn insert(&self, participant: &Participant) -> DaoResult<Participant>;

    async fn find_by_id(&self, id: ObjectId) -> DaoResult<Participant>;

    async fn find_by_meeting_and_user(
        &self,
        meeting_id: ObjectId,
        user_id: ObjectId,
    ) -> DaoResult<Option<Participant>>;

    /// Participants of a meeting in join order, optionally restricted to `statuses`.
    async fn list_by_meeting(
        &self,
        meeting_id: ObjectId,
        statuses: Option<&[ParticipantStatus]>,
    ) -> DaoResult<Vec<Participant>>;

    /// Moves the participant to `to` if its current status is in `from`.
    async fn transition_status(
        &self,
        id: ObjectId,
        from: &[ParticipantStatus],
        to: ParticipantStatus,
    ) -> DaoResult<bool>;

    /// Appends `session` unless the participant already has an open one.
    async fn push_session_if_none_open(
        &self,
        id: ObjectId,
        session: &ParticipantSession,
    ) -> DaoResult<bool>;

    /// Closes the open session that started at `joined_at` and adds
    /// `duration_sec` to the participant total. Returns `false` when that
    /// session is no longer open.
    async fn close_session(
        &self,
        id: ObjectId,
        joined_at: DateTime,
        left_at: DateTime,
        duration_sec: i64,
    ) -> DaoResult<bool>;

    async fn delete_by_meeting(&self, meeting_id: ObjectId) -> DaoResult<u64>;
}
