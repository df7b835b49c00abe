//! In-process stores backed by `DashMap`.
//!
//! Each guarded write runs while holding the shard lock of the entry it
//! touches, which gives the same single-document atomicity as MongoDB.

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use dashmap::{mapref::entry::Entry, DashMap};
use huddle_db::models::{Meeting, Participant, ParticipantSession, ParticipantStatus};

use super::base::{DaoError, DaoResult, PaginatedResult, PaginationParams};
use super::store::{MeetingFilter, MeetingGuard, MeetingStore, MeetingUpdate, ParticipantStore};

#[derive(Default)]
pub struct MemoryMeetingStore {
    meetings: DashMap<ObjectId, Meeting>,
    codes: DashMap<String, ObjectId>,
}

impl MemoryMeetingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn reserve_code(&self, code: &str, id: ObjectId) -> DaoResult<()> {
        match self.codes.entry(code.to_string()) {
            Entry::Occupied(e) if *e.get() != id => Err(DaoError::DuplicateKey(format!(
                "invite_code {code} already in use"
            ))),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(e) => {
                e.insert(id);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl MeetingStore for MemoryMeetingStore {
    async fn insert(&self, meeting: &Meeting) -> DaoResult<Meeting> {
        let mut meeting = meeting.clone();
        let id = *meeting.id.get_or_insert_with(ObjectId::new);
        self.reserve_code(&meeting.invite_code, id)?;
        self.meetings.insert(id, meeting.clone());
        Ok(meeting)
    }

    async fn find_by_id(&self, id: ObjectId) -> DaoResult<Meeting> {
        self.meetings
            .get(&id)
            .map(|m| m.clone())
            .ok_or(DaoError::NotFound)
    }

    async fn find_by_invite_code(&self, code: &str) -> DaoResult<Option<Meeting>> {
        let Some(id) = self.codes.get(code).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.meetings.get(&id).map(|m| m.clone()))
    }

    async fn find_by_capture_id(&self, capture_id: &str) -> DaoResult<Option<Meeting>> {
        Ok(self
            .meetings
            .iter()
            .find(|m| m.recording.capture_id.as_deref() == Some(capture_id))
            .map(|m| m.clone()))
    }

    async fn invite_code_exists(&self, code: &str) -> DaoResult<bool> {
        Ok(self.codes.contains_key(code))
    }

    async fn list(
        &self,
        filter: &MeetingFilter,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Meeting>> {
        let params = params.normalized();
        let mut matched: Vec<Meeting> = self
            .meetings
            .iter()
            .filter(|m| filter.matches(m))
            .map(|m| m.clone())
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(params.skip() as usize)
            .take(params.per_page as usize)
            .collect();
        Ok(PaginatedResult::new(items, total, &params))
    }

    async fn update_guarded(
        &self,
        id: ObjectId,
        guard: &MeetingGuard,
        update: &MeetingUpdate,
    ) -> DaoResult<Option<Meeting>> {
        let Some(mut meeting) = self.meetings.get_mut(&id) else {
            return Ok(None);
        };
        if !guard.matches(&meeting) {
            return Ok(None);
        }

        let old_code = meeting.invite_code.clone();
        if let Some(code) = update.invite_code.as_deref().filter(|c| *c != old_code) {
            self.reserve_code(code, id)?;
            self.codes.remove(&old_code);
        }

        update.apply_to(&mut meeting, DateTime::now());
        Ok(Some(meeting.clone()))
    }

    async fn adjust_participant_count(
        &self,
        id: ObjectId,
        guard: &MeetingGuard,
        delta: i32,
        ceiling: Option<u32>,
    ) -> DaoResult<bool> {
        let Some(mut meeting) = self.meetings.get_mut(&id) else {
            return Ok(false);
        };
        if !guard.matches(&meeting) {
            return Ok(false);
        }
        let next = i64::from(meeting.participant_count) + i64::from(delta);
        if next < 0 {
            return Ok(false);
        }
        if delta > 0 && ceiling.is_some_and(|c| next > i64::from(c)) {
            return Ok(false);
        }
        meeting.participant_count = next as u32;
        meeting.updated_at = DateTime::now();
        Ok(true)
    }

    async fn delete_guarded(&self, id: ObjectId, guard: &MeetingGuard) -> DaoResult<bool> {
        match self.meetings.remove_if(&id, |_, m| guard.matches(m)) {
            Some((_, meeting)) => {
                self.codes.remove(&meeting.invite_code);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemoryParticipantStore {
    participants: DashMap<ObjectId, Participant>,
}

impl MemoryParticipantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParticipantStore for MemoryParticipantStore {
    async fn insert(&self, participant: &Participant) -> DaoResult<Participant> {
        let mut participant = participant.clone();
        let id = *participant.id.get_or_insert_with(ObjectId::new);
        self.participants.insert(id, participant.clone());
        Ok(participant)
    }

    async fn find_by_id(&self, id: ObjectId) -> DaoResult<Participant> {
        self.participants
            .get(&id)
            .map(|p| p.clone())
            .ok_or(DaoError::NotFound)
    }

    async fn find_by_meeting_and_user(
        &self,
        meeting_id: ObjectId,
        user_id: ObjectId,
    ) -> DaoResult<Option<Participant>> {
        Ok(self
            .participants
            .iter()
            .find(|p| p.meeting_id == meeting_id && p.user_id == Some(user_id))
            .map(|p| p.clone()))
    }

    async fn list_by_meeting(
        &self,
        meeting_id: ObjectId,
        statuses: Option<&[ParticipantStatus]>,
    ) -> DaoResult<Vec<Participant>> {
        let mut found: Vec<Participant> = self
            .participants
            .iter()
            .filter(|p| p.meeting_id == meeting_id)
            .filter(|p| statuses.is_none_or(|s| s.contains(&p.status)))
            .map(|p| p.clone())
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn transition_status(
        &self,
        id: ObjectId,
        from: &[ParticipantStatus],
        to: ParticipantStatus,
    ) -> DaoResult<bool> {
        let Some(mut participant) = self.participants.get_mut(&id) else {
            return Ok(false);
        };
        if !from.contains(&participant.status) {
            return Ok(false);
        }
        participant.status = to;
        participant.updated_at = DateTime::now();
        Ok(true)
    }

    async fn push_session_if_none_open(
        &self,
        id: ObjectId,
        session: &ParticipantSession,
    ) -> DaoResult<bool> {
        let Some(mut participant) = self.participants.get_mut(&id) else {
            return Ok(false);
        };
        if participant.open_session().is_some() {
            return Ok(false);
        }
        participant.sessions.push(session.clone());
        participant.updated_at = DateTime::now();
        Ok(true)
    }

    async fn close_session(
        &self,
        id: ObjectId,
        joined_at: DateTime,
        left_at: DateTime,
        duration_sec: i64,
    ) -> DaoResult<bool> {
        let Some(mut participant) = self.participants.get_mut(&id) else {
            return Ok(false);
        };
        let Some(session) = participant
            .sessions
            .iter_mut()
            .find(|s| s.is_open() && s.joined_at == joined_at)
        else {
            return Ok(false);
        };
        session.left_at = Some(left_at);
        session.duration_sec = duration_sec;
        participant.total_duration_sec += duration_sec;
        participant.updated_at = DateTime::now();
        Ok(true)
    }

    async fn delete_by_meeting(&self, meeting_id: ObjectId) -> DaoResult<u64> {
        let before = self.participants.len();
        self.participants.retain(|_, p| p.meeting_id != meeting_id);
        Ok((before - self.participants.len()) as u64)
    }
}
