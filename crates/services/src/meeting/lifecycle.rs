use std::sync::Arc;

use bson::{oid::ObjectId, DateTime};
use huddle_config::{MeetingSettings, Settings};
use huddle_db::models::{
    DeviceState, Meeting, MeetingRecording, MeetingStatus, Participant, ParticipantRole,
    ParticipantStatus, UserRef,
};
use tracing::{debug, info, warn};

use super::host;
use super::input::{
    CreateMeetingInput, JoinRequest, MeetingPatch, check_max_participants, future_schedule,
    non_empty, normalize_title, validate,
};
use super::invite::{self, InviteCodeGenerator};
use super::permission::{self, Actor};
use super::recording::{self, CaptureDisposition, RecordingCoordinator};
use super::session::ParticipantSessionTracker;
use super::side_effect::{Outcome, SideEffect};
use crate::auth;
use crate::clock::Clock;
use crate::dao::{
    DaoError, MeetingFilter, MeetingGuard, MeetingStore, MeetingUpdate, PaginatedResult,
    PaginationParams, ParticipantStore,
};
use crate::error::{MeetingError, MeetingResult};
use crate::media::{CaptureEvent, CaptureService, SignalingService, VodService};

const NOT_STARTED: [MeetingStatus; 2] = [MeetingStatus::Scheduled, MeetingStatus::Created];
const NOT_LIVE: [MeetingStatus; 4] = [
    MeetingStatus::Scheduled,
    MeetingStatus::Created,
    MeetingStatus::Ended,
    MeetingStatus::Canceled,
];
const NOT_ENDED: [MeetingStatus; 4] = [
    MeetingStatus::Scheduled,
    MeetingStatus::Created,
    MeetingStatus::Live,
    MeetingStatus::Canceled,
];
const OPEN: [MeetingStatus; 3] = [
    MeetingStatus::Scheduled,
    MeetingStatus::Created,
    MeetingStatus::Live,
];
const QUEUED: [ParticipantStatus; 2] = [ParticipantStatus::Waiting, ParticipantStatus::Approved];

/// External services the lifecycle depends on.
pub struct Collaborators {
    pub capture: Arc<dyn CaptureService>,
    pub signaling: Arc<dyn SignalingService>,
    pub vod: Arc<dyn VodService>,
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub meeting: Meeting,
    pub participant: Participant,
}

enum Admission {
    Admitted,
    NotQueued,
    Full,
    /// The meeting stopped being LIVE before the admission completed.
    Closed,
}

/// Entry point for every meeting operation. Status changes are single
/// guarded writes; best-effort steps are logged here and nowhere else.
pub struct MeetingLifecycleManager {
    meetings: Arc<dyn MeetingStore>,
    participants: Arc<dyn ParticipantStore>,
    sessions: ParticipantSessionTracker,
    recordings: RecordingCoordinator,
    signaling: Arc<dyn SignalingService>,
    clock: Arc<dyn Clock>,
    limits: MeetingSettings,
    invite_codes: InviteCodeGenerator,
}

pub fn parse_id(raw: &str, what: &'static str) -> MeetingResult<ObjectId> {
    ObjectId::parse_str(raw.trim()).map_err(|_| MeetingError::NotFound(what))
}

fn round_minutes(from: DateTime, to: DateTime) -> i64 {
    let millis = (to.timestamp_millis() - from.timestamp_millis()).max(0);
    (millis as f64 / 60_000.0).round() as i64
}

fn hash_passcode(passcode: &str) -> MeetingResult<String> {
    auth::hash_passcode(passcode).map_err(|e| MeetingError::Passcode(e.to_string()))
}

impl MeetingLifecycleManager {
    pub fn new(
        meetings: Arc<dyn MeetingStore>,
        participants: Arc<dyn ParticipantStore>,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
        settings: &Settings,
    ) -> Self {
        let recordings = RecordingCoordinator::new(
            meetings.clone(),
            collaborators.capture,
            collaborators.vod,
            clock.clone(),
            settings.capture.output_prefix.clone(),
            settings.vod.public_url.clone(),
        );
        Self {
            sessions: ParticipantSessionTracker::new(participants.clone()),
            meetings,
            participants,
            recordings,
            signaling: collaborators.signaling,
            clock,
            limits: settings.meeting.clone(),
            invite_codes: invite::random_generator(),
        }
    }

    pub fn with_invite_code_generator(mut self, generator: InviteCodeGenerator) -> Self {
        self.invite_codes = generator;
        self
    }

    async fn load(&self, meeting_id: ObjectId) -> MeetingResult<Meeting> {
        self.meetings
            .find_by_id(meeting_id)
            .await
            .map_err(|e| match MeetingError::from(e) {
                MeetingError::NotFound(_) => MeetingError::NotFound("Meeting"),
                other => other,
            })
    }

    async fn load_participant(&self, meeting_id: ObjectId, raw_id: &str) -> MeetingResult<Participant> {
        let participant_id = parse_id(raw_id, "Participant")?;
        let participant = self
            .participants
            .find_by_id(participant_id)
            .await
            .map_err(|e| match MeetingError::from(e) {
                MeetingError::NotFound(_) => MeetingError::NotFound("Participant"),
                other => other,
            })?;
        if participant.meeting_id != meeting_id {
            return Err(MeetingError::NotFound("Participant"));
        }
        Ok(participant)
    }

    /// A guarded write matched nothing: either the meeting is gone or its
    /// state moved on since it was read.
    async fn guard_missed(&self, meeting_id: ObjectId, reason: &str) -> MeetingError {
        match self.load(meeting_id).await {
            Ok(_) => MeetingError::InvalidState(reason.to_string()),
            Err(e) => e,
        }
    }

    /// Logs side steps and hands deferred ones to the runtime.
    fn settle<T>(&self, op: &'static str, subject: &str, outcome: Outcome<T>) -> T {
        for effect in outcome.effects {
            match effect.result {
                Ok(()) => debug!(op, %subject, step = effect.step, "Side step done"),
                Err(e) => warn!(op, %subject, step = effect.step, error = %e, "Side step failed"),
            }
        }
        for deferred in outcome.deferred {
            let subject = subject.to_string();
            let step = deferred.step;
            tokio::spawn(async move {
                match deferred.task.await {
                    Ok(()) => debug!(op, %subject, step, "Deferred step done"),
                    Err(e) => warn!(op, %subject, step, error = %e, "Deferred step failed"),
                }
            });
        }
        outcome.value
    }

    async fn allocate_invite_code(&self) -> MeetingResult<String> {
        loop {
            let code = (self.invite_codes)();
            if !self.meetings.invite_code_exists(&code).await? {
                return Ok(code);
            }
            debug!(%code, "Invite code collision");
        }
    }

    // ---- Creation and reads ------------------------------------------------

    pub async fn create(&self, input: CreateMeetingInput, actor: &Actor) -> MeetingResult<Meeting> {
        permission::require_can_create(actor)?;
        validate(&input)?;

        let title = normalize_title(&input.title)?;
        let max_participants = check_max_participants(
            input
                .max_participants
                .unwrap_or(self.limits.default_max_participants),
            self.limits.max_participants_cap,
        )?;
        let now = self.clock.now();
        let scheduled_for = match non_empty(input.scheduled_for.as_deref()) {
            Some(raw) => Some(future_schedule(raw, now)?),
            None => None,
        };
        let passcode_hash = match non_empty(input.passcode.as_deref()) {
            Some(passcode) => Some(hash_passcode(passcode)?),
            None => None,
        };
        let is_private = input.is_private.unwrap_or(passcode_hash.is_some());
        if is_private && passcode_hash.is_none() {
            return Err(MeetingError::InvalidInput(
                "a private meeting needs a passcode".into(),
            ));
        }
        let status = if scheduled_for.is_some() {
            MeetingStatus::Scheduled
        } else {
            MeetingStatus::Created
        };

        loop {
            let invite_code = self.allocate_invite_code().await?;
            let meeting = Meeting {
                id: None,
                title: title.clone(),
                description: input.description.clone(),
                status,
                original_host_id: Some(UserRef::Id(actor.id)),
                current_host_id: Some(UserRef::Id(actor.id)),
                invite_code,
                is_private,
                passcode_hash: passcode_hash.clone(),
                is_locked: false,
                scheduled_for,
                actual_start_at: None,
                ended_at: None,
                canceled_at: None,
                duration_min: None,
                max_participants,
                participant_count: 0,
                banned_user_ids: Vec::new(),
                recording: MeetingRecording::default(),
                created_at: now,
                updated_at: now,
            };
            match self.meetings.insert(&meeting).await {
                Ok(created) => {
                    info!(
                        meeting_id = ?created.id,
                        actor_id = %actor.id,
                        status = status.as_str(),
                        "Meeting created"
                    );
                    return Ok(created);
                }
                Err(DaoError::DuplicateKey(_)) => {
                    debug!("Invite code taken at insert, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn get(&self, meeting_id: &str) -> MeetingResult<Meeting> {
        self.load(parse_id(meeting_id, "Meeting")?).await
    }

    pub async fn list(
        &self,
        filter: &MeetingFilter,
        params: &PaginationParams,
    ) -> MeetingResult<PaginatedResult<Meeting>> {
        Ok(self.meetings.list(filter, params).await?)
    }

    // ---- Status transitions ------------------------------------------------

    pub async fn update(
        &self,
        meeting_id: &str,
        patch: MeetingPatch,
        actor: &Actor,
    ) -> MeetingResult<Meeting> {
        let id = parse_id(meeting_id, "Meeting")?;
        let meeting = self.load(id).await?;
        permission::require_host_or_admin(&meeting, actor)?;
        if matches!(
            meeting.status,
            MeetingStatus::Live | MeetingStatus::Ended | MeetingStatus::Canceled
        ) {
            return Err(MeetingError::InvalidState(format!(
                "cannot update a meeting that is {}",
                meeting.status.as_str()
            )));
        }
        validate(&patch)?;

        let now = self.clock.now();
        let mut update = MeetingUpdate::default();
        if let Some(title) = &patch.title {
            update.title = Some(normalize_title(title)?);
        }
        if let Some(description) = &patch.description {
            update.description = Some(description.clone());
        }
        if let Some(max) = patch.max_participants {
            update.max_participants =
                Some(check_max_participants(max, self.limits.max_participants_cap)?);
        }
        if let Some(scheduled_for) = &patch.scheduled_for {
            match non_empty(scheduled_for.as_deref()) {
                Some(raw) => {
                    update.scheduled_for = Some(Some(future_schedule(raw, now)?));
                    update.status = Some(MeetingStatus::Scheduled);
                }
                None => {
                    update.scheduled_for = Some(None);
                    update.status = Some(MeetingStatus::Created);
                }
            }
        }

        let mut passcode_hash = meeting.passcode_hash.clone();
        if let Some(passcode) = &patch.passcode {
            passcode_hash = match non_empty(passcode.as_deref()) {
                Some(p) => Some(hash_passcode(p)?),
                None => None,
            };
            update.passcode_hash = Some(passcode_hash.clone());
        }
        let is_private = match (patch.is_private, &patch.passcode) {
            (Some(explicit), _) => explicit,
            (None, Some(_)) => passcode_hash.is_some(),
            (None, None) => meeting.is_private,
        };
        if is_private && passcode_hash.is_none() {
            return Err(MeetingError::InvalidInput(
                "a private meeting needs a passcode".into(),
            ));
        }
        update.is_private = Some(is_private);

        let guard = MeetingGuard::status_in(&[meeting.status]);
        match self.meetings.update_guarded(id, &guard, &update).await? {
            Some(updated) => {
                info!(meeting_id = %id, actor_id = %actor.id, "Meeting updated");
                Ok(updated)
            }
            None => Err(self.guard_missed(id, "meeting changed state concurrently").await),
        }
    }

    pub async fn start(&self, meeting_id: &str, actor: &Actor) -> MeetingResult<Meeting> {
        let id = parse_id(meeting_id, "Meeting")?;
        let meeting = self.load(id).await?;
        permission::require_host_or_admin(&meeting, actor)?;
        match meeting.status {
            MeetingStatus::Live => {
                return Err(MeetingError::InvalidState("meeting is already live".into()));
            }
            MeetingStatus::Ended | MeetingStatus::Canceled => {
                return Err(MeetingError::InvalidState(format!(
                    "cannot start a meeting that is {}",
                    meeting.status.as_str()
                )));
            }
            MeetingStatus::Scheduled | MeetingStatus::Created => {}
        }

        let now = self.clock.now();
        let update = MeetingUpdate {
            status: Some(MeetingStatus::Live),
            actual_start_at: Some(now),
            ..MeetingUpdate::default()
        };
        let Some(live) = self
            .meetings
            .update_guarded(id, &MeetingGuard::status_in(&NOT_STARTED), &update)
            .await?
        else {
            return Err(self.guard_missed(id, "meeting is no longer startable").await);
        };
        info!(meeting_id = %id, actor_id = %actor.id, "Meeting started");

        let admitted = self.admit_queued(&live, now).await?;
        debug!(meeting_id = %id, admitted, "Admitted queued participants");

        let room = self
            .signaling
            .create_room(&recording::room_id(id), live.max_participants)
            .await
            .map_err(MeetingError::from);
        let outcome = Outcome::new(()).with_effect(SideEffect::new("signaling_create_room", room));
        self.settle("start", &id.to_hex(), outcome);

        self.load(id).await
    }

    pub async fn end(&self, meeting_id: &str, actor: &Actor) -> MeetingResult<Meeting> {
        let id = parse_id(meeting_id, "Meeting")?;
        let meeting = self.load(id).await?;
        permission::require_host_or_admin(&meeting, actor)?;
        match meeting.status {
            MeetingStatus::Live => {}
            MeetingStatus::Ended => {
                return Err(MeetingError::InvalidState("meeting has already ended".into()));
            }
            MeetingStatus::Canceled => {
                return Err(MeetingError::InvalidState("meeting was canceled".into()));
            }
            MeetingStatus::Scheduled | MeetingStatus::Created => {
                return Err(MeetingError::InvalidState("meeting has not started".into()));
            }
        }

        let now = self.clock.now();
        let update = MeetingUpdate {
            status: Some(MeetingStatus::Ended),
            ended_at: Some(now),
            duration_min: meeting.actual_start_at.map(|start| round_minutes(start, now)),
            participant_count: Some(0),
            ..MeetingUpdate::default()
        };
        let Some(ended) = self
            .meetings
            .update_guarded(id, &MeetingGuard::status_in(&[MeetingStatus::Live]), &update)
            .await?
        else {
            return Err(self.guard_missed(id, "meeting is no longer live").await);
        };
        info!(
            meeting_id = %id,
            actor_id = %actor.id,
            duration_min = ?ended.duration_min,
            "Meeting ended"
        );

        let closed = self.sessions.close_all_for_meeting(id, now).await?;
        debug!(meeting_id = %id, closed, "Participants released");

        let mut outcome = Outcome::new(());
        if ended.recording.status.is_active() {
            match self.recordings.stop_active(id).await {
                Ok(Some(stopped)) => {
                    outcome.absorb(stopped);
                }
                Ok(None) => {}
                Err(e) => outcome = outcome.with_effect(SideEffect::new("recording_stop", Err(e))),
            }
        }
        let room = self
            .signaling
            .delete_room(&recording::room_id(id))
            .await
            .map_err(MeetingError::from);
        outcome = outcome.with_effect(SideEffect::new("signaling_delete_room", room));
        self.settle("end", &id.to_hex(), outcome);

        self.load(id).await
    }

    pub async fn cancel(&self, meeting_id: &str, actor: &Actor) -> MeetingResult<Meeting> {
        let id = parse_id(meeting_id, "Meeting")?;
        let meeting = self.load(id).await?;
        permission::require_host_or_admin(&meeting, actor)?;
        if !NOT_STARTED.contains(&meeting.status) {
            return Err(MeetingError::InvalidState(format!(
                "cannot cancel a meeting that is {}",
                meeting.status.as_str()
            )));
        }

        let now = self.clock.now();
        let update = MeetingUpdate {
            status: Some(MeetingStatus::Canceled),
            canceled_at: Some(now),
            ..MeetingUpdate::default()
        };
        let Some(canceled) = self
            .meetings
            .update_guarded(id, &MeetingGuard::status_in(&NOT_STARTED), &update)
            .await?
        else {
            return Err(self.guard_missed(id, "meeting is no longer cancelable").await);
        };
        self.sessions.close_all_for_meeting(id, now).await?;
        info!(meeting_id = %id, actor_id = %actor.id, "Meeting canceled");
        Ok(canceled)
    }

    pub async fn delete(&self, meeting_id: &str, actor: &Actor) -> MeetingResult<()> {
        let id = parse_id(meeting_id, "Meeting")?;
        let meeting = self.load(id).await?;
        permission::require_host_or_admin(&meeting, actor)?;
        if meeting.status == MeetingStatus::Live {
            return Err(MeetingError::InvalidState("cannot delete a live meeting".into()));
        }

        let mut outcome = Outcome::new(());
        if meeting.recording.status.is_active() {
            match self.recordings.stop_active(id).await {
                Ok(Some(stopped)) => {
                    outcome.absorb(stopped);
                }
                Ok(None) => {}
                Err(e) => outcome = outcome.with_effect(SideEffect::new("recording_stop", Err(e))),
            }
        }

        if !self
            .meetings
            .delete_guarded(id, &MeetingGuard::status_in(&NOT_LIVE))
            .await?
        {
            return Err(self.guard_missed(id, "cannot delete a live meeting").await);
        }
        let removed = self.participants.delete_by_meeting(id).await?;
        info!(meeting_id = %id, actor_id = %actor.id, removed, "Meeting deleted");

        self.settle("delete", &id.to_hex(), outcome);
        Ok(())
    }

    // ---- Room controls ------------------------------------------------------

    pub async fn rotate_invite_code(&self, meeting_id: &str, actor: &Actor) -> MeetingResult<Meeting> {
        let id = parse_id(meeting_id, "Meeting")?;
        let meeting = self.load(id).await?;
        permission::require_host_or_admin(&meeting, actor)?;
        if meeting.status.is_terminal() {
            return Err(MeetingError::InvalidState(format!(
                "cannot rotate the invite code of a meeting that is {}",
                meeting.status.as_str()
            )));
        }

        loop {
            let code = self.allocate_invite_code().await?;
            let update = MeetingUpdate {
                invite_code: Some(code),
                ..MeetingUpdate::default()
            };
            match self
                .meetings
                .update_guarded(id, &MeetingGuard::status_in(&OPEN), &update)
                .await
            {
                Ok(Some(rotated)) => {
                    info!(meeting_id = %id, actor_id = %actor.id, "Invite code rotated");
                    return Ok(rotated);
                }
                Ok(None) => return Err(self.guard_missed(id, "meeting has finished").await),
                Err(DaoError::DuplicateKey(_)) => {
                    debug!(meeting_id = %id, "Invite code taken at write, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn lock_room(&self, meeting_id: &str, actor: &Actor) -> MeetingResult<Meeting> {
        self.set_locked(meeting_id, actor, true).await
    }

    pub async fn unlock_room(&self, meeting_id: &str, actor: &Actor) -> MeetingResult<Meeting> {
        self.set_locked(meeting_id, actor, false).await
    }

    async fn set_locked(&self, meeting_id: &str, actor: &Actor, locked: bool) -> MeetingResult<Meeting> {
        let id = parse_id(meeting_id, "Meeting")?;
        let meeting = self.load(id).await?;
        permission::require_host_or_admin(&meeting, actor)?;
        if meeting.status == MeetingStatus::Ended {
            return Err(MeetingError::InvalidState("meeting has ended".into()));
        }

        let update = MeetingUpdate {
            is_locked: Some(locked),
            ..MeetingUpdate::default()
        };
        match self
            .meetings
            .update_guarded(id, &MeetingGuard::status_in(&NOT_ENDED), &update)
            .await?
        {
            Some(updated) => {
                info!(meeting_id = %id, actor_id = %actor.id, locked, "Room lock changed");
                Ok(updated)
            }
            None => Err(self.guard_missed(id, "meeting has ended").await),
        }
    }

    pub async fn transfer_host(
        &self,
        meeting_id: &str,
        new_host_id: &str,
        actor: &Actor,
    ) -> MeetingResult<Meeting> {
        let id = parse_id(meeting_id, "Meeting")?;
        let new_host = ObjectId::parse_str(new_host_id.trim())
            .map_err(|_| MeetingError::InvalidInput("new host id is malformed".into()))?;
        let meeting = self.load(id).await?;
        permission::require_host_or_admin(&meeting, actor)?;
        if meeting.status == MeetingStatus::Ended {
            return Err(MeetingError::InvalidState("meeting has ended".into()));
        }

        let update = MeetingUpdate {
            current_host_id: Some(new_host),
            ..MeetingUpdate::default()
        };
        match self
            .meetings
            .update_guarded(id, &MeetingGuard::status_in(&NOT_ENDED), &update)
            .await?
        {
            Some(updated) => {
                info!(meeting_id = %id, actor_id = %actor.id, new_host = %new_host, "Host transferred");
                Ok(updated)
            }
            None => Err(self.guard_missed(id, "meeting has ended").await),
        }
    }

    // ---- Participants -------------------------------------------------------

    pub async fn join_by_code(
        &self,
        code: &str,
        request: JoinRequest,
        actor: Option<&Actor>,
    ) -> MeetingResult<JoinOutcome> {
        let code = code.trim().to_ascii_uppercase();
        let meeting = self
            .meetings
            .find_by_invite_code(&code)
            .await?
            .ok_or(MeetingError::NotFound("Meeting"))?;
        let meeting_id = meeting.id.ok_or(MeetingError::NotFound("Meeting"))?;

        if meeting.status.is_terminal() {
            return Err(MeetingError::InvalidState(format!(
                "meeting is {}",
                meeting.status.as_str()
            )));
        }
        if meeting.is_locked {
            return Err(MeetingError::Forbidden("meeting room is locked".into()));
        }
        if let Some(actor) = actor {
            if meeting.banned_user_ids.contains(&actor.id) {
                return Err(MeetingError::Forbidden(
                    "you have been removed from this meeting".into(),
                ));
            }
        }
        if meeting.is_private {
            let verified = match (non_empty(request.passcode.as_deref()), &meeting.passcode_hash) {
                (Some(passcode), Some(hash)) => auth::verify_passcode(passcode, hash),
                _ => false,
            };
            if !verified {
                return Err(MeetingError::Forbidden("invalid passcode".into()));
            }
        }

        let identity = host::normalize(&meeting);
        let as_host = actor.is_some_and(|a| host::is_host(&identity, a.id));
        let now = self.clock.now();
        let participant = self
            .participant_for(&meeting, actor, request.display_name.as_deref(), as_host, now)
            .await?;
        let participant_id = participant.id.ok_or(MeetingError::NotFound("Participant"))?;

        if meeting.status == MeetingStatus::Live {
            let admission = if participant.status == ParticipantStatus::Admitted {
                // Reconnect: reuse the admission, reopen the session if needed.
                self.sessions.open_session(participant_id, now).await?;
                self.confirm_live(meeting_id, participant_id, now).await?
            } else {
                self.admit(&meeting, participant_id, now).await?
            };
            match admission {
                Admission::Admitted | Admission::NotQueued => {}
                Admission::Full => {
                    return Err(MeetingError::InvalidState("meeting is full".into()));
                }
                Admission::Closed => {
                    return Err(MeetingError::InvalidState("meeting has ended".into()));
                }
            }
        }

        let participant = self.participants.find_by_id(participant_id).await?;
        info!(
            meeting_id = %meeting_id,
            participant_id = %participant_id,
            status = participant.status.as_str(),
            "Joined meeting"
        );
        Ok(JoinOutcome {
            meeting: self.load(meeting_id).await?,
            participant,
        })
    }

    /// Existing record for a returning user, otherwise a fresh WAITING one.
    async fn participant_for(
        &self,
        meeting: &Meeting,
        actor: Option<&Actor>,
        display_name: Option<&str>,
        as_host: bool,
        now: DateTime,
    ) -> MeetingResult<Participant> {
        let meeting_id = meeting.id.ok_or(MeetingError::NotFound("Meeting"))?;
        if let Some(actor) = actor {
            if let Some(existing) = self
                .participants
                .find_by_meeting_and_user(meeting_id, actor.id)
                .await?
            {
                let Some(existing_id) = existing.id else {
                    return Ok(existing);
                };
                if existing.status == ParticipantStatus::Left {
                    self.participants
                        .transition_status(existing_id, &[ParticipantStatus::Left], ParticipantStatus::Waiting)
                        .await?;
                    return Ok(self.participants.find_by_id(existing_id).await?);
                }
                return Ok(existing);
            }
        }

        let fallback = if actor.is_some() { "Participant" } else { "Guest" };
        let participant = Participant {
            id: None,
            meeting_id,
            user_id: actor.map(|a| a.id),
            display_name: non_empty(display_name).unwrap_or(fallback).to_string(),
            role: if as_host {
                ParticipantRole::Host
            } else {
                ParticipantRole::Participant
            },
            mic_state: DeviceState::Off,
            camera_state: DeviceState::Off,
            status: ParticipantStatus::Waiting,
            sessions: Vec::new(),
            total_duration_sec: 0,
            created_at: now,
            updated_at: now,
        };
        Ok(self.participants.insert(&participant).await?)
    }

    /// Reserves a seat while the meeting is LIVE, flips the participant to
    /// ADMITTED and opens its session. The seat is released again if the
    /// flip loses a race.
    async fn admit(&self, meeting: &Meeting, participant_id: ObjectId, at: DateTime) -> MeetingResult<Admission> {
        let meeting_id = meeting.id.ok_or(MeetingError::NotFound("Meeting"))?;
        let live = MeetingGuard::status_in(&[MeetingStatus::Live]);
        if !self
            .meetings
            .adjust_participant_count(meeting_id, &live, 1, Some(meeting.max_participants))
            .await?
        {
            let current = self.load(meeting_id).await?;
            return Ok(if current.status == MeetingStatus::Live {
                Admission::Full
            } else {
                Admission::Closed
            });
        }
        if !self
            .participants
            .transition_status(participant_id, &QUEUED, ParticipantStatus::Admitted)
            .await?
        {
            let released = self
                .meetings
                .adjust_participant_count(meeting_id, &live, -1, None)
                .await?;
            return Ok(if released {
                Admission::NotQueued
            } else {
                Admission::Closed
            });
        }
        self.sessions.open_session(participant_id, at).await?;
        self.confirm_live(meeting_id, participant_id, at).await
    }

    /// Re-reads the meeting after a session was opened. If `end` slipped in
    /// meanwhile, its release pass may have missed this participant, so the
    /// session is closed and the participant marked LEFT here. The seat needs
    /// no release: ending resets the count.
    async fn confirm_live(
        &self,
        meeting_id: ObjectId,
        participant_id: ObjectId,
        at: DateTime,
    ) -> MeetingResult<Admission> {
        if self.load(meeting_id).await?.status == MeetingStatus::Live {
            return Ok(Admission::Admitted);
        }
        self.sessions.close_session(participant_id, at).await?;
        self.participants
            .transition_status(participant_id, &ParticipantStatus::ACTIVE, ParticipantStatus::Left)
            .await?;
        warn!(%meeting_id, %participant_id, "Meeting ended during admission");
        Ok(Admission::Closed)
    }

    async fn admit_queued(&self, meeting: &Meeting, at: DateTime) -> MeetingResult<u32> {
        let meeting_id = meeting.id.ok_or(MeetingError::NotFound("Meeting"))?;
        let queued = self
            .participants
            .list_by_meeting(meeting_id, Some(&QUEUED))
            .await?;

        let mut admitted = 0;
        for participant in queued {
            let Some(participant_id) = participant.id else { continue };
            match self.admit(meeting, participant_id, at).await? {
                Admission::Admitted => admitted += 1,
                Admission::NotQueued => {}
                Admission::Full => {
                    warn!(%meeting_id, admitted, "Meeting full, remaining participants stay waiting");
                    break;
                }
                Admission::Closed => break,
            }
        }
        Ok(admitted)
    }

    /// Closes the session and marks the participant LEFT, giving the seat
    /// back when it was admitted.
    async fn depart(&self, meeting_id: ObjectId, participant_id: ObjectId, at: DateTime) -> MeetingResult<()> {
        self.sessions.close_session(participant_id, at).await?;
        if self
            .participants
            .transition_status(participant_id, &[ParticipantStatus::Admitted], ParticipantStatus::Left)
            .await?
        {
            self.meetings
                .adjust_participant_count(meeting_id, &MeetingGuard::any(), -1, None)
                .await?;
        } else {
            self.participants
                .transition_status(participant_id, &QUEUED, ParticipantStatus::Left)
                .await?;
        }
        Ok(())
    }

    pub async fn leave(&self, meeting_id: &str, actor: &Actor) -> MeetingResult<Participant> {
        let id = parse_id(meeting_id, "Meeting")?;
        self.load(id).await?;
        let participant = self
            .participants
            .find_by_meeting_and_user(id, actor.id)
            .await?
            .ok_or(MeetingError::NotFound("Participant"))?;
        let participant_id = participant.id.ok_or(MeetingError::NotFound("Participant"))?;
        if participant.status == ParticipantStatus::Left {
            return Ok(participant);
        }

        self.depart(id, participant_id, self.clock.now()).await?;
        info!(meeting_id = %id, actor_id = %actor.id, "Left meeting");
        Ok(self.participants.find_by_id(participant_id).await?)
    }

    pub async fn admit_participant(
        &self,
        meeting_id: &str,
        participant_id: &str,
        actor: &Actor,
    ) -> MeetingResult<Participant> {
        let id = parse_id(meeting_id, "Meeting")?;
        let meeting = self.load(id).await?;
        permission::require_host_or_admin(&meeting, actor)?;
        let participant = self.load_participant(id, participant_id).await?;
        let pid = participant.id.ok_or(MeetingError::NotFound("Participant"))?;
        if meeting.status.is_terminal() {
            return Err(MeetingError::InvalidState(format!(
                "meeting is {}",
                meeting.status.as_str()
            )));
        }

        if meeting.status == MeetingStatus::Live {
            match self.admit(&meeting, pid, self.clock.now()).await? {
                Admission::Admitted => {}
                Admission::NotQueued => {
                    return Err(MeetingError::InvalidState("participant is not waiting".into()));
                }
                Admission::Full => {
                    return Err(MeetingError::InvalidState("meeting is full".into()));
                }
                Admission::Closed => {
                    return Err(MeetingError::InvalidState("meeting has ended".into()));
                }
            }
        } else if !self
            .participants
            .transition_status(pid, &[ParticipantStatus::Waiting], ParticipantStatus::Approved)
            .await?
        {
            return Err(MeetingError::InvalidState("participant is not waiting".into()));
        }

        let participant = self.participants.find_by_id(pid).await?;
        info!(
            meeting_id = %id,
            actor_id = %actor.id,
            participant_id = %pid,
            status = participant.status.as_str(),
            "Participant admitted"
        );
        Ok(participant)
    }

    pub async fn remove_participant(
        &self,
        meeting_id: &str,
        participant_id: &str,
        ban: bool,
        actor: &Actor,
    ) -> MeetingResult<Participant> {
        let id = parse_id(meeting_id, "Meeting")?;
        let meeting = self.load(id).await?;
        let identity = permission::require_host_or_admin(&meeting, actor)?;
        let participant = self.load_participant(id, participant_id).await?;
        let pid = participant.id.ok_or(MeetingError::NotFound("Participant"))?;
        if participant
            .user_id
            .is_some_and(|user| host::is_host(&identity, user))
        {
            return Err(MeetingError::InvalidState("the host cannot be removed".into()));
        }

        if participant.status != ParticipantStatus::Left {
            self.depart(id, pid, self.clock.now()).await?;
        }
        if ban {
            match participant.user_id {
                Some(user_id) => {
                    let update = MeetingUpdate {
                        ban_user_id: Some(user_id),
                        ..MeetingUpdate::default()
                    };
                    if self
                        .meetings
                        .update_guarded(id, &MeetingGuard::any(), &update)
                        .await?
                        .is_none()
                    {
                        return Err(MeetingError::NotFound("Meeting"));
                    }
                }
                None => debug!(meeting_id = %id, participant_id = %pid, "Guest cannot be banned"),
            }
        }
        info!(meeting_id = %id, actor_id = %actor.id, participant_id = %pid, ban, "Participant removed");

        if meeting.status == MeetingStatus::Live {
            let identity = participant.user_id.unwrap_or(pid).to_hex();
            let dropped = self
                .signaling
                .remove_participant(&recording::room_id(id), &identity)
                .await
                .map_err(MeetingError::from);
            let outcome = Outcome::new(()).with_effect(SideEffect::new("signaling_remove_participant", dropped));
            self.settle("remove_participant", &id.to_hex(), outcome);
        }

        Ok(self.participants.find_by_id(pid).await?)
    }

    pub async fn list_participants(&self, meeting_id: &str) -> MeetingResult<Vec<Participant>> {
        let id = parse_id(meeting_id, "Meeting")?;
        self.load(id).await?;
        Ok(self.participants.list_by_meeting(id, None).await?)
    }

    // ---- Recording ------------------------------------------------------------

    pub async fn start_recording(&self, meeting_id: &str, actor: &Actor) -> MeetingResult<Meeting> {
        let id = parse_id(meeting_id, "Meeting")?;
        let outcome = self.recordings.start(id, actor).await?;
        Ok(self.settle("start_recording", meeting_id, outcome))
    }

    pub async fn pause_recording(&self, meeting_id: &str, actor: &Actor) -> MeetingResult<Meeting> {
        let id = parse_id(meeting_id, "Meeting")?;
        let outcome = self.recordings.pause(id, actor).await?;
        Ok(self.settle("pause_recording", meeting_id, outcome))
    }

    pub async fn resume_recording(&self, meeting_id: &str, actor: &Actor) -> MeetingResult<Meeting> {
        let id = parse_id(meeting_id, "Meeting")?;
        let outcome = self.recordings.resume(id, actor).await?;
        Ok(self.settle("resume_recording", meeting_id, outcome))
    }

    pub async fn stop_recording(&self, meeting_id: &str, actor: &Actor) -> MeetingResult<Meeting> {
        let id = parse_id(meeting_id, "Meeting")?;
        let outcome = self.recordings.stop(id, actor).await?;
        Ok(self.settle("stop_recording", meeting_id, outcome))
    }

    pub async fn get_recording_info(
        &self,
        meeting_id: &str,
        actor: &Actor,
    ) -> MeetingResult<MeetingRecording> {
        let id = parse_id(meeting_id, "Meeting")?;
        self.recordings.info(id, actor).await
    }

    pub async fn purge_recording(&self, meeting_id: &str, actor: &Actor) -> MeetingResult<Meeting> {
        let id = parse_id(meeting_id, "Meeting")?;
        let outcome = self.recordings.purge(id, actor).await?;
        Ok(self.settle("purge_recording", meeting_id, outcome))
    }

    pub async fn on_capture_event(&self, event: &CaptureEvent) -> MeetingResult<CaptureDisposition> {
        let outcome = self.recordings.on_capture_event(event).await?;
        Ok(self.settle("capture_event", &event.capture_id, outcome))
    }
}
