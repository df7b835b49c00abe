use std::sync::Arc;

use bson::{oid::ObjectId, DateTime};
use huddle_db::models::{Meeting, MeetingRecording, MeetingStatus, RecordingStatus};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::permission::{self, Actor};
use super::side_effect::{Deferred, Outcome, SideEffect};
use crate::clock::{elapsed_secs, Clock};
use crate::dao::{MeetingGuard, MeetingStore, MeetingUpdate};
use crate::error::{MeetingError, MeetingResult};
use crate::media::{CaptureEvent, CaptureEventStatus, CaptureService, VodRegistration, VodService};

/// What happened to an inbound capture event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "disposition", content = "detail", rename_all = "snake_case")]
pub enum CaptureDisposition {
    Applied(RecordingStatus),
    Ignored(String),
}

/// Owns the recording sub-state of a meeting:
/// NONE -> RECORDING -> (PAUSED <-> RECORDING) -> STOPPED | FAILED.
pub struct RecordingCoordinator {
    meetings: Arc<dyn MeetingStore>,
    capture: Arc<dyn CaptureService>,
    vod: Arc<dyn VodService>,
    clock: Arc<dyn Clock>,
    output_prefix: String,
    public_url: String,
}

const STARTABLE_MEETING: [MeetingStatus; 3] = [
    MeetingStatus::Scheduled,
    MeetingStatus::Created,
    MeetingStatus::Live,
];
const STARTABLE_RECORDING: [RecordingStatus; 3] = [
    RecordingStatus::None,
    RecordingStatus::Stopped,
    RecordingStatus::Failed,
];
const ACTIVE_RECORDING: [RecordingStatus; 2] = [RecordingStatus::Recording, RecordingStatus::Paused];
const STOP_WRITE_ATTEMPTS: usize = 3;

/// Signaling room that carries a meeting's media.
pub fn room_id(meeting_id: ObjectId) -> String {
    meeting_id.to_hex()
}

impl RecordingCoordinator {
    pub fn new(
        meetings: Arc<dyn MeetingStore>,
        capture: Arc<dyn CaptureService>,
        vod: Arc<dyn VodService>,
        clock: Arc<dyn Clock>,
        output_prefix: impl Into<String>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            meetings,
            capture,
            vod,
            clock,
            output_prefix: output_prefix.into(),
            public_url: public_url.into(),
        }
    }

    fn output_target(&self, meeting_id: ObjectId, recording_id: &str) -> String {
        format!(
            "{}/{}/{}.mp4",
            self.output_prefix.trim_end_matches('/'),
            meeting_id.to_hex(),
            recording_id
        )
    }

    fn public_url_for(&self, storage_ref: &str) -> String {
        format!("{}/{}", self.public_url.trim_end_matches('/'), storage_ref)
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

    /// Distinguishes a deleted meeting from a lost guard.
    async fn guard_missed(&self, meeting_id: ObjectId, reason: &str) -> MeetingError {
        match self.load(meeting_id).await {
            Ok(_) => MeetingError::InvalidState(reason.to_string()),
            Err(e) => e,
        }
    }

    pub async fn start(&self, meeting_id: ObjectId, actor: &Actor) -> MeetingResult<Outcome<Meeting>> {
        let meeting = self.load(meeting_id).await?;
        permission::require_host_or_admin(&meeting, actor)?;

        if meeting.status.is_terminal() {
            return Err(MeetingError::InvalidState(format!(
                "cannot record a meeting that is {}",
                meeting.status.as_str()
            )));
        }
        if meeting.recording.status.is_active() {
            return Err(MeetingError::InvalidState("meeting is already being recorded".into()));
        }

        let recording_id = Uuid::new_v4().to_string();
        let target = self.output_target(meeting_id, &recording_id);
        let capture_id = self
            .capture
            .start_capture(&room_id(meeting_id), &target)
            .await?;

        let recording = MeetingRecording {
            is_recording: true,
            recording_id: Some(recording_id.clone()),
            capture_id: Some(capture_id.clone()),
            status: RecordingStatus::Recording,
            started_at: Some(self.clock.now()),
            storage_ref: Some(target),
            ..MeetingRecording::default()
        };
        let guard = MeetingGuard::status_in(&STARTABLE_MEETING).recording_status_in(&STARTABLE_RECORDING);
        let update = MeetingUpdate {
            recording: Some(recording),
            ..MeetingUpdate::default()
        };

        match self.meetings.update_guarded(meeting_id, &guard, &update).await? {
            Some(updated) => {
                info!(%meeting_id, actor_id = %actor.id, %recording_id, %capture_id, "Recording started");
                Ok(Outcome::new(updated))
            }
            None => {
                // Someone else moved the meeting on; the capture we just
                // started has no owner.
                if let Err(e) = self.capture.stop_capture(&capture_id).await {
                    warn!(%meeting_id, %capture_id, error = %e, "Failed to stop orphaned capture");
                }
                Err(self
                    .guard_missed(meeting_id, "recording state changed concurrently")
                    .await)
            }
        }
    }

    pub async fn pause(&self, meeting_id: ObjectId, actor: &Actor) -> MeetingResult<Outcome<Meeting>> {
        let meeting = self.load(meeting_id).await?;
        permission::require_host_or_admin(&meeting, actor)?;

        let current = &meeting.recording;
        if current.status != RecordingStatus::Recording {
            return Err(MeetingError::InvalidState(format!(
                "cannot pause a recording that is {}",
                current.status.as_str()
            )));
        }

        let mut next = current.clone();
        next.status = RecordingStatus::Paused;
        next.paused_at = Some(self.clock.now());

        let updated = self.write_transition(meeting_id, current, next).await?;
        info!(%meeting_id, actor_id = %actor.id, "Recording paused");
        Ok(Outcome::new(updated))
    }

    pub async fn resume(&self, meeting_id: ObjectId, actor: &Actor) -> MeetingResult<Outcome<Meeting>> {
        let meeting = self.load(meeting_id).await?;
        permission::require_host_or_admin(&meeting, actor)?;

        let current = &meeting.recording;
        if current.status != RecordingStatus::Paused {
            return Err(MeetingError::InvalidState(format!(
                "cannot resume a recording that is {}",
                current.status.as_str()
            )));
        }

        let now = self.clock.now();
        let mut next = current.clone();
        next.duration_sec += active_segment_secs(current, now);
        next.status = RecordingStatus::Recording;
        next.resumed_at = Some(now);

        let updated = self.write_transition(meeting_id, current, next).await?;
        info!(%meeting_id, actor_id = %actor.id, "Recording resumed");
        Ok(Outcome::new(updated))
    }

    pub async fn stop(&self, meeting_id: ObjectId, actor: &Actor) -> MeetingResult<Outcome<Meeting>> {
        let meeting = self.load(meeting_id).await?;
        permission::require_host_or_admin(&meeting, actor)?;

        if !meeting.recording.status.is_active() {
            return Err(MeetingError::InvalidState(format!(
                "cannot stop a recording that is {}",
                meeting.recording.status.as_str()
            )));
        }
        self.stop_loaded(meeting).await
    }

    /// Stops the recording of `meeting_id` if one is running, without a
    /// permission check. Used when the meeting itself ends or is deleted.
    pub async fn stop_active(&self, meeting_id: ObjectId) -> MeetingResult<Option<Outcome<Meeting>>> {
        let meeting = self.load(meeting_id).await?;
        if !meeting.recording.status.is_active() {
            return Ok(None);
        }
        self.stop_loaded(meeting).await.map(Some)
    }

    async fn stop_loaded(&self, meeting: Meeting) -> MeetingResult<Outcome<Meeting>> {
        let Some(meeting_id) = meeting.id else {
            return Err(MeetingError::NotFound("Meeting"));
        };
        let capture_id = meeting.recording.capture_id.clone();
        if let Some(capture_id) = &capture_id {
            self.capture.stop_capture(capture_id).await?;
        }

        // The capture is gone now, so a pause or resume that slipped in must
        // not leave the recording active: retry against the fresh state.
        let mut current = meeting.recording;
        for _ in 0..STOP_WRITE_ATTEMPTS {
            let now = self.clock.now();
            let mut next = current.clone();
            next.duration_sec += active_segment_secs(&current, now);
            next.status = RecordingStatus::Stopped;
            next.is_recording = false;
            next.ended_at = Some(now);
            next.url = next.storage_ref.as_deref().map(|r| self.public_url_for(r));

            let guard = MeetingGuard::any().recording_unchanged(&current);
            let update = MeetingUpdate {
                recording: Some(next),
                ..MeetingUpdate::default()
            };
            if let Some(updated) = self.meetings.update_guarded(meeting_id, &guard, &update).await? {
                info!(
                    %meeting_id,
                    duration_sec = updated.recording.duration_sec,
                    "Recording stopped"
                );
                let mut outcome = Outcome::new(updated.clone());
                if let Some(task) = self.vod_registration(&updated) {
                    outcome = outcome.with_deferred(task);
                }
                return Ok(outcome);
            }

            let fresh = self.load(meeting_id).await?;
            if !fresh.recording.status.is_active() || fresh.recording.capture_id != capture_id {
                debug!(%meeting_id, "Recording already finalized");
                return Ok(Outcome::new(fresh));
            }
            debug!(
                %meeting_id,
                status = fresh.recording.status.as_str(),
                "Recording changed while stopping, retrying"
            );
            current = fresh.recording;
        }
        Err(MeetingError::InvalidState(
            "recording state changed concurrently".into(),
        ))
    }

    async fn write_transition(
        &self,
        meeting_id: ObjectId,
        current: &MeetingRecording,
        next: MeetingRecording,
    ) -> MeetingResult<Meeting> {
        let guard = MeetingGuard::any().recording_unchanged(current);
        let update = MeetingUpdate {
            recording: Some(next),
            ..MeetingUpdate::default()
        };
        match self.meetings.update_guarded(meeting_id, &guard, &update).await? {
            Some(updated) => Ok(updated),
            None => Err(self
                .guard_missed(meeting_id, "recording state changed concurrently")
                .await),
        }
    }

    pub async fn info(&self, meeting_id: ObjectId, actor: &Actor) -> MeetingResult<MeetingRecording> {
        let meeting = self.load(meeting_id).await?;
        permission::require_host_or_admin(&meeting, actor)?;
        Ok(meeting.recording)
    }

    /// Admin-only removal of a finished recording and its VOD record.
    pub async fn purge(&self, meeting_id: ObjectId, actor: &Actor) -> MeetingResult<Outcome<Meeting>> {
        permission::require_admin(actor)?;
        let meeting = self.load(meeting_id).await?;

        let current = &meeting.recording;
        if !current.status.is_terminal() {
            return Err(MeetingError::InvalidState(format!(
                "cannot purge a recording that is {}",
                current.status.as_str()
            )));
        }

        let guard = MeetingGuard::any().recording_unchanged(current);
        let update = MeetingUpdate {
            recording: Some(MeetingRecording::default()),
            ..MeetingUpdate::default()
        };
        let Some(updated) = self.meetings.update_guarded(meeting_id, &guard, &update).await? else {
            return Err(self
                .guard_missed(meeting_id, "recording state changed concurrently")
                .await);
        };
        info!(%meeting_id, actor_id = %actor.id, "Recording purged");

        let mut outcome = Outcome::new(updated);
        if let Some(storage_ref) = &current.storage_ref {
            let result = self
                .vod
                .delete_recording(&meeting_id.to_hex(), storage_ref)
                .await
                .map_err(MeetingError::from);
            outcome = outcome.with_effect(SideEffect::new("vod_delete", result));
        }
        Ok(outcome)
    }

    /// Applies a notification from the recorder. Safe to replay: only a
    /// recording that is still RECORDING or PAUSED under the same capture id
    /// is finalized.
    pub async fn on_capture_event(
        &self,
        event: &CaptureEvent,
    ) -> MeetingResult<Outcome<CaptureDisposition>> {
        let target = match event.status {
            CaptureEventStatus::Completed => RecordingStatus::Stopped,
            CaptureEventStatus::Failed => RecordingStatus::Failed,
            CaptureEventStatus::Started | CaptureEventStatus::Active | CaptureEventStatus::Unknown => {
                return Ok(Outcome::new(CaptureDisposition::Ignored(
                    "non-terminal event".into(),
                )));
            }
        };

        let Some(meeting) = self.meetings.find_by_capture_id(&event.capture_id).await? else {
            debug!(capture_id = %event.capture_id, "Capture event for unknown capture");
            return Ok(Outcome::new(CaptureDisposition::Ignored("unknown capture".into())));
        };
        let Some(meeting_id) = meeting.id else {
            return Ok(Outcome::new(CaptureDisposition::Ignored("unknown capture".into())));
        };
        let current = &meeting.recording;
        if current.status.is_terminal() {
            return Ok(Outcome::new(CaptureDisposition::Ignored(
                "recording already finalized".into(),
            )));
        }

        let ended_at = event
            .ended_at
            .map(DateTime::from_chrono)
            .unwrap_or_else(|| self.clock.now());
        let mut next = current.clone();
        next.duration_sec += active_segment_secs(current, ended_at);
        next.status = target;
        next.is_recording = false;
        next.ended_at = Some(ended_at);

        match target {
            RecordingStatus::Stopped => {
                if let Some(file) = &event.file {
                    if let Some(location) = &file.location {
                        next.storage_ref = Some(location.clone());
                    }
                    if let Some(duration) = file.duration_sec {
                        next.duration_sec = duration.max(0);
                    }
                    next.size_bytes = file.size_bytes;
                }
                next.url = next.storage_ref.as_deref().map(|r| self.public_url_for(r));
            }
            _ => {
                next.failure_reason = Some(
                    event
                        .error
                        .clone()
                        .unwrap_or_else(|| "capture failed".to_string()),
                );
            }
        }

        let guard = MeetingGuard::any()
            .capture_id(&event.capture_id)
            .recording_status_in(&ACTIVE_RECORDING);
        let update = MeetingUpdate {
            recording: Some(next),
            ..MeetingUpdate::default()
        };
        let Some(updated) = self.meetings.update_guarded(meeting_id, &guard, &update).await? else {
            return Ok(Outcome::new(CaptureDisposition::Ignored(
                "stale capture event".into(),
            )));
        };

        info!(
            %meeting_id,
            capture_id = %event.capture_id,
            status = target.as_str(),
            "Recording finalized by capture event"
        );
        let mut outcome = Outcome::new(CaptureDisposition::Applied(target));
        if target == RecordingStatus::Stopped {
            if let Some(task) = self.vod_registration(&updated) {
                outcome = outcome.with_deferred(task);
            }
        }
        Ok(outcome)
    }

    fn vod_registration(&self, meeting: &Meeting) -> Option<Deferred> {
        let meeting_id = meeting.id?;
        let recording = &meeting.recording;
        let storage_ref = recording.storage_ref.clone()?;
        let registration = VodRegistration {
            meeting_id: meeting_id.to_hex(),
            recording_id: recording.recording_id.clone(),
            url: self.public_url_for(&storage_ref),
            storage_ref,
            size_bytes: recording.size_bytes,
            duration_sec: recording.duration_sec,
        };
        let vod = self.vod.clone();
        Some(Deferred::new("vod_registration", async move {
            vod.register_recording(&registration)
                .await
                .map_err(MeetingError::from)
        }))
    }
}

/// Seconds of the current active segment, ending at `pause` time when paused.
fn active_segment_secs(recording: &MeetingRecording, now: DateTime) -> i64 {
    let Some(segment_start) = recording.resumed_at.or(recording.started_at) else {
        return 0;
    };
    let segment_end = match recording.status {
        RecordingStatus::Paused => recording.paused_at.unwrap_or(now),
        _ => now,
    };
    elapsed_secs(segment_start, segment_end)
}
