use std::sync::Arc;

use bson::{oid::ObjectId, DateTime};
use huddle_db::models::{ParticipantSession, ParticipantStatus};
use tracing::debug;

use crate::clock::elapsed_secs;
use crate::dao::ParticipantStore;
use crate::error::MeetingResult;

/// Attendance bookkeeping: at most one open session per participant, and
/// `total_duration_sec` always equal to the sum over closed sessions.
#[derive(Clone)]
pub struct ParticipantSessionTracker {
    participants: Arc<dyn ParticipantStore>,
}

impl ParticipantSessionTracker {
    pub fn new(participants: Arc<dyn ParticipantStore>) -> Self {
        Self { participants }
    }

    /// Returns `false` when a session was already open.
    pub async fn open_session(&self, participant_id: ObjectId, at: DateTime) -> MeetingResult<bool> {
        let session = ParticipantSession {
            joined_at: at,
            left_at: None,
            duration_sec: 0,
        };
        let opened = self
            .participants
            .push_session_if_none_open(participant_id, &session)
            .await?;
        debug!(%participant_id, opened, "Open session");
        Ok(opened)
    }

    /// Closes the open session, if any, and returns its duration.
    pub async fn close_session(
        &self,
        participant_id: ObjectId,
        at: DateTime,
    ) -> MeetingResult<Option<i64>> {
        let participant = self.participants.find_by_id(participant_id).await?;
        let Some(open) = participant.open_session() else {
            return Ok(None);
        };
        let duration = elapsed_secs(open.joined_at, at);
        let closed = self
            .participants
            .close_session(participant_id, open.joined_at, at, duration)
            .await?;
        debug!(%participant_id, closed, duration, "Close session");
        Ok(closed.then_some(duration))
    }

    /// Closes every open session of the meeting and marks all attached
    /// participants LEFT. Returns how many participants were flipped.
    pub async fn close_all_for_meeting(&self, meeting_id: ObjectId, at: DateTime) -> MeetingResult<usize> {
        let attached = self
            .participants
            .list_by_meeting(meeting_id, Some(&ParticipantStatus::ACTIVE))
            .await?;

        let mut flipped = 0;
        for participant in attached {
            let Some(id) = participant.id else { continue };
            if participant.open_session().is_some() {
                self.close_session(id, at).await?;
            }
            if self
                .participants
                .transition_status(id, &ParticipantStatus::ACTIVE, ParticipantStatus::Left)
                .await?
            {
                flipped += 1;
            }
        }
        debug!(%meeting_id, flipped, "Closed all sessions");
        Ok(flipped)
    }
}
