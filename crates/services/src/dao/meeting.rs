use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use huddle_db::models::{Meeting, MeetingStatus, RecordingStatus};
use mongodb::Database;

use super::base::{BaseDao, DaoResult, PaginatedResult, PaginationParams};
use super::store::{MeetingFilter, MeetingGuard, MeetingStore, MeetingUpdate};

pub struct MeetingDao {
    pub base: BaseDao<Meeting>,
}

impl MeetingDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Meeting::COLLECTION),
        }
    }
}

#[async_trait]
impl MeetingStore for MeetingDao {
    async fn insert(&self, meeting: &Meeting) -> DaoResult<Meeting> {
        let id = self.base.insert_one(meeting).await?;
        self.base.find_by_id(id).await
    }

    async fn find_by_id(&self, id: ObjectId) -> DaoResult<Meeting> {
        self.base.find_by_id(id).await
    }

    async fn find_by_invite_code(&self, code: &str) -> DaoResult<Option<Meeting>> {
        self.base.find_one(doc! { "invite_code": code }).await
    }

    async fn find_by_capture_id(&self, capture_id: &str) -> DaoResult<Option<Meeting>> {
        self.base
            .find_one(doc! { "recording.capture_id": capture_id })
            .await
    }

    async fn invite_code_exists(&self, code: &str) -> DaoResult<bool> {
        Ok(self.base.count(doc! { "invite_code": code }).await? > 0)
    }

    async fn list(
        &self,
        filter: &MeetingFilter,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Meeting>> {
        self.base
            .find_paginated(filter_document(filter), Some(doc! { "created_at": -1 }), params)
            .await
    }

    async fn update_guarded(
        &self,
        id: ObjectId,
        guard: &MeetingGuard,
        update: &MeetingUpdate,
    ) -> DaoResult<Option<Meeting>> {
        self.base
            .find_one_and_update(guard_filter(id, guard), update_document(update)?)
            .await
    }

    async fn adjust_participant_count(
        &self,
        id: ObjectId,
        guard: &MeetingGuard,
        delta: i32,
        ceiling: Option<u32>,
    ) -> DaoResult<bool> {
        self.base
            .update_one(
                count_filter(id, guard, delta, ceiling),
                doc! { "$inc": { "participant_count": delta } },
            )
            .await
    }

    async fn delete_guarded(&self, id: ObjectId, guard: &MeetingGuard) -> DaoResult<bool> {
        self.base.delete_one(guard_filter(id, guard)).await
    }
}

fn status_values(statuses: &[MeetingStatus]) -> Vec<Bson> {
    statuses.iter().map(|s| Bson::from(s.as_str())).collect()
}

fn recording_status_values(statuses: &[RecordingStatus]) -> Vec<Bson> {
    statuses.iter().map(|s| Bson::from(s.as_str())).collect()
}

fn count_filter(id: ObjectId, guard: &MeetingGuard, delta: i32, ceiling: Option<u32>) -> Document {
    let mut filter = guard_filter(id, guard);
    if delta < 0 {
        filter.insert("participant_count", doc! { "$gte": -i64::from(delta) });
    } else if let Some(ceiling) = ceiling {
        filter.insert(
            "participant_count",
            doc! { "$lte": i64::from(ceiling) - i64::from(delta) },
        );
    }
    filter
}

fn guard_filter(id: ObjectId, guard: &MeetingGuard) -> Document {
    let mut filter = doc! { "_id": id };
    if let Some(statuses) = &guard.status_in {
        filter.insert("status", doc! { "$in": status_values(statuses) });
    }
    if let Some(statuses) = &guard.recording_status_in {
        // Documents written before recording existed have no sub-document.
        let mut values = recording_status_values(statuses);
        if statuses.contains(&RecordingStatus::None) {
            values.push(Bson::Null);
        }
        filter.insert("recording.status", doc! { "$in": values });
    }
    if let Some(snapshot) = &guard.recording_snapshot {
        filter.insert("recording.recording_id", snapshot.recording_id.clone());
        filter.insert("recording.status", snapshot.status.as_str());
        filter.insert("recording.paused_at", snapshot.paused_at);
        filter.insert("recording.resumed_at", snapshot.resumed_at);
        filter.insert("recording.duration_sec", snapshot.duration_sec);
    }
    if let Some(capture_id) = &guard.capture_id {
        filter.insert("recording.capture_id", capture_id.as_str());
    }
    filter
}

fn filter_document(filter: &MeetingFilter) -> Document {
    let mut doc = Document::new();
    if let Some(status) = filter.status {
        doc.insert("status", status.as_str());
    }
    if let Some(code) = &filter.invite_code {
        doc.insert("invite_code", code.as_str());
    }
    if let Some(host_id) = filter.host_id {
        let hex = host_id.to_hex();
        doc.insert(
            "$or",
            vec![
                doc! { "original_host_id": host_id },
                doc! { "current_host_id": host_id },
                doc! { "original_host_id._id": host_id },
                doc! { "current_host_id._id": host_id },
                doc! { "original_host_id": &hex },
                doc! { "current_host_id": &hex },
            ],
        );
    }
    doc
}

fn update_document(update: &MeetingUpdate) -> DaoResult<Document> {
    let mut set = Document::new();

    if let Some(title) = &update.title {
        set.insert("title", title.as_str());
    }
    if let Some(description) = &update.description {
        set.insert("description", description.clone());
    }
    if let Some(status) = update.status {
        set.insert("status", status.as_str());
    }
    if let Some(host) = update.current_host_id {
        set.insert("current_host_id", host);
    }
    if let Some(code) = &update.invite_code {
        set.insert("invite_code", code.as_str());
    }
    if let Some(is_private) = update.is_private {
        set.insert("is_private", is_private);
    }
    if let Some(hash) = &update.passcode_hash {
        set.insert("passcode_hash", hash.clone());
    }
    if let Some(is_locked) = update.is_locked {
        set.insert("is_locked", is_locked);
    }
    if let Some(scheduled_for) = update.scheduled_for {
        set.insert("scheduled_for", scheduled_for);
    }
    if let Some(at) = update.actual_start_at {
        set.insert("actual_start_at", at);
    }
    if let Some(at) = update.ended_at {
        set.insert("ended_at", at);
    }
    if let Some(at) = update.canceled_at {
        set.insert("canceled_at", at);
    }
    if let Some(duration) = update.duration_min {
        set.insert("duration_min", duration);
    }
    if let Some(max) = update.max_participants {
        set.insert("max_participants", i64::from(max));
    }
    if let Some(count) = update.participant_count {
        set.insert("participant_count", i64::from(count));
    }
    if let Some(recording) = &update.recording {
        set.insert("recording", bson::to_bson(recording)?);
    }

    let mut doc = doc! { "$set": set };
    if let Some(user_id) = update.ban_user_id {
        doc.insert("$addToSet", doc! { "banned_user_ids": user_id });
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_filter_includes_every_precondition() {
        let id = ObjectId::new();
        let guard = MeetingGuard::status_in(&[MeetingStatus::Scheduled, MeetingStatus::Created])
            .recording_status_in(&[RecordingStatus::Recording])
            .capture_id("cap-1");
        let filter = guard_filter(id, &guard);

        assert_eq!(filter.get_object_id("_id").unwrap(), id);
        let statuses = filter.get_document("status").unwrap().get_array("$in").unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(filter.get_str("recording.capture_id").unwrap(), "cap-1");
        let recording = filter
            .get_document("recording.status")
            .unwrap()
            .get_array("$in")
            .unwrap();
        assert_eq!(recording, &vec![Bson::from("recording")]);
    }

    #[test]
    fn seat_reservation_is_conditional_on_status_and_ceiling() {
        let guard = MeetingGuard::status_in(&[MeetingStatus::Live]);
        let filter = count_filter(ObjectId::new(), &guard, 1, Some(25));

        let statuses = filter.get_document("status").unwrap().get_array("$in").unwrap();
        assert_eq!(statuses, &vec![Bson::from("live")]);
        assert_eq!(
            filter.get_document("participant_count").unwrap().get_i64("$lte").unwrap(),
            24
        );

        let release = count_filter(ObjectId::new(), &MeetingGuard::any(), -1, None);
        assert!(release.get("status").is_none());
        assert_eq!(
            release.get_document("participant_count").unwrap().get_i64("$gte").unwrap(),
            1
        );
    }

    #[test]
    fn recording_snapshot_pins_transition_fields() {
        let recording = huddle_db::models::MeetingRecording {
            recording_id: Some("rec-1".into()),
            status: RecordingStatus::Paused,
            paused_at: Some(bson::DateTime::from_millis(5_000)),
            duration_sec: 12,
            ..Default::default()
        };
        let guard = MeetingGuard::any().recording_unchanged(&recording);
        let filter = guard_filter(ObjectId::new(), &guard);

        assert_eq!(filter.get_str("recording.recording_id").unwrap(), "rec-1");
        assert_eq!(filter.get_str("recording.status").unwrap(), "paused");
        assert_eq!(filter.get("recording.resumed_at"), Some(&Bson::Null));
        assert_eq!(filter.get_i64("recording.duration_sec").unwrap(), 12);
    }

    #[test]
    fn none_recording_status_also_matches_missing_subdocument() {
        let guard = MeetingGuard::any().recording_status_in(&[RecordingStatus::None]);
        let filter = guard_filter(ObjectId::new(), &guard);
        let values = filter
            .get_document("recording.status")
            .unwrap()
            .get_array("$in")
            .unwrap();
        assert!(values.contains(&Bson::Null));
    }

    #[test]
    fn update_document_clears_nullable_fields_and_bans_with_add_to_set() {
        let banned = ObjectId::new();
        let update = MeetingUpdate {
            scheduled_for: Some(None),
            status: Some(MeetingStatus::Created),
            ban_user_id: Some(banned),
            ..MeetingUpdate::default()
        };
        let doc = update_document(&update).unwrap();
        let set = doc.get_document("$set").unwrap();
        assert_eq!(set.get("scheduled_for"), Some(&Bson::Null));
        assert_eq!(set.get_str("status").unwrap(), "created");
        assert_eq!(
            doc.get_document("$addToSet")
                .unwrap()
                .get_object_id("banned_user_ids")
                .unwrap(),
            banned
        );
    }
}
