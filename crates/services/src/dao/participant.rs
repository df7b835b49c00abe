use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, DateTime};
use huddle_db::models::{Participant, ParticipantSession, ParticipantStatus};
use mongodb::Database;

use super::base::{BaseDao, DaoResult};
use super::store::ParticipantStore;

pub struct ParticipantDao {
    pub base: BaseDao<Participant>,
}

impl ParticipantDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Participant::COLLECTION),
        }
    }
}

fn status_values(statuses: &[ParticipantStatus]) -> Vec<Bson> {
    statuses.iter().map(|s| Bson::from(s.as_str())).collect()
}

#[async_trait]
impl ParticipantStore for ParticipantDao {
    async fn insert(&self, participant: &Participant) -> DaoResult<Participant> {
        let id = self.base.insert_one(participant).await?;
        self.base.find_by_id(id).await
    }

    async fn find_by_id(&self, id: ObjectId) -> DaoResult<Participant> {
        self.base.find_by_id(id).await
    }

    async fn find_by_meeting_and_user(
        &self,
        meeting_id: ObjectId,
        user_id: ObjectId,
    ) -> DaoResult<Option<Participant>> {
        self.base
            .find_one(doc! { "meeting_id": meeting_id, "user_id": user_id })
            .await
    }

    async fn list_by_meeting(
        &self,
        meeting_id: ObjectId,
        statuses: Option<&[ParticipantStatus]>,
    ) -> DaoResult<Vec<Participant>> {
        let mut filter = doc! { "meeting_id": meeting_id };
        if let Some(statuses) = statuses {
            filter.insert("status", doc! { "$in": status_values(statuses) });
        }
        self.base
            .find_many(filter, Some(doc! { "created_at": 1, "_id": 1 }))
            .await
    }

    async fn transition_status(
        &self,
        id: ObjectId,
        from: &[ParticipantStatus],
        to: ParticipantStatus,
    ) -> DaoResult<bool> {
        self.base
            .update_one(
                doc! { "_id": id, "status": { "$in": status_values(from) } },
                doc! { "$set": { "status": to.as_str() } },
            )
            .await
    }

    async fn push_session_if_none_open(
        &self,
        id: ObjectId,
        session: &ParticipantSession,
    ) -> DaoResult<bool> {
        let filter = doc! {
            "_id": id,
            "sessions": { "$not": { "$elemMatch": { "left_at": null } } },
        };
        let update = doc! { "$push": { "sessions": bson::to_bson(session)? } };
        self.base.update_one(filter, update).await
    }

    async fn close_session(
        &self,
        id: ObjectId,
        joined_at: DateTime,
        left_at: DateTime,
        duration_sec: i64,
    ) -> DaoResult<bool> {
        // Positional update on the one open session; a concurrent close makes
        // the filter miss instead of double-counting.
        let filter = doc! {
            "_id": id,
            "sessions": { "$elemMatch": { "joined_at": joined_at, "left_at": null } },
        };
        let update = doc! {
            "$set": {
                "sessions.$.left_at": left_at,
                "sessions.$.duration_sec": duration_sec,
            },
            "$inc": { "total_duration_sec": duration_sec },
        };
        self.base.update_one(filter, update).await
    }

    async fn delete_by_meeting(&self, meeting_id: ObjectId) -> DaoResult<u64> {
        self.base.hard_delete(doc! { "meeting_id": meeting_id }).await
    }
}
