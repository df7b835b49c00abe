use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{Meeting, Participant};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Meetings
    create_indexes(
        db,
        Meeting::COLLECTION,
        vec![
            index_unique(bson::doc! { "invite_code": 1 }),
            index(bson::doc! { "status": 1, "created_at": -1 }),
            index(bson::doc! { "original_host_id": 1, "created_at": -1 }),
            index(bson::doc! { "current_host_id": 1, "created_at": -1 }),
            index_sparse(bson::doc! { "recording.capture_id": 1 }),
        ],
    )
    .await?;

    // Participants
    create_indexes(
        db,
        Participant::COLLECTION,
        vec![
            index(bson::doc! { "meeting_id": 1, "user_id": 1 }),
            index(bson::doc! { "meeting_id": 1, "status": 1 }),
        ],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn index_sparse(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().sparse(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
