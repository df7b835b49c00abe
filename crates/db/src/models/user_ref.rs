use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A user reference as it appears in stored documents.
///
/// Older writers stored either the bare id, its hex string, or an embedded
/// user document in the same field. All three decode here so callers only
/// ever deal with [`UserRef::id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Id(ObjectId),
    Resolved(UserSummary),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub display_name: Option<String>,
}

impl UserRef {
    /// Plain id behind the reference, `None` when a raw string is not a valid id.
    pub fn id(&self) -> Option<ObjectId> {
        match self {
            UserRef::Id(id) => Some(*id),
            UserRef::Resolved(user) => Some(user.id),
            UserRef::Raw(raw) => ObjectId::parse_str(raw.trim()).ok(),
        }
    }
}

impl From<ObjectId> for UserRef {
    fn from(id: ObjectId) -> Self {
        UserRef::Id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Holder {
        host: UserRef,
    }

    #[test]
    fn decodes_bare_object_id() {
        let id = ObjectId::new();
        let holder: Holder = bson::from_document(bson::doc! { "host": id }).unwrap();
        assert_eq!(holder.host.id(), Some(id));
    }

    #[test]
    fn decodes_embedded_user_document() {
        let id = ObjectId::new();
        let holder: Holder = bson::from_document(bson::doc! {
            "host": { "_id": id, "display_name": "Ada" }
        })
        .unwrap();
        assert_eq!(holder.host.id(), Some(id));
    }

    #[test]
    fn decodes_hex_string() {
        let id = ObjectId::new();
        let holder: Holder =
            bson::from_document(bson::doc! { "host": id.to_hex() }).unwrap();
        assert_eq!(holder.host.id(), Some(id));
    }

    #[test]
    fn garbage_string_has_no_id() {
        assert_eq!(UserRef::Raw("not-an-id".into()).id(), None);
    }
}
