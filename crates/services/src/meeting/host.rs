use bson::oid::ObjectId;
use huddle_db::models::{Meeting, UserRef};

/// Both host ids of a meeting, folded to plain ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostIdentity {
    pub original: Option<ObjectId>,
    pub current: Option<ObjectId>,
}

/// A missing side falls back to the other one. Nothing is written back.
pub fn normalize(meeting: &Meeting) -> HostIdentity {
    let original = meeting.original_host_id.as_ref().and_then(UserRef::id);
    let current = meeting.current_host_id.as_ref().and_then(UserRef::id);
    HostIdentity {
        original: original.or(current),
        current: current.or(original),
    }
}

pub fn is_host(identity: &HostIdentity, actor_id: ObjectId) -> bool {
    identity.original == Some(actor_id) || identity.current == Some(actor_id)
}
