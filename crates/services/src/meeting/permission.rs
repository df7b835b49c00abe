use bson::oid::ObjectId;
use huddle_db::models::Meeting;

use super::host::{self, HostIdentity};
use crate::auth::UserRole;
use crate::error::{MeetingError, MeetingResult};

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: ObjectId,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: ObjectId, role: UserRole) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

pub fn require_host_or_admin(meeting: &Meeting, actor: &Actor) -> MeetingResult<HostIdentity> {
    let identity = host::normalize(meeting);
    if actor.is_admin() || host::is_host(&identity, actor.id) {
        Ok(identity)
    } else {
        Err(MeetingError::Forbidden(
            "only the host or an admin can do this".into(),
        ))
    }
}

pub fn require_admin(actor: &Actor) -> MeetingResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(MeetingError::Forbidden("admin role required".into()))
    }
}

pub fn require_can_create(actor: &Actor) -> MeetingResult<()> {
    match actor.role {
        UserRole::Admin | UserRole::Tutor | UserRole::Member => Ok(()),
    }
}
