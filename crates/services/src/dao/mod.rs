pub mod base;
pub mod meeting;
pub mod memory;
pub mod participant;
pub mod store;

pub use base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};
pub use meeting::MeetingDao;
pub use memory::{MemoryMeetingStore, MemoryParticipantStore};
pub use participant::ParticipantDao;
pub use store::{
    MeetingFilter, MeetingGuard, MeetingStore, MeetingUpdate, ParticipantStore, RecordingSnapshot,
};
