pub mod host;
pub mod input;
pub mod invite;
pub mod lifecycle;
pub mod permission;
pub mod recording;
pub mod session;
pub mod side_effect;


pub use host::{HostIdentity, is_host, normalize};
pub use input::{CreateMeetingInput, JoinRequest, MeetingPatch};
pub use lifecycle::{Collaborators, JoinOutcome, MeetingLifecycleManager, parse_id};
pub use permission::Actor;
pub use recording::{CaptureDisposition, RecordingCoordinator};
pub use session::ParticipantSessionTracker;
