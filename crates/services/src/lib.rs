pub mod auth;
pub mod clock;
pub mod dao;
pub mod error;
pub mod media;
pub mod meeting;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use auth::{AuthService, UserRole};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{MeetingError, MeetingResult};
pub use meeting::{Actor, MeetingLifecycleManager};
