pub mod meeting;
pub mod participant;
pub mod user_ref;

pub use meeting::*;
pub use participant::*;
pub use user_ref::*;
