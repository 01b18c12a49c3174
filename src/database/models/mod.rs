pub mod review;
pub mod tour;
pub mod user;

pub use review::{Review, ReviewDraft, ReviewPatch};
pub use tour::{Tour, TourAttributes, TourPatch};
pub use user::{Role, User, UserDraft, UserPatch};
