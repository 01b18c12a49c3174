pub mod auth;
pub mod response;

pub use auth::{restrict_to, CurrentUser, MaybeUser};
pub use response::ApiResponse;
