pub mod config;
pub mod discussion;
pub mod invite;
pub mod models;
pub mod session;

// Re-export main types for convenience
pub use discussion::{DiscussionFinder, FinderOptions};
pub use invite::InviteService;
pub use models::*;
pub use session::{DiscussionError, Session};
