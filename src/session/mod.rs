// Session collaborators for the discussion finder
// Everything the finder needs from the Matrix session goes through these traits

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Membership, PlatformResolution, ThirdPartyIdResolution};

pub mod identifiers;
pub mod memory;
pub mod platform;

pub use identifiers::{is_email_address, is_external_host, is_matrix_user_id, MatrixIdComponents};
pub use memory::{InMemorySession, SessionCall};
pub use platform::{FallbackPlatformResolver, PlatformInfoResponse};

/// Errors surfaced by session collaborators
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscussionError {
    #[error("Direct room lookup failed for {contact_id}: {reason}")]
    DirectoryLookupFailed { contact_id: String, reason: String },

    #[error("Membership lookup failed for {user_id} in {room_id}: {reason}")]
    MembershipLookupFailed { room_id: String, user_id: String, reason: String },

    /// The room has no known servers left to join through
    #[error("Room {room_id} is empty")]
    EmptyRoom { room_id: String },

    #[error("Failed to join {room_id}: {reason}")]
    JoinFailed { room_id: String, reason: String },

    #[error("Failed to leave {room_id}: {reason}")]
    LeaveFailed { room_id: String, reason: String },

    #[error("Third party lookup failed for {address}: {reason}")]
    ThirdPartyLookupFailed { address: String, reason: String },

    #[error("Platform lookup failed for {address}: {reason}")]
    PlatformLookupFailed { address: String, reason: String },

    #[error("Failed to create a discussion with {address}: {reason}")]
    DiscussionCreationFailed { address: String, reason: String },

    #[error("Invalid identity server: {0}")]
    InvalidIdentityServer(String),
}

/// Lists the direct chats shared with a contact.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Room IDs of the direct chats with `contact_id` (a Matrix ID or an email).
    async fn direct_rooms(&self, contact_id: &str) -> Result<Vec<String>, DiscussionError>;
}

/// Reads room state.
#[async_trait]
pub trait RoomMembers: Send + Sync {
    /// Membership of `user_id` in `room_id`, `Membership::Absent` when not a member.
    async fn membership(&self, room_id: &str, user_id: &str) -> Result<Membership, DiscussionError>;

    /// Origin server timestamp of the room creation event, if it can be read.
    async fn creation_timestamp(&self, room_id: &str) -> Option<u64>;
}

#[async_trait]
pub trait RoomJoiner: Send + Sync {
    /// Joins the room. A room without known servers fails with `DiscussionError::EmptyRoom`.
    async fn join_room(&self, room_id: &str) -> Result<(), DiscussionError>;
}

#[async_trait]
pub trait RoomLeaver: Send + Sync {
    async fn leave_room(&self, room_id: &str) -> Result<(), DiscussionError>;
}

/// Everything the discussion finder talks to
pub trait Session: RoomDirectory + RoomMembers + RoomJoiner + RoomLeaver {
    /// The local user's Matrix ID
    fn user_id(&self) -> &str;
}

/// Identity server lookup of an email address
#[async_trait]
pub trait ThirdPartyIdResolver: Send + Sync {
    async fn lookup_email(&self, email: &str) -> Result<ThirdPartyIdResolution, DiscussionError>;
}

/// Resolves the platform an email address is bound to
#[async_trait]
pub trait PlatformInfoResolver: Send + Sync {
    async fn resolve_platform(&self, email: &str) -> Result<PlatformResolution, DiscussionError>;
}

#[async_trait]
pub trait DiscussionCreator: Send + Sync {
    /// Creates a direct chat inviting `email` through the identity server at `identity_server_host`.
    /// Returns the new room ID.
    async fn create_discussion_with_email(
        &self,
        email: &str,
        identity_server_host: &str,
    ) -> Result<String, DiscussionError>;
}
