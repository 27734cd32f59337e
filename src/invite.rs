// Email invites
// Invites someone to join by opening a direct chat with their email address

use log::{error, info, warn};
use std::sync::Arc;

use crate::discussion::DiscussionFinder;
use crate::models::{DiscussionOutcome, InviteOutcome, PlatformResolution, ThirdPartyIdResolution};
use crate::session::{
    is_external_host, DiscussionCreator, DiscussionError, PlatformInfoResolver, Session, ThirdPartyIdResolver,
};

/// Everything the invite flow talks to on the session side
pub trait InviteSession: Session + ThirdPartyIdResolver + DiscussionCreator {}

impl<T> InviteSession for T where T: Session + ThirdPartyIdResolver + DiscussionCreator + ?Sized {}

pub struct InviteService<S: ?Sized> {
    session: Arc<S>,
    finder: DiscussionFinder<S>,
    platforms: Arc<dyn PlatformInfoResolver>,
    identity_servers: Vec<String>,
    external_host_prefixes: Vec<String>,
}

impl<S: InviteSession + ?Sized> InviteService<S> {
    /// `identity_servers` lists the current identity server first; its host
    /// is the one invites are sent through.
    pub fn new(
        session: Arc<S>,
        platforms: Arc<dyn PlatformInfoResolver>,
        identity_servers: Vec<String>,
        external_host_prefixes: Vec<String>,
    ) -> Self {
        Self {
            finder: DiscussionFinder::new(session.clone()),
            session,
            platforms,
            identity_servers,
            external_host_prefixes,
        }
    }

    /// Invites `email` in a direct chat, unless this is already done or
    /// an account already exists for it.
    pub async fn send_email_invite(&self, email: &str) -> Result<InviteOutcome, DiscussionError> {
        match self.session.lookup_email(email).await? {
            ThirdPartyIdResolution::Bound { user_id } => {
                info!("[InviteService] {} is already bound to {}", email, user_id);
                Ok(InviteOutcome::InviteIgnoredForDiscoveredUser(user_id))
            }
            ThirdPartyIdResolution::Unbound => self.invite_unbound_email(email).await,
        }
    }

    async fn invite_unbound_email(&self, email: &str) -> Result<InviteOutcome, DiscussionError> {
        let outcome = self.finder.find_discussion(email).await.map_err(|e| {
            error!("[InviteService] email invite lookup failed: {}", e);
            e
        })?;

        match outcome {
            DiscussionOutcome::NoDiscussion => self.create_discussion(email).await,
            DiscussionOutcome::JoinedDiscussion(room_id) => self.reinvite_if_external(email, room_id).await,
            DiscussionOutcome::PendingInvite(room_id) => Ok(InviteOutcome::InviteAlreadySent(room_id)),
        }
    }

    // Invites to the external platform may expire, so those are sent again
    async fn reinvite_if_external(&self, email: &str, room_id: String) -> Result<InviteOutcome, DiscussionError> {
        let is_external = match self.platforms.resolve_platform(email).await {
            Ok(PlatformResolution::Authorized { hostname }) => is_external_host(&hostname, &self.external_host_prefixes),
            Ok(PlatformResolution::Unauthorized) => false,
            Err(e) => {
                warn!("[InviteService] platform lookup failed for {}: {}", email, e);
                false
            }
        };

        if !is_external {
            return Ok(InviteOutcome::InviteAlreadySent(room_id));
        }

        match self.session.leave_room(&room_id).await {
            Ok(()) => self.create_discussion(email).await,
            Err(e) => {
                warn!("[InviteService] could not leave {}: {}", room_id, e);
                Ok(InviteOutcome::InviteAlreadySent(room_id))
            }
        }
    }

    async fn create_discussion(&self, email: &str) -> Result<InviteOutcome, DiscussionError> {
        match self.platforms.resolve_platform(email).await? {
            PlatformResolution::Unauthorized => Ok(InviteOutcome::InviteIgnoredForUnauthorizedEmail),
            PlatformResolution::Authorized { .. } => {
                let current = self
                    .identity_servers
                    .first()
                    .ok_or_else(|| DiscussionError::InvalidIdentityServer(String::new()))?;
                let host = identity_server_host(current)?;
                let room_id = self
                    .session
                    .create_discussion_with_email(email, &host)
                    .await
                    .map_err(|e| {
                        error!("[InviteService] discussion creation failed: {}", e);
                        e
                    })?;
                Ok(InviteOutcome::InviteHasBeenSent(room_id))
            }
        }
    }
}

/// Host part of the identity server URL
pub fn identity_server_host(identity_server: &str) -> Result<String, DiscussionError> {
    url::Url::parse(identity_server)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .ok_or_else(|| DiscussionError::InvalidIdentityServer(identity_server.to_string()))
}
