use serde::{Deserialize, Serialize};

/// A participant's relationship to a room.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Join,
    Invite,
    Leave,
    Absent, // Not a member at all
}

impl Default for Membership {
    fn default() -> Self {
        Membership::Absent
    }
}

/// One direct-chat room shared with the contact we are looking for.
#[derive(Debug, Clone)]
pub struct CandidateRoom {
    pub room_id: String,
    pub self_membership: Membership,
    /// Only meaningful when `is_email_only_invite` is false
    pub other_membership: Membership,
    pub created_at: Option<u64>,
    pub is_email_only_invite: bool,
}

impl CandidateRoom {
    /// A room created to invite a contact known only by email.
    pub fn email_invite(room_id: &str) -> Self {
        CandidateRoom {
            room_id: room_id.to_string(),
            self_membership: Membership::Join,
            other_membership: Membership::Absent,
            created_at: None,
            is_email_only_invite: true,
        }
    }

    pub fn with_members(room_id: &str, self_membership: Membership, other_membership: Membership) -> Self {
        CandidateRoom {
            room_id: room_id.to_string(),
            self_membership,
            other_membership,
            created_at: None,
            is_email_only_invite: false,
        }
    }
}

/// Classification of a candidate room, declared in priority order.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub enum ResolutionCategory {
    JoinedBoth = 0,     // join-join
    ReceivedInvite = 1, // invite-join
    SentInvite = 2,     // join-invite, or email-only
    LeftByOther = 3,    // join|invite-leave
}

impl ResolutionCategory {
    pub const PRIORITY: [ResolutionCategory; 4] = [
        ResolutionCategory::JoinedBoth,
        ResolutionCategory::ReceivedInvite,
        ResolutionCategory::SentInvite,
        ResolutionCategory::LeftByOther,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ResolutionCategory::JoinedBoth => "join-join",
            ResolutionCategory::ReceivedInvite => "invite-join",
            ResolutionCategory::SentInvite => "join-invite",
            ResolutionCategory::LeftByOther => "join|invite-left",
        }
    }
}

/// Result of a discussion lookup.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DiscussionOutcome {
    NoDiscussion,
    JoinedDiscussion(String),
    PendingInvite(String),
}

impl DiscussionOutcome {
    pub fn room_id(&self) -> Option<&str> {
        match self {
            DiscussionOutcome::NoDiscussion => None,
            DiscussionOutcome::JoinedDiscussion(room_id) | DiscussionOutcome::PendingInvite(room_id) => Some(room_id),
        }
    }
}

/// Result of an identity server lookup for an email address.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ThirdPartyIdResolution {
    Bound { user_id: String },
    Unbound,
}

/// Which platform (homeserver) an email address belongs to, if any.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PlatformResolution {
    Authorized { hostname: String },
    Unauthorized,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum InviteOutcome {
    InviteHasBeenSent(String),
    InviteAlreadySent(String),
    InviteIgnoredForDiscoveredUser(String),
    InviteIgnoredForUnauthorizedEmail,
}
