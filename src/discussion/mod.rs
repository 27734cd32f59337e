//! Discussion finder
//!
//! Finds the direct chat which is the most suitable discussion with a contact.
//! The aim is to keep a single discussion per contact and prevent the client
//! from creating several one-to-one rooms with the same person.

use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::models::{CandidateRoom, DiscussionOutcome, Membership, ResolutionCategory};
use crate::session::{is_matrix_user_id, DiscussionError, Session};

pub mod classify;

use classify::Buckets;

/// Knobs for a single lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinderOptions {
    /// Consider rooms we have been invited to
    pub include_invites: bool,
    /// Join a pending invite before returning it
    pub auto_join: bool,
    /// Consider rooms the contact has left
    pub include_left: bool,
}

impl Default for FinderOptions {
    fn default() -> Self {
        Self {
            include_invites: true,
            auto_join: true,
            include_left: true,
        }
    }
}

// Outcome of one join attempt on a received invite
enum JoinAttempt {
    Joined,
    InvalidReceivedInvite,
}

pub struct DiscussionFinder<S: ?Sized> {
    session: Arc<S>,
}

impl<S: ?Sized> Clone for DiscussionFinder<S> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

impl<S: Session + ?Sized> DiscussionFinder<S> {
    pub fn new(session: Arc<S>) -> Self {
        Self { session }
    }

    /// Returns the current discussion with `contact_id` (a Matrix ID or an email address).
    ///
    /// The result may be a pending invite from this contact when `auto_join` is false.
    /// Errors from the session are returned unchanged. Dropping the returned future
    /// abandons the lookup; a join or leave already sent is not rolled back.
    pub async fn resolve(
        &self,
        contact_id: &str,
        include_invites: bool,
        auto_join: bool,
    ) -> Result<DiscussionOutcome, DiscussionError> {
        let options = FinderOptions {
            include_invites,
            auto_join,
            ..FinderOptions::default()
        };
        self.resolve_with(contact_id, &options).await
    }

    /// Lookup with invites included and auto-join enabled
    pub async fn find_discussion(&self, contact_id: &str) -> Result<DiscussionOutcome, DiscussionError> {
        self.resolve_with(contact_id, &FinderOptions::default()).await
    }

    /// The room of a discussion that has not been left, if any.
    /// Lookup errors are logged and reported as no discussion.
    pub async fn valid_direct_discussion(&self, contact_id: &str) -> Option<String> {
        let options = FinderOptions {
            include_left: false,
            ..FinderOptions::default()
        };

        match self.resolve_with(contact_id, &options).await {
            Ok(outcome) => outcome.room_id().map(str::to_string),
            Err(e) => {
                warn!("[DiscussionFinder] lookup failed for {}: {}", contact_id, e);
                None
            }
        }
    }

    pub async fn resolve_with(
        &self,
        contact_id: &str,
        options: &FinderOptions,
    ) -> Result<DiscussionOutcome, DiscussionError> {
        let room_ids = self.session.direct_rooms(contact_id).await?;
        if room_ids.is_empty() {
            debug!("[DiscussionFinder] user: {} has no direct chat", contact_id);
            return Ok(DiscussionOutcome::NoDiscussion);
        }

        let candidates = self.collect_candidates(contact_id, &room_ids, options.include_invites).await?;
        let mut buckets = Buckets::partition(candidates);
        if !options.include_left {
            buckets.take(ResolutionCategory::LeftByOther);
        }

        let category = match buckets.first_non_empty() {
            Some(category) => category,
            None => {
                info!("[DiscussionFinder] user: {} has no usable discussion", contact_id);
                return Ok(DiscussionOutcome::NoDiscussion);
            }
        };
        info!("[DiscussionFinder] user: {} found {} discussion", contact_id, category.label());

        let mut queue = self.order_by_age(buckets.take(category)).await;
        match category {
            ResolutionCategory::ReceivedInvite if !options.auto_join => Ok(queue
                .pop_front()
                .map(|room| DiscussionOutcome::PendingInvite(room.room_id))
                .unwrap_or(DiscussionOutcome::NoDiscussion)),
            ResolutionCategory::ReceivedInvite => self.join_received_invite(contact_id, queue, buckets).await,
            _ => Ok(queue
                .pop_front()
                .map(|room| DiscussionOutcome::JoinedDiscussion(room.room_id))
                .unwrap_or(DiscussionOutcome::NoDiscussion)),
        }
    }

    // Reads the memberships of every room before classifying any of them
    async fn collect_candidates(
        &self,
        contact_id: &str,
        room_ids: &[String],
        include_invites: bool,
    ) -> Result<Vec<CandidateRoom>, DiscussionError> {
        if !is_matrix_user_id(contact_id) {
            // The contact is an email: these rooms were created to invite it
            return Ok(room_ids.iter().map(|room_id| CandidateRoom::email_invite(room_id)).collect());
        }

        let reads = room_ids
            .iter()
            .map(|room_id| self.read_candidate(room_id, contact_id, include_invites));
        let results = join_all(reads).await;

        let mut candidates = Vec::with_capacity(results.len());
        for result in results {
            if let Some(candidate) = result? {
                candidates.push(candidate);
            }
        }
        Ok(candidates)
    }

    async fn read_candidate(
        &self,
        room_id: &str,
        contact_id: &str,
        include_invites: bool,
    ) -> Result<Option<CandidateRoom>, DiscussionError> {
        let self_membership = self.session.membership(room_id, self.session.user_id()).await?;
        if self_membership == Membership::Invite && !include_invites {
            debug!("[DiscussionFinder] skipping pending invite {}", room_id);
            return Ok(None);
        }

        let other_membership = self.session.membership(room_id, contact_id).await?;
        Ok(Some(CandidateRoom::with_members(room_id, self_membership, other_membership)))
    }

    /// Orders rooms oldest first. Rooms without a readable creation time come last,
    /// ties keep discovery order.
    async fn order_by_age(&self, mut rooms: Vec<CandidateRoom>) -> VecDeque<CandidateRoom> {
        if rooms.len() > 1 {
            let timestamps = join_all(rooms.iter().map(|room| self.session.creation_timestamp(&room.room_id))).await;
            for (room, created_at) in rooms.iter_mut().zip(timestamps) {
                room.created_at = created_at;
            }
            rooms.sort_by_key(|room| (room.created_at.is_none(), room.created_at));
        }
        rooms.into()
    }

    // Joins the oldest usable invite, falling back to sent invites then left rooms
    async fn join_received_invite(
        &self,
        contact_id: &str,
        mut queue: VecDeque<CandidateRoom>,
        mut buckets: Buckets,
    ) -> Result<DiscussionOutcome, DiscussionError> {
        while let Some(room) = queue.pop_front() {
            match self.try_join(&room.room_id).await? {
                JoinAttempt::Joined => {
                    info!("[DiscussionFinder] joined invite {} from {}", room.room_id, contact_id);
                    return Ok(DiscussionOutcome::JoinedDiscussion(room.room_id));
                }
                JoinAttempt::InvalidReceivedInvite => {
                    warn!("[DiscussionFinder] invite {} points to an empty room, leaving it", room.room_id);
                    if let Err(e) = self.session.leave_room(&room.room_id).await {
                        warn!("[DiscussionFinder] ignoring failed leave: {}", e);
                    }
                }
            }
        }

        for category in [ResolutionCategory::SentInvite, ResolutionCategory::LeftByOther] {
            let rooms = buckets.take(category);
            if rooms.is_empty() {
                continue;
            }
            info!("[DiscussionFinder] user: {} falling back to {} discussion", contact_id, category.label());
            if let Some(room) = self.order_by_age(rooms).await.pop_front() {
                return Ok(DiscussionOutcome::JoinedDiscussion(room.room_id));
            }
        }

        Ok(DiscussionOutcome::NoDiscussion)
    }

    async fn try_join(&self, room_id: &str) -> Result<JoinAttempt, DiscussionError> {
        match self.session.join_room(room_id).await {
            Ok(()) => Ok(JoinAttempt::Joined),
            Err(DiscussionError::EmptyRoom { .. }) => Ok(JoinAttempt::InvalidReceivedInvite),
            Err(e) => Err(e),
        }
    }
}
