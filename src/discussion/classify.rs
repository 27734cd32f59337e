// Classification of candidate rooms into resolution buckets

use crate::models::{CandidateRoom, Membership, ResolutionCategory};

/// Classifies a room from the memberships of both parties.
/// Returns None for combinations that do not describe a usable discussion.
pub fn classify(room: &CandidateRoom) -> Option<ResolutionCategory> {
    if room.is_email_only_invite {
        return Some(ResolutionCategory::SentInvite);
    }

    match (room.self_membership, room.other_membership) {
        (Membership::Join, Membership::Join) => Some(ResolutionCategory::JoinedBoth),
        (Membership::Invite, Membership::Join) => Some(ResolutionCategory::ReceivedInvite),
        (Membership::Join, Membership::Invite) => Some(ResolutionCategory::SentInvite),
        (Membership::Join | Membership::Invite, Membership::Leave) => Some(ResolutionCategory::LeftByOther),
        _ => None,
    }
}

/// Candidate rooms grouped by category, each group in discovery order
#[derive(Debug, Default, Clone)]
pub struct Buckets {
    rooms: [Vec<CandidateRoom>; 4],
}

impl Buckets {
    pub fn partition<I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = CandidateRoom>,
    {
        let mut buckets = Buckets::default();
        for room in candidates {
            match classify(&room) {
                Some(category) => buckets.rooms[category as usize].push(room),
                None => log::debug!(
                    "Ignoring room {} ({:?}/{:?})",
                    room.room_id,
                    room.self_membership,
                    room.other_membership
                ),
            }
        }
        buckets
    }

    pub fn get(&self, category: ResolutionCategory) -> &[CandidateRoom] {
        &self.rooms[category as usize]
    }

    /// Removes and returns every room of a category
    pub fn take(&mut self, category: ResolutionCategory) -> Vec<CandidateRoom> {
        std::mem::take(&mut self.rooms[category as usize])
    }

    /// The highest priority category holding at least one room
    pub fn first_non_empty(&self) -> Option<ResolutionCategory> {
        ResolutionCategory::PRIORITY
            .into_iter()
            .find(|category| !self.get(*category).is_empty())
    }
}
