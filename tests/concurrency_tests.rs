// Concurrency tests
// The finder reads every candidate room at once, and a lookup dropped mid-join
// must leave the session as it found it

mod common;
use common::{setup_logging, ALICE, BOB};

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Barrier, Notify};

use discussion_finder::models::{DiscussionOutcome, Membership};
use discussion_finder::session::{
    DiscussionError, RoomDirectory, RoomJoiner, RoomLeaver, RoomMembers, Session,
};
use discussion_finder::DiscussionFinder;

struct GatedRoom {
    room_id: &'static str,
    alice: Membership,
    bob: Membership,
    created_at: Option<u64>,
}

/// Session whose reads of Alice's membership wait on a barrier, and whose
/// joins can be made to never complete
struct GatedSession {
    rooms: Vec<GatedRoom>,
    gate: Option<Barrier>,
    hang_on_join: bool,
    join_started: Notify,
    joins_started: AtomicUsize,
    joins_finished: AtomicUsize,
    leaves: AtomicUsize,
    joined: StdMutex<Vec<String>>,
}

impl GatedSession {
    fn new(rooms: Vec<GatedRoom>) -> Self {
        GatedSession {
            rooms,
            gate: None,
            hang_on_join: false,
            join_started: Notify::new(),
            joins_started: AtomicUsize::new(0),
            joins_finished: AtomicUsize::new(0),
            leaves: AtomicUsize::new(0),
            joined: StdMutex::new(Vec::new()),
        }
    }

    fn room(&self, room_id: &str) -> Option<&GatedRoom> {
        self.rooms.iter().find(|room| room.room_id == room_id)
    }

    fn has_joined(&self, room_id: &str) -> bool {
        self.joined.lock().unwrap().iter().any(|id| id == room_id)
    }
}

#[async_trait]
impl RoomDirectory for GatedSession {
    async fn direct_rooms(&self, contact_id: &str) -> Result<Vec<String>, DiscussionError> {
        if contact_id != BOB {
            return Ok(Vec::new());
        }
        Ok(self.rooms.iter().map(|room| room.room_id.to_string()).collect())
    }
}

#[async_trait]
impl RoomMembers for GatedSession {
    async fn membership(&self, room_id: &str, user_id: &str) -> Result<Membership, DiscussionError> {
        if user_id == ALICE {
            if let Some(gate) = &self.gate {
                gate.wait().await;
            }
            if self.has_joined(room_id) {
                return Ok(Membership::Join);
            }
        }

        let room = match self.room(room_id) {
            Some(room) => room,
            None => return Ok(Membership::Absent),
        };
        Ok(if user_id == ALICE { room.alice } else { room.bob })
    }

    async fn creation_timestamp(&self, room_id: &str) -> Option<u64> {
        self.room(room_id).and_then(|room| room.created_at)
    }
}

#[async_trait]
impl RoomJoiner for GatedSession {
    async fn join_room(&self, room_id: &str) -> Result<(), DiscussionError> {
        self.joins_started.fetch_add(1, Ordering::SeqCst);
        self.join_started.notify_one();
        if self.hang_on_join {
            std::future::pending::<()>().await;
        }

        self.joined.lock().unwrap().push(room_id.to_string());
        self.joins_finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl RoomLeaver for GatedSession {
    async fn leave_room(&self, _room_id: &str) -> Result<(), DiscussionError> {
        self.leaves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Session for GatedSession {
    fn user_id(&self) -> &str {
        ALICE
    }
}

fn room(room_id: &'static str, alice: Membership, bob: Membership, created_at: Option<u64>) -> GatedRoom {
    GatedRoom {
        room_id,
        alice,
        bob,
        created_at,
    }
}

#[tokio::test]
async fn test_membership_reads_run_concurrently() {
    setup_logging();
    let rooms = vec![
        room("!a", Membership::Join, Membership::Join, Some(5)),
        room("!b", Membership::Join, Membership::Join, Some(1)),
        room("!c", Membership::Join, Membership::Join, None),
    ];
    // Only passes once all three reads are in flight at the same time
    let session = Arc::new(GatedSession {
        gate: Some(Barrier::new(3)),
        ..GatedSession::new(rooms)
    });
    let finder = DiscussionFinder::new(session.clone());

    let outcome = tokio::time::timeout(Duration::from_secs(2), finder.resolve(BOB, true, true)).await;

    assert_eq!(
        outcome.expect("membership reads were serialized"),
        Ok(DiscussionOutcome::JoinedDiscussion("!b".to_string()))
    );
    assert_eq!(session.joins_started.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_timed_out_lookup_commits_nothing() {
    setup_logging();
    let rooms = vec![room("!invite", Membership::Invite, Membership::Join, Some(1))];
    let session = Arc::new(GatedSession {
        hang_on_join: true,
        ..GatedSession::new(rooms)
    });
    let finder = DiscussionFinder::new(session.clone());

    let result = tokio::time::timeout(Duration::from_millis(100), finder.resolve(BOB, true, true)).await;

    assert!(result.is_err(), "lookup should still be waiting on the join");
    assert_eq!(session.joins_started.load(Ordering::SeqCst), 1);
    assert_eq!(session.joins_finished.load(Ordering::SeqCst), 0);
    assert_eq!(session.leaves.load(Ordering::SeqCst), 0);

    // The invite is still pending for the next lookup
    let outcome = finder.resolve(BOB, true, false).await;
    assert_eq!(outcome, Ok(DiscussionOutcome::PendingInvite("!invite".to_string())));
}

#[tokio::test]
async fn test_aborted_lookup_commits_nothing() {
    setup_logging();
    let rooms = vec![room("!invite", Membership::Invite, Membership::Join, Some(1))];
    let session = Arc::new(GatedSession {
        hang_on_join: true,
        ..GatedSession::new(rooms)
    });
    let finder = DiscussionFinder::new(session.clone());

    let task = {
        let finder = finder.clone();
        tokio::spawn(async move { finder.resolve(BOB, true, true).await })
    };
    session.join_started.notified().await;
    task.abort();

    let result = task.await;
    assert!(result.expect_err("task was aborted").is_cancelled());
    assert_eq!(session.joins_finished.load(Ordering::SeqCst), 0);
    assert_eq!(session.leaves.load(Ordering::SeqCst), 0);
    assert!(!session.has_joined("!invite"));
}
