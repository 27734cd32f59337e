// Common test utilities for integration tests
// This module contains shared code for all integration tests

#![allow(dead_code)]

use std::sync::{Arc, Once};

use log::LevelFilter;

use discussion_finder::{
    discussion::DiscussionFinder,
    models::Membership,
    session::memory::{InMemorySession, RoomFixture, SessionSnapshot},
};

pub const ALICE: &str = "@alice:example.org";
pub const BOB: &str = "@bob:example.org";
pub const BOB_EMAIL: &str = "bob@example.org";
pub const IDENTITY_SERVER: &str = "https://matrix.example.org";
pub const FALLBACK_IDENTITY_SERVER: &str = "https://id.example.net";

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

/// A session owned by Alice
pub fn snapshot() -> SessionSnapshot {
    SessionSnapshot::new(ALICE)
}

/// A direct room between Alice and Bob with the given memberships
pub fn room_with_bob(room_id: &str, alice: Membership, bob: Membership) -> RoomFixture {
    RoomFixture::new(room_id).member(ALICE, alice).member(BOB, bob)
}

pub fn setup_finder(snapshot: SessionSnapshot) -> (Arc<InMemorySession>, DiscussionFinder<InMemorySession>) {
    setup_logging();
    let session = Arc::new(InMemorySession::new(snapshot));
    let finder = DiscussionFinder::new(session.clone());
    (session, finder)
}
