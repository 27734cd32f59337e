// In-memory session tests
// These tests cover loading snapshots from disk and the state changes joins and leaves make

mod common;
use common::{setup_finder, setup_logging, ALICE, BOB};

use anyhow::Result;
use std::fs;
use tempfile::tempdir;

use discussion_finder::models::{DiscussionOutcome, Membership};
use discussion_finder::session::memory::InMemorySession;
use discussion_finder::session::{RoomDirectory, RoomJoiner, RoomLeaver, RoomMembers, Session, SessionCall};
use discussion_finder::DiscussionFinder;

const FIXTURE: &str = r#"{
    "user_id": "@alice:example.org",
    "direct_rooms": {
        "@bob:example.org": ["!old:example.org", "!new:example.org"]
    },
    "rooms": [
        {
            "room_id": "!old:example.org",
            "members": { "@alice:example.org": "invite", "@bob:example.org": "join" },
            "created_at": 1000,
            "empty": true
        },
        {
            "room_id": "!new:example.org",
            "members": { "@alice:example.org": "invite", "@bob:example.org": "join" },
            "created_at": 2000
        }
    ]
}"#;

#[tokio::test]
async fn test_load_snapshot_from_file() -> Result<()> {
    setup_logging();
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("session.json");
    fs::write(&path, FIXTURE)?;

    let session = InMemorySession::load(&path)?;

    assert_eq!(session.user_id(), ALICE);
    assert_eq!(
        session.direct_rooms(BOB).await?,
        vec!["!old:example.org".to_string(), "!new:example.org".to_string()]
    );
    assert_eq!(session.membership("!old:example.org", ALICE).await?, Membership::Invite);
    assert_eq!(session.creation_timestamp("!new:example.org").await, Some(2000));
    Ok(())
}

#[tokio::test]
async fn test_loaded_snapshot_resolution() -> Result<()> {
    setup_logging();
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("session.json");
    fs::write(&path, FIXTURE)?;

    let session = std::sync::Arc::new(InMemorySession::load(&path)?);
    let finder = DiscussionFinder::new(session.clone());

    let outcome = finder.find_discussion(BOB).await?;

    assert_eq!(outcome, DiscussionOutcome::JoinedDiscussion("!new:example.org".to_string()));
    assert_eq!(session.leave_calls().await, vec!["!old:example.org".to_string()]);

    // The empty room is gone from the direct chats
    assert_eq!(session.direct_rooms(BOB).await?, vec!["!new:example.org".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_invalid_snapshot_is_rejected() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("session.json");
    fs::write(&path, r#"{ "rooms": [] }"#)?;

    assert!(InMemorySession::load(&path).is_err(), "user_id is required");
    assert!(InMemorySession::load(&temp_dir.path().join("missing.json")).is_err());
    Ok(())
}

#[tokio::test]
async fn test_unknown_room_membership_is_absent() -> Result<()> {
    let (session, _) = setup_finder(common::snapshot());

    assert_eq!(session.membership("!nowhere", ALICE).await?, Membership::Absent);
    assert!(session.join_room("!nowhere").await.is_err());
    assert!(session.leave_room("!nowhere").await.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_journal_keeps_call_order() -> Result<()> {
    let (session, _) = setup_finder(common::snapshot());

    session.direct_rooms(BOB).await?;
    session.membership("!room", BOB).await?;
    let _ = session.join_room("!room").await;

    assert_eq!(
        session.journal().await,
        vec![
            SessionCall::DirectRooms(BOB.to_string()),
            SessionCall::Membership {
                room_id: "!room".to_string(),
                user_id: BOB.to_string(),
            },
            SessionCall::Join("!room".to_string()),
        ]
    );
    Ok(())
}
