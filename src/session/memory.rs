// In-memory session
// Implements every collaborator trait over a JSON snapshot and journals the calls it receives

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;

use crate::models::{Membership, PlatformResolution, ThirdPartyIdResolution};
use crate::session::platform::{FallbackPlatformResolver, PlatformInfoResponse};
use crate::session::{
    DiscussionCreator, DiscussionError, MatrixIdComponents, PlatformInfoResolver, RoomDirectory, RoomJoiner,
    RoomLeaver, RoomMembers, Session, ThirdPartyIdResolver,
};

/// State of one room as seen by the local session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomFixture {
    pub room_id: String,
    #[serde(default)]
    pub members: HashMap<String, Membership>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
    /// Joining fails because no server is left in the room
    #[serde(default)]
    pub empty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leave_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_error: Option<String>,
}

impl RoomFixture {
    pub fn new(room_id: &str) -> Self {
        RoomFixture {
            room_id: room_id.to_string(),
            ..Default::default()
        }
    }

    pub fn member(mut self, user_id: &str, membership: Membership) -> Self {
        self.members.insert(user_id.to_string(), membership);
        self
    }

    pub fn created_at(mut self, ts: u64) -> Self {
        self.created_at = Some(ts);
        self
    }

    pub fn empty(mut self) -> Self {
        self.empty = true;
        self
    }

    pub fn join_error(mut self, reason: &str) -> Self {
        self.join_error = Some(reason.to_string());
        self
    }

    pub fn leave_error(mut self, reason: &str) -> Self {
        self.leave_error = Some(reason.to_string());
        self
    }

    pub fn members_error(mut self, reason: &str) -> Self {
        self.members_error = Some(reason.to_string());
        self
    }
}

/// Answers of one identity server to `info` requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityServerFixture {
    /// Email -> response body; unknown addresses get an empty body
    #[serde(default)]
    pub responses: HashMap<String, PlatformInfoResponse>,
    /// Every request fails with this reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unreachable: Option<String>,
}

impl IdentityServerFixture {
    pub fn platform(mut self, email: &str, hostname: &str) -> Self {
        self.responses
            .insert(email.to_string(), PlatformInfoResponse::authorized(hostname));
        self
    }

    pub fn unreachable(mut self, reason: &str) -> Self {
        self.unreachable = Some(reason.to_string());
        self
    }
}

/// Serializable snapshot of a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub user_id: String,
    /// Contact (Matrix ID or email) -> direct room IDs, in session order
    #[serde(default)]
    pub direct_rooms: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub rooms: Vec<RoomFixture>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_error: Option<String>,
    /// Email -> Matrix ID of the account bound to it
    #[serde(default)]
    pub bound_emails: HashMap<String, String>,
    /// Identity server URL -> its answers
    #[serde(default)]
    pub identity_servers: HashMap<String, IdentityServerFixture>,
}

impl SessionSnapshot {
    pub fn new(user_id: &str) -> Self {
        SessionSnapshot {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    /// Adds a direct room shared with `contact_id`
    pub fn direct_room(mut self, contact_id: &str, room: RoomFixture) -> Self {
        self.direct_rooms
            .entry(contact_id.to_string())
            .or_default()
            .push(room.room_id.clone());
        self.rooms.push(room);
        self
    }

    pub fn bound_email(mut self, email: &str, user_id: &str) -> Self {
        self.bound_emails.insert(email.to_string(), user_id.to_string());
        self
    }

    pub fn identity_server(mut self, url: &str, server: IdentityServerFixture) -> Self {
        self.identity_servers.insert(url.to_string(), server);
        self
    }

    fn room(&self, room_id: &str) -> Option<&RoomFixture> {
        self.rooms.iter().find(|room| room.room_id == room_id)
    }

    fn room_mut(&mut self, room_id: &str) -> Option<&mut RoomFixture> {
        self.rooms.iter_mut().find(|room| room.room_id == room_id)
    }
}

/// A call received by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    DirectRooms(String),
    Membership { room_id: String, user_id: String },
    CreationTimestamp(String),
    Join(String),
    Leave(String),
    LookupEmail(String),
    ResolvePlatform { identity_server: String, email: String },
    CreateDiscussion { email: String, identity_server_host: String },
}

pub struct InMemorySession {
    user_id: String,
    state: TokioMutex<SessionSnapshot>,
    journal: Arc<TokioMutex<Vec<SessionCall>>>,
}

impl InMemorySession {
    pub fn new(snapshot: SessionSnapshot) -> Self {
        Self {
            user_id: snapshot.user_id.clone(),
            state: TokioMutex::new(snapshot),
            journal: Arc::new(TokioMutex::new(Vec::new())),
        }
    }

    /// Load a session snapshot from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let snapshot: SessionSnapshot = serde_json::from_str(&contents)?;
        info!(
            "Loaded session for {} with {} rooms from {}",
            snapshot.user_id,
            snapshot.rooms.len(),
            path.display()
        );

        Ok(Self::new(snapshot))
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.clone()
    }

    /// Every call received so far, in order
    pub async fn journal(&self) -> Vec<SessionCall> {
        self.journal.lock().await.clone()
    }

    pub async fn join_calls(&self) -> Vec<String> {
        self.journal
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                SessionCall::Join(room_id) => Some(room_id.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn leave_calls(&self) -> Vec<String> {
        self.journal
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                SessionCall::Leave(room_id) => Some(room_id.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn membership_calls(&self) -> usize {
        self.journal
            .lock()
            .await
            .iter()
            .filter(|call| matches!(call, SessionCall::Membership { .. }))
            .count()
    }

    /// Resolver asking the identity servers of the snapshot in the given order.
    /// A URL missing from the snapshot behaves like an unreachable server.
    pub async fn platform_resolver(&self, urls: &[String]) -> FallbackPlatformResolver {
        let state = self.state.lock().await;
        let servers = urls
            .iter()
            .map(|url| {
                let server = InMemoryIdentityServer {
                    url: url.clone(),
                    fixture: state.identity_servers.get(url).cloned(),
                    journal: self.journal.clone(),
                };
                (url.clone(), Arc::new(server) as Arc<dyn PlatformInfoResolver>)
            })
            .collect();
        FallbackPlatformResolver::new(servers)
    }

    async fn record(&self, call: SessionCall) {
        debug!("Session call: {:?}", call);
        self.journal.lock().await.push(call);
    }
}

#[async_trait]
impl RoomDirectory for InMemorySession {
    async fn direct_rooms(&self, contact_id: &str) -> Result<Vec<String>, DiscussionError> {
        self.record(SessionCall::DirectRooms(contact_id.to_string())).await;
        let state = self.state.lock().await;

        if let Some(reason) = &state.directory_error {
            return Err(DiscussionError::DirectoryLookupFailed {
                contact_id: contact_id.to_string(),
                reason: reason.clone(),
            });
        }

        Ok(state.direct_rooms.get(contact_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl RoomMembers for InMemorySession {
    async fn membership(&self, room_id: &str, user_id: &str) -> Result<Membership, DiscussionError> {
        self.record(SessionCall::Membership {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
        })
        .await;
        let state = self.state.lock().await;

        let room = match state.room(room_id) {
            Some(room) => room,
            None => return Ok(Membership::Absent),
        };
        if let Some(reason) = &room.members_error {
            return Err(DiscussionError::MembershipLookupFailed {
                room_id: room_id.to_string(),
                user_id: user_id.to_string(),
                reason: reason.clone(),
            });
        }

        Ok(room.members.get(user_id).copied().unwrap_or(Membership::Absent))
    }

    async fn creation_timestamp(&self, room_id: &str) -> Option<u64> {
        self.record(SessionCall::CreationTimestamp(room_id.to_string())).await;
        self.state.lock().await.room(room_id).and_then(|room| room.created_at)
    }
}

#[async_trait]
impl RoomJoiner for InMemorySession {
    async fn join_room(&self, room_id: &str) -> Result<(), DiscussionError> {
        self.record(SessionCall::Join(room_id.to_string())).await;
        let mut state = self.state.lock().await;

        let user_id = self.user_id.clone();
        let room = state.room_mut(room_id).ok_or_else(|| DiscussionError::JoinFailed {
            room_id: room_id.to_string(),
            reason: "unknown room".to_string(),
        })?;
        if room.empty {
            return Err(DiscussionError::EmptyRoom {
                room_id: room_id.to_string(),
            });
        }
        if let Some(reason) = &room.join_error {
            return Err(DiscussionError::JoinFailed {
                room_id: room_id.to_string(),
                reason: reason.clone(),
            });
        }

        room.members.insert(user_id, Membership::Join);
        Ok(())
    }
}

#[async_trait]
impl RoomLeaver for InMemorySession {
    async fn leave_room(&self, room_id: &str) -> Result<(), DiscussionError> {
        self.record(SessionCall::Leave(room_id.to_string())).await;
        let mut state = self.state.lock().await;

        let user_id = self.user_id.clone();
        if let Some(room) = state.room_mut(room_id) {
            if let Some(reason) = &room.leave_error {
                return Err(DiscussionError::LeaveFailed {
                    room_id: room_id.to_string(),
                    reason: reason.clone(),
                });
            }
            room.members.insert(user_id, Membership::Leave);
        }

        // Left rooms are no longer listed as direct chats
        for rooms in state.direct_rooms.values_mut() {
            rooms.retain(|id| id != room_id);
        }
        Ok(())
    }
}

impl Session for InMemorySession {
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[async_trait]
impl ThirdPartyIdResolver for InMemorySession {
    async fn lookup_email(&self, email: &str) -> Result<ThirdPartyIdResolution, DiscussionError> {
        self.record(SessionCall::LookupEmail(email.to_string())).await;
        let state = self.state.lock().await;

        Ok(match state.bound_emails.get(email) {
            Some(user_id) => ThirdPartyIdResolution::Bound {
                user_id: user_id.clone(),
            },
            None => ThirdPartyIdResolution::Unbound,
        })
    }
}

/// One identity server of a snapshot
pub struct InMemoryIdentityServer {
    url: String,
    fixture: Option<IdentityServerFixture>,
    journal: Arc<TokioMutex<Vec<SessionCall>>>,
}

#[async_trait]
impl PlatformInfoResolver for InMemoryIdentityServer {
    async fn resolve_platform(&self, email: &str) -> Result<PlatformResolution, DiscussionError> {
        let call = SessionCall::ResolvePlatform {
            identity_server: self.url.clone(),
            email: email.to_string(),
        };
        debug!("Session call: {:?}", call);
        self.journal.lock().await.push(call);

        let fixture = self.fixture.as_ref().ok_or_else(|| DiscussionError::PlatformLookupFailed {
            address: email.to_string(),
            reason: format!("unknown identity server {}", self.url),
        })?;
        if let Some(reason) = &fixture.unreachable {
            return Err(DiscussionError::PlatformLookupFailed {
                address: email.to_string(),
                reason: reason.clone(),
            });
        }

        Ok(fixture
            .responses
            .get(email)
            .map(PlatformInfoResponse::resolution)
            .unwrap_or(PlatformResolution::Unauthorized))
    }
}

#[async_trait]
impl DiscussionCreator for InMemorySession {
    async fn create_discussion_with_email(
        &self,
        email: &str,
        identity_server_host: &str,
    ) -> Result<String, DiscussionError> {
        self.record(SessionCall::CreateDiscussion {
            email: email.to_string(),
            identity_server_host: identity_server_host.to_string(),
        })
        .await;
        let mut state = self.state.lock().await;

        let server = MatrixIdComponents::parse(&self.user_id)
            .map(|components| components.home_server)
            .unwrap_or_else(|| "localhost".to_string());
        let room_id = format!("!{}:{}", state.rooms.len() + 1, server);

        let room = RoomFixture::new(&room_id)
            .member(&self.user_id, Membership::Join)
            .created_at(chrono::Utc::now().timestamp_millis() as u64);
        state.rooms.push(room);
        state
            .direct_rooms
            .entry(email.to_string())
            .or_default()
            .push(room_id.clone());

        info!("Created discussion {} inviting {}", room_id, email);
        Ok(room_id)
    }
}
