#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for the integration tests.
//!
//! Provides a stateful [`MockApi`] that behaves like a tiny League client, a
//! channel-fed [`MockTransport`], and helpers building websocket frames.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use reject_party_owner::error::Result;
use reject_party_owner::protocol::{
    ChatChannel, LobbyMember, SummonerId, CHAT_TOPIC, LOBBY_COMMS_TOPIC,
};
use reject_party_owner::{EventTransport, LcuApi, PluginError, PluginEvent};
use serde_json::{json, Value};
use tokio::sync::mpsc;

// ── MockApi ─────────────────────────────────────────────────────────

/// Scripted answer for one identity lookup.
#[derive(Debug, Clone, Copy)]
pub enum IdentityReply {
    Ok(u64),
    Refused,
    Status(u16),
}

/// A call the plugin made against the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CurrentSummoner,
    LobbyMembers,
    Promote(SummonerId),
    Chat { conversation: String, body: String },
}

#[derive(Debug, Default)]
struct ApiState {
    identity: u64,
    identity_replies: VecDeque<IdentityReply>,
    members: Option<Vec<LobbyMember>>,
    fail_promote: bool,
    calls: Vec<ApiCall>,
}

/// In-memory stand-in for the League client REST API.
///
/// Promotions move the leader flag like the real client does, so a second
/// transfer attempt sees that the local user is no longer leader.
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    state: Arc<StdMutex<ApiState>>,
}

impl MockApi {
    /// Answers `identity` to every identity lookup and has no party.
    pub fn new(identity: u64) -> Self {
        let api = Self::default();
        api.state.lock().unwrap().identity = identity;
        api
    }

    /// Answer the first identity lookups with `replies`, then succeed.
    pub fn with_identity_replies(self, replies: Vec<IdentityReply>) -> Self {
        self.state.lock().unwrap().identity_replies = replies.into();
        self
    }

    /// Replace the party returned by `lobby_members`.
    pub fn set_members(&self, members: Vec<LobbyMember>) {
        self.state.lock().unwrap().members = Some(members);
    }

    /// Make `lobby_members` fail with 404.
    pub fn clear_members(&self) {
        self.state.lock().unwrap().members = None;
    }

    pub fn fail_promotions(&self, fail: bool) {
        self.state.lock().unwrap().fail_promote = fail;
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn identity_attempts(&self) -> usize {
        self.count(|c| matches!(c, ApiCall::CurrentSummoner))
    }

    pub fn promotions(&self) -> Vec<SummonerId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ApiCall::Promote(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn chats(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ApiCall::Chat { conversation, body } => Some((conversation, body)),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&ApiCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: ApiCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl LcuApi for MockApi {
    async fn current_summoner(&self) -> Result<SummonerId> {
        self.record(ApiCall::CurrentSummoner);
        let mut state = self.state.lock().unwrap();
        match state.identity_replies.pop_front() {
            None => Ok(SummonerId(state.identity)),
            Some(IdentityReply::Ok(id)) => Ok(SummonerId(id)),
            Some(IdentityReply::Refused) => {
                Err(PluginError::ConnectionRefused("connect ECONNREFUSED 127.0.0.1".into()))
            }
            Some(IdentityReply::Status(status)) => Err(PluginError::Http {
                status,
                message: "scripted".into(),
            }),
        }
    }

    async fn lobby_members(&self) -> Result<Vec<LobbyMember>> {
        self.record(ApiCall::LobbyMembers);
        self.state
            .lock()
            .unwrap()
            .members
            .clone()
            .ok_or_else(|| PluginError::Http {
                status: 404,
                message: "LOBBY_NOT_FOUND".into(),
            })
    }

    async fn promote(&self, summoner_id: SummonerId) -> Result<()> {
        self.record(ApiCall::Promote(summoner_id));
        let mut state = self.state.lock().unwrap();
        if state.fail_promote {
            return Err(PluginError::Http {
                status: 500,
                message: "promotion rejected".into(),
            });
        }
        if let Some(members) = state.members.as_mut() {
            for member in members.iter_mut() {
                member.is_leader = member.summoner_id == summoner_id;
            }
        }
        Ok(())
    }

    async fn post_chat_message(&self, channel: &ChatChannel, body: &str) -> Result<()> {
        self.record(ApiCall::Chat {
            conversation: channel.conversation_id(),
            body: body.into(),
        });
        Ok(())
    }
}

/// REST lobby member.
pub fn member(id: u64, name: &str, is_leader: bool) -> LobbyMember {
    LobbyMember {
        summoner_id: SummonerId(id),
        summoner_name: name.into(),
        is_leader,
    }
}

// ── MockTransport ───────────────────────────────────────────────────

/// Channel-fed transport: tests push frames while the session runs.
///
/// Dropping the [`FrameSender`] closes the transport cleanly.
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<std::result::Result<String, PluginError>>,
    /// Frames sent by the plugin (subscriptions).
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

pub type FrameSender = mpsc::UnboundedSender<std::result::Result<String, PluginError>>;

impl MockTransport {
    pub fn new() -> (Self, FrameSender, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: rx,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, tx, sent, closed)
    }
}

#[async_trait]
impl EventTransport for MockTransport {
    async fn send(&mut self, message: String) -> std::result::Result<(), PluginError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<std::result::Result<String, PluginError>> {
        self.incoming.recv().await
    }

    async fn close(&mut self) -> std::result::Result<(), PluginError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── Frame helpers ───────────────────────────────────────────────────

fn event_frame(topic: &str, event_type: &str, uri: &str, data: Value) -> String {
    json!([8, topic, { "data": data, "eventType": event_type, "uri": uri }]).to_string()
}

/// Lobby comms frame; `players` are `(summoner_id, name, role)`.
pub fn lobby_frame(party_id: &str, players: &[(u64, &str, &str)]) -> String {
    let players: serde_json::Map<String, Value> = players
        .iter()
        .map(|(id, name, role)| {
            (
                format!("puuid-{id}"),
                json!({
                    "summonerId": id,
                    "gameName": name,
                    "gameTag": "NA1",
                    "role": role,
                    "ready": true
                }),
            )
        })
        .collect();
    event_frame(
        LOBBY_COMMS_TOPIC,
        "Update",
        "/lol-lobby/v2/comms",
        json!({ "partyId": party_id, "players": players, "invitations": [] }),
    )
}

/// Newly created chat message frame.
pub fn chat_frame(kind: &str, from: u64, body: &str) -> String {
    event_frame(
        CHAT_TOPIC,
        "Create",
        "/lol-chat/v1/conversations/party%40sec.na1.pvp.net/messages/1",
        json!({
            "id": "1",
            "type": kind,
            "fromSummonerId": from,
            "body": body,
            "timestamp": "2026-01-01T00:00:00.000Z"
        }),
    )
}

// ── Event helpers ───────────────────────────────────────────────────

/// Next event, failing the test instead of hanging.
pub async fn next_event(events: &mut mpsc::Receiver<PluginEvent>) -> PluginEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for plugin event")
        .expect("event channel closed")
}
