//! Wire types for the League client (LCU) REST payloads and websocket events.
//!
//! The REST side uses camelCase JSON. The websocket side speaks a small subset
//! of WAMP 1.0: the plugin sends `[5, topic]` to subscribe and receives
//! `[8, topic, payload]` event frames, where `payload` is a [`JsonApiEvent`].
//!
//! Decoding is lenient. The chat topic fires for every change
//! below `/lol-chat/v1/conversations` (conversation lists, read markers,
//! deletions with `null` data), and only message objects are of interest.
//! Frames that do not decode into a known event are reported as `None`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

// ── Topics and opcodes ──────────────────────────────────────────────

/// Websocket topic carrying chat conversation and message changes.
pub const CHAT_TOPIC: &str = "OnJsonApiEvent_lol-chat_v1_conversations";

/// Websocket topic carrying party membership snapshots.
pub const LOBBY_COMMS_TOPIC: &str = "OnJsonApiEvent_lol-lobby_v2_comms";

/// WAMP opcode for a subscription request.
pub const WAMP_SUBSCRIBE: u8 = 5;

/// WAMP opcode for an event delivery.
pub const WAMP_EVENT: u8 = 8;

/// Chat server domain used to address party conversations on NA.
pub const DEFAULT_CHAT_DOMAIN: &str = "sec.na1.pvp.net";

// ── Identifiers ─────────────────────────────────────────────────────

/// Summoner identifier as used by the LCU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SummonerId(pub u64);

impl fmt::Display for SummonerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SummonerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ── REST payloads ───────────────────────────────────────────────────

/// Response of `GET /lol-summoner/v1/current-summoner` (only the fields used).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSummoner {
    pub summoner_id: SummonerId,
}

/// One entry of `GET /lol-lobby/v2/lobby/members`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyMember {
    pub summoner_id: SummonerId,
    #[serde(default)]
    pub summoner_name: String,
    #[serde(default)]
    pub is_leader: bool,
}

/// Body of `POST /lol-chat/v1/conversations/{id}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingChatMessage {
    pub body: String,
}

// ── Domain values ───────────────────────────────────────────────────

/// A party member reduced to what leadership tracking needs.
///
/// Recomputed from every snapshot; only the tracker keeps one around, as its
/// desired leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyMember {
    pub summoner_id: SummonerId,
    pub name: String,
}

impl PartyMember {
    pub fn new(summoner_id: impl Into<SummonerId>, name: impl Into<String>) -> Self {
        Self {
            summoner_id: summoner_id.into(),
            name: name.into(),
        }
    }
}

impl From<&LobbyMember> for PartyMember {
    fn from(member: &LobbyMember) -> Self {
        Self {
            summoner_id: member.summoner_id,
            name: member.summoner_name.clone(),
        }
    }
}

impl From<&CommsPlayer> for PartyMember {
    fn from(player: &CommsPlayer) -> Self {
        Self {
            summoner_id: player.summoner_id,
            name: player.name().to_string(),
        }
    }
}

/// The chat conversation belonging to a party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatChannel {
    pub party_id: String,
    pub domain: String,
}

impl ChatChannel {
    pub fn party(party_id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            party_id: party_id.into(),
            domain: domain.into(),
        }
    }

    /// Conversation id in `party@domain` form.
    pub fn conversation_id(&self) -> String {
        format!("{}@{}", self.party_id, self.domain)
    }
}

// ── Websocket payloads ──────────────────────────────────────────────

/// Role of a player inside a party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartyRole {
    Leader,
    Member,
    Invited,
    Declined,
    Kicked,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A player entry of the `lol-lobby/v2/comms` snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommsPlayer {
    pub summoner_id: SummonerId,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: PartyRole,
}

impl CommsPlayer {
    /// Name shown to other players; falls back to the display name.
    pub fn name(&self) -> &str {
        if self.game_name.is_empty() {
            &self.display_name
        } else {
            &self.game_name
        }
    }

    pub fn is_leader(&self) -> bool {
        self.role == PartyRole::Leader
    }
}

/// Full party membership at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyComms {
    pub party_id: String,
    #[serde(default)]
    pub players: HashMap<String, CommsPlayer>,
}

impl LobbyComms {
    pub fn party_size(&self) -> usize {
        self.players.len()
    }

    /// The player currently holding the leader role, if any.
    pub fn leader(&self) -> Option<&CommsPlayer> {
        self.players.values().find(|player| player.is_leader())
    }

    /// Whether `summoner_id` holds the leader role in this snapshot.
    pub fn is_leader(&self, summoner_id: SummonerId) -> bool {
        self.players
            .values()
            .any(|player| player.summoner_id == summoner_id && player.is_leader())
    }
}

/// A chat message object from the conversations topic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// `groupchat`, `chat`, `system`, ...
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub from_summoner_id: SummonerId,
    #[serde(default)]
    pub body: String,
}

impl ChatMessage {
    pub fn is_groupchat(&self) -> bool {
        self.kind == "groupchat"
    }
}

/// Kind of change reported by a [`JsonApiEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Create,
    Update,
    Delete,
    #[serde(other)]
    Unknown,
}

/// Envelope of every LCU websocket event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonApiEvent {
    #[serde(default)]
    pub data: Value,
    pub event_type: EventType,
    #[serde(default)]
    pub uri: String,
}

/// A decoded event the plugin reacts to.
#[derive(Debug, Clone)]
pub enum LcuEvent {
    /// Something under the chat conversations tree that looks like a message.
    ChatMessage {
        event_type: EventType,
        message: ChatMessage,
    },
    /// A new party membership snapshot.
    LobbyChanged(LobbyComms),
}

impl LcuEvent {
    /// Decode a websocket text frame.
    ///
    /// Returns `Ok(None)` for frames that are valid JSON but carry nothing the
    /// plugin handles (welcome frames, other topics, payloads of another shape).
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Serialization`](crate::PluginError::Serialization)
    /// if the frame is not JSON at all.
    pub fn decode(text: &str) -> Result<Option<Self>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let frame: Value = serde_json::from_str(text)?;
        let Some((topic, payload)) = split_event_frame(frame) else {
            return Ok(None);
        };

        let event: JsonApiEvent = match serde_json::from_value(payload) {
            Ok(event) => event,
            Err(e) => {
                debug!(topic = %topic, "skipping event with unexpected envelope: {e}");
                return Ok(None);
            }
        };

        match topic.as_str() {
            CHAT_TOPIC => match serde_json::from_value::<ChatMessage>(event.data) {
                Ok(message) => Ok(Some(Self::ChatMessage {
                    event_type: event.event_type,
                    message,
                })),
                Err(e) => {
                    debug!(uri = %event.uri, "skipping non-message chat event: {e}");
                    Ok(None)
                }
            },
            LOBBY_COMMS_TOPIC => match serde_json::from_value::<LobbyComms>(event.data) {
                Ok(comms) => Ok(Some(Self::LobbyChanged(comms))),
                Err(e) => {
                    debug!(uri = %event.uri, "skipping lobby event without snapshot: {e}");
                    Ok(None)
                }
            },
            other => {
                debug!(topic = %other, "skipping event from unhandled topic");
                Ok(None)
            }
        }
    }
}

/// Split `[8, topic, payload]` into its parts.
fn split_event_frame(frame: Value) -> Option<(String, Value)> {
    let Value::Array(parts) = frame else {
        return None;
    };
    let mut parts = parts.into_iter();
    let opcode = parts.next()?.as_u64()?;
    if opcode != u64::from(WAMP_EVENT) {
        return None;
    }
    let topic = parts.next()?.as_str()?.to_string();
    let payload = parts.next()?;
    Some((topic, payload))
}

/// Build the WAMP frame subscribing to `topic`.
pub fn subscribe_frame(topic: &str) -> String {
    serde_json::json!([WAMP_SUBSCRIBE, topic]).to_string()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(topic: &str, event_type: &str, data: Value) -> String {
        json!([8, topic, { "data": data, "eventType": event_type, "uri": "/test" }]).to_string()
    }

    #[test]
    fn subscribe_frame_format() {
        assert_eq!(
            subscribe_frame(LOBBY_COMMS_TOPIC),
            r#"[5,"OnJsonApiEvent_lol-lobby_v2_comms"]"#
        );
    }

    #[test]
    fn decodes_lobby_snapshot() {
        let text = frame(
            LOBBY_COMMS_TOPIC,
            "Update",
            json!({
                "partyId": "abc-123",
                "players": {
                    "p1": { "summonerId": 1, "gameName": "Self", "role": "LEADER" },
                    "p2": { "summonerId": 2, "gameName": "Other", "role": "MEMBER" }
                }
            }),
        );
        let Some(LcuEvent::LobbyChanged(comms)) = LcuEvent::decode(&text).unwrap() else {
            panic!("expected lobby snapshot");
        };
        assert_eq!(comms.party_id, "abc-123");
        assert_eq!(comms.party_size(), 2);
        assert!(comms.is_leader(SummonerId(1)));
        assert!(!comms.is_leader(SummonerId(2)));
        assert_eq!(comms.leader().unwrap().name(), "Self");
    }

    #[test]
    fn unknown_roles_do_not_fail_decoding() {
        let text = frame(
            LOBBY_COMMS_TOPIC,
            "Update",
            json!({
                "partyId": "p",
                "players": { "x": { "summonerId": 9, "role": "SPECTATOR" } }
            }),
        );
        let Some(LcuEvent::LobbyChanged(comms)) = LcuEvent::decode(&text).unwrap() else {
            panic!("expected lobby snapshot");
        };
        assert_eq!(comms.players["x"].role, PartyRole::Unknown);
    }

    #[test]
    fn decodes_chat_message() {
        let text = frame(
            CHAT_TOPIC,
            "Create",
            json!({ "type": "groupchat", "fromSummonerId": 7, "body": "hi" }),
        );
        let Some(LcuEvent::ChatMessage {
            event_type,
            message,
        }) = LcuEvent::decode(&text).unwrap()
        else {
            panic!("expected chat message");
        };
        assert_eq!(event_type, EventType::Create);
        assert!(message.is_groupchat());
        assert_eq!(message.from_summoner_id, SummonerId(7));
        assert_eq!(message.body, "hi");
    }

    #[test]
    fn lobby_delete_with_null_data_is_skipped() {
        let text = frame(LOBBY_COMMS_TOPIC, "Delete", Value::Null);
        assert!(LcuEvent::decode(&text).unwrap().is_none());
    }

    #[test]
    fn chat_list_updates_are_skipped() {
        let text = frame(CHAT_TOPIC, "Update", json!([{ "id": "a" }]));
        assert!(LcuEvent::decode(&text).unwrap().is_none());
    }

    #[test]
    fn other_frames_are_skipped() {
        for text in [
            String::new(),
            r#"[0,"session",1,"server"]"#.to_string(),
            frame("OnJsonApiEvent", "Update", json!({})),
            r#"{"not":"a frame"}"#.to_string(),
        ] {
            assert!(LcuEvent::decode(&text).unwrap().is_none(), "{text}");
        }
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(LcuEvent::decode("[8, broken").is_err());
    }

    #[test]
    fn comms_player_name_falls_back_to_display_name() {
        let value = json!({ "summonerId": 3, "displayName": "Old Name" });
        let player: CommsPlayer = serde_json::from_value(value).unwrap();
        assert_eq!(player.name(), "Old Name");
        assert_eq!(PartyMember::from(&player), PartyMember::new(3, "Old Name"));
    }

    #[test]
    fn current_summoner_ignores_profile_fields() {
        let value = json!({ "summonerId": 42, "gameName": "Me", "puuid": "p-1" });
        let summoner: CurrentSummoner = serde_json::from_value(value).unwrap();
        assert_eq!(summoner.summoner_id, SummonerId(42));
    }

    #[test]
    fn party_conversation_id() {
        let channel = ChatChannel::party("abc", DEFAULT_CHAT_DOMAIN);
        assert_eq!(channel.conversation_id(), "abc@sec.na1.pvp.net");
    }
}
