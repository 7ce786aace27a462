#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! End-to-end session tests.
//!
//! Drives a real `PartyOwnerClient` with the stateful `MockApi` and a
//! channel-fed `MockTransport` from `tests/common`, pushing websocket frames
//! the way the League client would and checking the REST calls and events
//! that come out.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use reject_party_owner::{
    PartyMember, PartyOwnerClient, PluginConfig, PluginError, PluginEvent, SkipReason, SummonerId,
};
use tokio::sync::mpsc;

use common::{
    chat_frame, lobby_frame, member, next_event, FrameSender, IdentityReply, MockApi,
    MockTransport,
};

const PARTY: &str = "party-1";
const CONVERSATION: &str = "party-1@sec.na1.pvp.net";

fn bee() -> PartyMember {
    PartyMember::new(2, "Bee")
}

fn cee() -> PartyMember {
    PartyMember::new(3, "Cee")
}

fn config() -> PluginConfig {
    PluginConfig::default().with_identity_retry_delay(Duration::ZERO)
}

struct Session {
    client: PartyOwnerClient,
    events: mpsc::Receiver<PluginEvent>,
    frames: FrameSender,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl Session {
    fn push(&self, frame: String) {
        self.frames.send(Ok(frame)).unwrap();
    }

    async fn next(&mut self) -> PluginEvent {
        next_event(&mut self.events).await
    }
}

/// Start a session and consume its `Ready` event.
async fn start(api: &MockApi) -> (Session, PluginEvent) {
    let (transport, frames, sent, closed) = MockTransport::new();
    let (client, mut events) = PartyOwnerClient::start(api.clone(), transport, config())
        .await
        .expect("bootstrap should succeed");
    let ready = next_event(&mut events).await;
    let session = Session {
        client,
        events,
        frames,
        sent,
        closed,
    };
    (session, ready)
}

/// Party of Me, Bee and Cee where Bee leads.
fn api_with_bee_leading() -> MockApi {
    let api = MockApi::new(1);
    api.set_members(vec![
        member(1, "Me", false),
        member(2, "Bee", true),
        member(3, "Cee", false),
    ]);
    api
}

/// Snapshot in which the local user leads `others`.
fn me_leading(others: &[(u64, &str)]) -> String {
    let mut players = vec![(1, "Me", "LEADER")];
    players.extend(others.iter().map(|(id, name)| (*id, *name, "MEMBER")));
    lobby_frame(PARTY, &players)
}

// ════════════════════════════════════════════════════════════════════
// Bootstrap
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn ready_reports_identity_and_current_leader() {
    let api = api_with_bee_leading();
    let (mut session, ready) = start(&api).await;

    assert_eq!(
        ready,
        PluginEvent::Ready {
            identity: SummonerId(1),
            desired_leader: Some(bee()),
        }
    );
    assert_eq!(session.client.identity(), SummonerId(1));
    assert!(session.client.is_enabled().await);

    let sent = session.sent.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![
            r#"[5,"OnJsonApiEvent_lol-chat_v1_conversations"]"#.to_string(),
            r#"[5,"OnJsonApiEvent_lol-lobby_v2_comms"]"#.to_string(),
        ]
    );

    session.client.shutdown().await;
}

#[tokio::test]
async fn refused_identity_is_retried_until_the_client_is_up() {
    let api = MockApi::new(1).with_identity_replies(vec![IdentityReply::Refused; 5]);
    let (mut session, ready) = start(&api).await;

    assert!(matches!(
        ready,
        PluginEvent::Ready {
            identity: SummonerId(1),
            ..
        }
    ));
    assert_eq!(api.identity_attempts(), 6);

    session.client.shutdown().await;
}

#[tokio::test]
async fn server_error_on_identity_fails_immediately() {
    let api = MockApi::new(1).with_identity_replies(vec![IdentityReply::Status(503)]);
    let (transport, _frames, sent, closed) = MockTransport::new();

    let err = PartyOwnerClient::start(api.clone(), transport, config())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(api.identity_attempts(), 1);
    assert!(sent.lock().unwrap().is_empty(), "nothing may be subscribed");
    assert!(closed.load(Ordering::Relaxed));
}

#[tokio::test]
async fn exhausted_retries_surface_the_last_error() {
    let api = MockApi::new(1).with_identity_replies(vec![IdentityReply::Refused; 10]);
    let (transport, _frames, _sent, _closed) = MockTransport::new();

    let err = PartyOwnerClient::start(
        api.clone(),
        transport,
        config().with_identity_retry_attempts(3),
    )
    .await
    .unwrap_err();

    assert!(err.is_connection_refused(), "got {err:?}");
    assert_eq!(api.identity_attempts(), 3);
}

#[tokio::test]
async fn client_errors_on_identity_are_retried() {
    let api = MockApi::new(7)
        .with_identity_replies(vec![IdentityReply::Status(404), IdentityReply::Refused]);
    let (mut session, ready) = start(&api).await;

    assert!(matches!(
        ready,
        PluginEvent::Ready {
            identity: SummonerId(7),
            ..
        }
    ));
    assert_eq!(api.identity_attempts(), 3);

    session.client.shutdown().await;
}

#[tokio::test]
async fn unreadable_party_at_startup_means_no_desired_leader() {
    let api = MockApi::new(1);
    let (mut session, ready) = start(&api).await;

    assert_eq!(
        ready,
        PluginEvent::Ready {
            identity: SummonerId(1),
            desired_leader: None,
        }
    );

    session.client.shutdown().await;
}

#[tokio::test]
async fn leading_at_startup_means_no_desired_leader() {
    let api = MockApi::new(1);
    api.set_members(vec![member(1, "Me", true), member(2, "Bee", false)]);
    let (mut session, ready) = start(&api).await;

    assert!(matches!(
        ready,
        PluginEvent::Ready {
            desired_leader: None,
            ..
        }
    ));

    session.push(me_leading(&[(2, "Bee")]));
    assert_eq!(
        session.next().await,
        PluginEvent::TransferSkipped {
            reason: SkipReason::AlwaysLeader
        }
    );
    assert!(api.promotions().is_empty());

    session.client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Transfers
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn hands_leadership_back_to_previous_leader() {
    let api = api_with_bee_leading();
    let (mut session, _ready) = start(&api).await;

    api.set_members(vec![
        member(1, "Me", true),
        member(2, "Bee", false),
        member(3, "Cee", false),
    ]);
    session.push(me_leading(&[(2, "Bee"), (3, "Cee")]));

    assert_eq!(
        session.next().await,
        PluginEvent::LeaderTransferred {
            target: bee(),
            replaced: None,
        }
    );
    assert_eq!(api.promotions(), vec![SummonerId(2)]);
    assert_eq!(
        api.chats(),
        vec![(
            CONVERSATION.to_string(),
            "Bee, I do not wish to be party leader".to_string()
        )]
    );
    assert_eq!(session.client.desired_leader().await, Some(bee()));

    session.client.shutdown().await;
}

#[tokio::test]
async fn falls_back_to_remaining_member_when_previous_leader_left() {
    let api = api_with_bee_leading();
    let (mut session, _ready) = start(&api).await;

    // Bee passed leadership on and left before the transfer re-read the party.
    api.set_members(vec![member(1, "Me", true), member(3, "Cee", false)]);
    session.push(me_leading(&[(2, "Bee"), (3, "Cee")]));

    assert_eq!(
        session.next().await,
        PluginEvent::LeaderTransferred {
            target: cee(),
            replaced: Some(bee()),
        }
    );
    assert_eq!(api.promotions(), vec![SummonerId(3)]);
    assert!(api.chats()[0].1.starts_with("Cee,"));
    assert_eq!(session.client.desired_leader().await, Some(cee()));

    session.client.shutdown().await;
}

#[tokio::test]
async fn duplicate_snapshot_promotes_once() {
    let api = api_with_bee_leading();
    let (mut session, _ready) = start(&api).await;

    api.set_members(vec![
        member(1, "Me", true),
        member(2, "Bee", false),
        member(3, "Cee", false),
    ]);
    let snapshot = me_leading(&[(2, "Bee"), (3, "Cee")]);
    session.push(snapshot.clone());
    session.push(snapshot);

    assert!(matches!(session.next().await, PluginEvent::LeaderTransferred { .. }));
    assert_eq!(
        session.next().await,
        PluginEvent::TransferSkipped {
            reason: SkipReason::NoLongerLeader
        }
    );
    assert_eq!(api.promotions(), vec![SummonerId(2)]);
    assert_eq!(api.chats().len(), 1);

    session.client.shutdown().await;
}

#[tokio::test]
async fn alone_in_party_does_nothing() {
    let api = api_with_bee_leading();
    let (mut session, _ready) = start(&api).await;

    session.push(lobby_frame(PARTY, &[(1, "Me", "LEADER")]));

    assert_eq!(
        session.next().await,
        PluginEvent::TransferSkipped {
            reason: SkipReason::Alone
        }
    );
    assert!(api.promotions().is_empty());
    assert_eq!(session.client.desired_leader().await, Some(bee()));

    session.client.shutdown().await;
}

#[tokio::test]
async fn observed_leader_becomes_desired_leader() {
    let api = api_with_bee_leading();
    let (mut session, _ready) = start(&api).await;

    session.push(lobby_frame(
        PARTY,
        &[(1, "Me", "MEMBER"), (2, "Bee", "MEMBER"), (3, "Cee", "LEADER")],
    ));
    assert_eq!(
        session.next().await,
        PluginEvent::LeaderObserved { leader: cee() }
    );
    assert_eq!(session.client.desired_leader().await, Some(cee()));

    // Cee now hands it to us; Cee gets it back.
    api.set_members(vec![
        member(1, "Me", true),
        member(2, "Bee", false),
        member(3, "Cee", false),
    ]);
    session.push(me_leading(&[(2, "Bee"), (3, "Cee")]));
    assert_eq!(
        session.next().await,
        PluginEvent::LeaderTransferred {
            target: cee(),
            replaced: None,
        }
    );
    assert_eq!(api.promotions(), vec![SummonerId(3)]);

    session.client.shutdown().await;
}

#[tokio::test]
async fn unreadable_party_during_transfer_skips() {
    let api = api_with_bee_leading();
    let (mut session, _ready) = start(&api).await;

    api.clear_members();
    session.push(me_leading(&[(2, "Bee")]));

    assert_eq!(
        session.next().await,
        PluginEvent::TransferSkipped {
            reason: SkipReason::MembershipUnavailable
        }
    );
    assert!(api.promotions().is_empty());

    session.client.shutdown().await;
}

#[tokio::test]
async fn failed_promotion_is_reported_and_session_keeps_running() {
    let api = api_with_bee_leading();
    let (mut session, _ready) = start(&api).await;

    api.set_members(vec![member(1, "Me", true), member(2, "Bee", false)]);
    api.fail_promotions(true);
    session.push(me_leading(&[(2, "Bee")]));

    let PluginEvent::TransferFailed { message } = session.next().await else {
        panic!("expected TransferFailed");
    };
    assert!(message.contains("500"), "got {message}");
    assert!(api.chats().is_empty());
    assert!(session.client.is_running());

    api.fail_promotions(false);
    session.push(me_leading(&[(2, "Bee")]));
    assert!(matches!(session.next().await, PluginEvent::LeaderTransferred { .. }));

    session.client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Chat commands
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn chat_commands_toggle_transfers() {
    let api = api_with_bee_leading();
    let (mut session, _ready) = start(&api).await;
    api.set_members(vec![member(1, "Me", true), member(2, "Bee", false)]);

    session.push(chat_frame("groupchat", 1, "enable party owner"));
    assert_eq!(
        session.next().await,
        PluginEvent::Toggled { enabled: false }
    );
    assert!(!session.client.is_enabled().await);

    session.push(me_leading(&[(2, "Bee")]));
    assert_eq!(
        session.next().await,
        PluginEvent::TransferSkipped {
            reason: SkipReason::Disabled
        }
    );
    assert!(api.promotions().is_empty());

    session.push(chat_frame("groupchat", 1, "ok DISABLE PARTY LEADER please"));
    assert_eq!(session.next().await, PluginEvent::Toggled { enabled: true });

    session.push(me_leading(&[(2, "Bee")]));
    assert!(matches!(session.next().await, PluginEvent::LeaderTransferred { .. }));
    assert_eq!(api.promotions(), vec![SummonerId(2)]);

    session.client.shutdown().await;
}

#[tokio::test]
async fn commands_from_others_or_outside_party_chat_are_ignored() {
    let api = api_with_bee_leading();
    let (mut session, _ready) = start(&api).await;
    api.set_members(vec![member(1, "Me", true), member(2, "Bee", false)]);

    session.push(chat_frame("groupchat", 2, "enable party leader"));
    session.push(chat_frame("chat", 1, "enable party leader"));
    session.push(me_leading(&[(2, "Bee")]));

    // Neither message produced an event; the transfer still happens.
    assert!(matches!(session.next().await, PluginEvent::LeaderTransferred { .. }));
    assert!(session.client.is_enabled().await);

    session.client.shutdown().await;
}

#[tokio::test]
async fn disabled_session_still_tracks_leader_changes() {
    let api = api_with_bee_leading();
    let (mut session, _ready) = start(&api).await;

    session.push(chat_frame("groupchat", 1, "enable party leader"));
    assert_eq!(
        session.next().await,
        PluginEvent::Toggled { enabled: false }
    );

    session.push(lobby_frame(
        PARTY,
        &[(1, "Me", "MEMBER"), (2, "Bee", "MEMBER"), (3, "Cee", "LEADER")],
    ));
    assert_eq!(
        session.next().await,
        PluginEvent::LeaderObserved { leader: cee() }
    );
    assert_eq!(session.client.desired_leader().await, Some(cee()));

    session.client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn closed_feed_ends_the_session() {
    let api = api_with_bee_leading();
    let (session, _ready) = start(&api).await;

    let Session {
        mut client,
        mut events,
        frames,
        ..
    } = session;
    drop(frames);

    assert_eq!(
        next_event(&mut events).await,
        PluginEvent::Disconnected { reason: None }
    );
    assert!(!client.is_running());
    client.shutdown().await;
}

#[tokio::test]
async fn receive_error_ends_the_session() {
    let api = api_with_bee_leading();
    let (mut session, _ready) = start(&api).await;

    session
        .frames
        .send(Err(PluginError::TransportReceive("connection reset".into())))
        .unwrap();

    let PluginEvent::Disconnected { reason } = session.next().await else {
        panic!("expected Disconnected");
    };
    assert!(reason.unwrap().contains("connection reset"));

    session.client.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_the_feed() {
    let api = api_with_bee_leading();
    let (mut session, _ready) = start(&api).await;

    session.client.shutdown().await;

    assert!(session.closed.load(Ordering::Relaxed));
    assert_eq!(
        session.next().await,
        PluginEvent::Disconnected {
            reason: Some("client shut down".into())
        }
    );
    assert!(!session.client.is_running());
}
