//! Session client that keeps party leadership away from the local user.
//!
//! [`PartyOwnerClient::start`] bootstraps a session, then spawns one dispatch
//! task that reads websocket frames and hands each decoded event to its handler.
//! A handler runs to completion, network calls included, before the next
//! frame is read, so there is never more than one transfer in flight.
//!
//! Both handlers share the [`LeadershipTracker`] through a mutex that is held
//! for a whole handler run. With a single dispatch task the lock is never
//! contended; it keeps the one-attempt-at-a-time rule intact for anyone who
//! drives the handlers from more than one task.
//!
//! # Example
//!
//! ```rust,ignore
//! let connection = ConnectionConfig::from_lockfile_path(lockfile)?;
//! let api = HttpLcuClient::new(&connection)?;
//! let transport = LcuWebSocket::connect(&connection).await?;
//! let (mut client, mut events) =
//!     PartyOwnerClient::start(api, transport, PluginConfig::default()).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         PluginEvent::LeaderTransferred { target, .. } => { /* … */ }
//!         PluginEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::api::LcuApi;
use crate::bootstrap::bootstrap;
use crate::config::PluginConfig;
use crate::error::Result;
use crate::event::{PluginEvent, SkipReason};
use crate::executor::TransferExecutor;
use crate::protocol::{ChatMessage, EventType, LcuEvent, LobbyComms, PartyMember, SummonerId};
use crate::tracker::{ChatCommand, LeadershipTracker, MembershipDecision};
use crate::transport::EventTransport;

// ── Handlers ────────────────────────────────────────────────────────

/// Reacts to party membership snapshots.
pub struct MembershipHandler<A> {
    identity: SummonerId,
    tracker: Arc<Mutex<LeadershipTracker>>,
    api: A,
    chat_domain: String,
    rng: StdRng,
}

impl<A: LcuApi> MembershipHandler<A> {
    pub fn new(
        identity: SummonerId,
        tracker: Arc<Mutex<LeadershipTracker>>,
        api: A,
        chat_domain: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            tracker,
            api,
            chat_domain: chat_domain.into(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed random source for fallback selection.
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Handle one snapshot. Returns the event to report, if any.
    ///
    /// # Errors
    ///
    /// Propagates promote and chat failures from the transfer.
    pub async fn handle(&mut self, snapshot: &LobbyComms) -> Result<Option<PluginEvent>> {
        let mut tracker = self.tracker.lock().await;

        let target = match tracker.on_membership_change(self.identity, snapshot) {
            MembershipDecision::Alone => return Ok(Some(skipped(SkipReason::Alone))),
            MembershipDecision::ObservedLeader(leader) => {
                return Ok(leader.map(|leader| PluginEvent::LeaderObserved { leader }))
            }
            MembershipDecision::AlwaysLeader => return Ok(Some(skipped(SkipReason::AlwaysLeader))),
            MembershipDecision::Disabled { .. } => return Ok(Some(skipped(SkipReason::Disabled))),
            MembershipDecision::Transfer { target } => target,
        };

        let executor = TransferExecutor::new(&self.api, self.identity, &self.chat_domain);
        let outcome = executor
            .transfer(&mut tracker, target, &snapshot.party_id, &mut self.rng)
            .await?;
        Ok(Some(outcome.into()))
    }
}

impl<A> std::fmt::Debug for MembershipHandler<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipHandler")
            .field("identity", &self.identity)
            .field("chat_domain", &self.chat_domain)
            .finish()
    }
}

/// Reacts to self-issued party chat commands.
#[derive(Debug, Clone)]
pub struct ChatCommandHandler {
    identity: SummonerId,
    tracker: Arc<Mutex<LeadershipTracker>>,
}

impl ChatCommandHandler {
    pub fn new(identity: SummonerId, tracker: Arc<Mutex<LeadershipTracker>>) -> Self {
        Self { identity, tracker }
    }

    /// Handle one chat event. Returns a [`PluginEvent::Toggled`] when a
    /// command was recognised.
    pub async fn handle(
        &self,
        event_type: EventType,
        message: &ChatMessage,
    ) -> Option<PluginEvent> {
        let command = self
            .tracker
            .lock()
            .await
            .on_chat_message(self.identity, event_type, message)?;
        Some(PluginEvent::Toggled {
            enabled: command == ChatCommand::Resume,
        })
    }
}

fn skipped(reason: SkipReason) -> PluginEvent {
    PluginEvent::TransferSkipped { reason }
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared between the client handle and the dispatch loop.
struct SessionState {
    identity: SummonerId,
    running: AtomicBool,
    tracker: Arc<Mutex<LeadershipTracker>>,
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle to a running session.
///
/// Created via [`PartyOwnerClient::start`], which bootstraps the session,
/// spawns the dispatch loop and returns this handle together with an event
/// receiver.
pub struct PartyOwnerClient {
    state: Arc<SessionState>,
    /// Handle to the background dispatch task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to stop the dispatch loop gracefully.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl PartyOwnerClient {
    /// Bootstrap a session and start dispatching events.
    ///
    /// The first event on the returned receiver is [`PluginEvent::Ready`].
    ///
    /// # Errors
    ///
    /// Fails when the local summoner cannot be resolved (fatal answer or
    /// retries exhausted) or the subscriptions cannot be sent. The transport
    /// is closed in that case.
    pub async fn start<A, T>(
        api: A,
        mut transport: T,
        config: PluginConfig,
    ) -> Result<(Self, mpsc::Receiver<PluginEvent>)>
    where
        A: LcuApi,
        T: EventTransport,
    {
        let boot = match bootstrap(&api, &mut transport, &config).await {
            Ok(boot) => boot,
            Err(e) => {
                error!("bootstrap failed: {e}");
                if let Err(close_err) = transport.close().await {
                    debug!("closing transport after failed bootstrap: {close_err}");
                }
                return Err(e);
            }
        };

        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<PluginEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let tracker = Arc::new(Mutex::new(LeadershipTracker::new(
            boot.desired_leader.clone(),
        )));
        let state = Arc::new(SessionState {
            identity: boot.identity,
            running: AtomicBool::new(true),
            tracker: Arc::clone(&tracker),
        });

        emit_event(
            &event_tx,
            PluginEvent::Ready {
                identity: boot.identity,
                desired_leader: boot.desired_leader,
            },
        );

        let membership =
            MembershipHandler::new(boot.identity, Arc::clone(&tracker), api, config.chat_domain);
        let chat = ChatCommandHandler::new(boot.identity, tracker);

        let task = tokio::spawn(dispatch_loop(
            transport,
            membership,
            chat,
            event_tx,
            Arc::clone(&state),
            shutdown_rx,
        ));

        let client = Self {
            state,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };
        Ok((client, event_rx))
    }

    /// Stop the dispatch loop and close the transport.
    ///
    /// A handler that is mid-transfer finishes first, unless that takes longer
    /// than the configured shutdown timeout, in which case the task is aborted.
    pub async fn shutdown(&mut self) {
        debug!("PartyOwnerClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("dispatch loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("dispatch loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("dispatch loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.running.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// The local summoner this session acts for.
    pub fn identity(&self) -> SummonerId {
        self.state.identity
    }

    /// Returns `true` while the dispatch loop is running.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Whether automatic transfers are currently enabled.
    pub async fn is_enabled(&self) -> bool {
        self.state.tracker.lock().await.is_enabled()
    }

    /// The member leadership would be handed to next.
    pub async fn desired_leader(&self) -> Option<PartyMember> {
        self.state.tracker.lock().await.desired_leader().cloned()
    }
}

impl std::fmt::Debug for PartyOwnerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartyOwnerClient")
            .field("identity", &self.state.identity)
            .field("running", &self.is_running())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for PartyOwnerClient {
    fn drop(&mut self) {
        // No executor to drive a graceful close here; abort instead.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Dispatch loop ───────────────────────────────────────────────────

/// Background loop: one frame, one handler run, then the next frame.
///
/// Exits when shutdown is requested, the transport closes, or the transport
/// reports an error. Handler bodies run outside the `select!` futures, so a
/// shutdown request never cancels a transfer halfway.
async fn dispatch_loop<A, T>(
    mut transport: T,
    mut membership: MembershipHandler<A>,
    chat: ChatCommandHandler,
    event_tx: mpsc::Sender<PluginEvent>,
    state: Arc<SessionState>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) where
    A: LcuApi,
    T: EventTransport,
{
    debug!("dispatch loop started");

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                break;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => match LcuEvent::decode(&text) {
                        Ok(Some(event)) => {
                            if let Some(out) = dispatch(&mut membership, &chat, event).await {
                                emit_event(&event_tx, out);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!("failed to decode websocket frame: {e}"),
                    },
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        emit_disconnected(
                            &event_tx,
                            &state,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    None => {
                        debug!("transport closed by client");
                        emit_disconnected(&event_tx, &state, None).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("dispatch loop exited");
}

/// Route one event to its handler and turn failures into events.
async fn dispatch<A: LcuApi>(
    membership: &mut MembershipHandler<A>,
    chat: &ChatCommandHandler,
    event: LcuEvent,
) -> Option<PluginEvent> {
    match event {
        LcuEvent::LobbyChanged(snapshot) => match membership.handle(&snapshot).await {
            Ok(out) => out,
            Err(e) => {
                error!("party leader transfer failed: {e}");
                Some(PluginEvent::TransferFailed {
                    message: e.to_string(),
                })
            }
        },
        LcuEvent::ChatMessage {
            event_type,
            message,
        } => chat.handle(event_type, &message).await,
    }
}

/// Emit an event without blocking the loop; drop it if the channel is full.
fn emit_event(event_tx: &mpsc::Sender<PluginEvent>, event: PluginEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!("event channel full, dropping event: {dropped:?}");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit [`PluginEvent::Disconnected`] and mark the session stopped.
///
/// Uses `send().await` because it is the last event and must not be dropped.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<PluginEvent>,
    state: &SessionState,
    reason: Option<String>,
) {
    state.running.store(false, Ordering::Release);
    if event_tx
        .send(PluginEvent::Disconnected { reason })
        .await
        .is_err()
    {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::error::PluginError;
    use crate::protocol::{ChatChannel, LobbyMember};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Test doubles ────────────────────────────────────────────────

    /// Always answers identity 1 and an empty party.
    struct IdleApi;

    #[async_trait]
    impl LcuApi for IdleApi {
        async fn current_summoner(&self) -> Result<SummonerId> {
            Ok(SummonerId(1))
        }

        async fn lobby_members(&self) -> Result<Vec<LobbyMember>> {
            Ok(Vec::new())
        }

        async fn promote(&self, _summoner_id: SummonerId) -> Result<()> {
            Ok(())
        }

        async fn post_chat_message(&self, _channel: &ChatChannel, _body: &str) -> Result<()> {
            Ok(())
        }
    }

    /// Replays scripted frames and records what was sent.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, PluginError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, PluginError>>>,
        ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            };
            (transport, sent, closed)
        }
    }

    #[async_trait]
    impl EventTransport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), PluginError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, PluginError>> {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else {
                // Out of script: stay open until shutdown.
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), PluginError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    /// Transport whose `close()` never returns, to exercise the abort path.
    struct HangingCloseTransport {
        close_called: Arc<AtomicBool>,
        dropped: Arc<AtomicBool>,
    }

    impl Drop for HangingCloseTransport {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::Release);
        }
    }

    #[async_trait]
    impl EventTransport for HangingCloseTransport {
        async fn send(&mut self, _message: String) -> std::result::Result<(), PluginError> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, PluginError>> {
            std::future::pending().await
        }

        async fn close(&mut self) -> std::result::Result<(), PluginError> {
            self.close_called.store(true, Ordering::Release);
            std::future::pending().await
        }
    }

    async fn start_idle<T: EventTransport>(
        transport: T,
    ) -> (PartyOwnerClient, mpsc::Receiver<PluginEvent>) {
        PartyOwnerClient::start(IdleApi, transport, PluginConfig::default())
            .await
            .unwrap()
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn start_subscribes_and_reports_ready() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = start_idle(transport).await;

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            PluginEvent::Ready {
                identity: SummonerId(1),
                desired_leader: None
            }
        );
        assert_eq!(client.identity(), SummonerId(1));
        assert!(client.is_running());
        assert!(client.is_enabled().await);

        {
            let frames = sent.lock().unwrap();
            assert_eq!(frames.len(), 2);
            assert!(frames[0].contains("lol-chat_v1_conversations"));
            assert!(frames[1].contains("lol-lobby_v2_comms"));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn disconnected_on_transport_close() {
        let (transport, _sent, _closed) = MockTransport::new(vec![None]);
        let (mut client, mut events) = start_idle(transport).await;

        let _ = events.recv().await; // Ready
        let event = events.recv().await.unwrap();
        assert_eq!(event, PluginEvent::Disconnected { reason: None });
        assert!(!client.is_running());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn transport_recv_error_emits_disconnected() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Err(
            PluginError::TransportReceive("reset by peer".into()),
        ))]);
        let (mut client, mut events) = start_idle(transport).await;

        let _ = events.recv().await; // Ready
        let Some(PluginEvent::Disconnected { reason }) = events.recv().await else {
            panic!("expected Disconnected");
        };
        assert!(reason.unwrap().contains("reset by peer"));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn undecodable_frames_are_skipped() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok("not json".into())),
            Some(Ok(r#"[0,"welcome"]"#.into())),
            None,
        ]);
        let (mut client, mut events) = start_idle(transport).await;

        let _ = events.recv().await; // Ready
        let event = events.recv().await.unwrap();
        assert_eq!(event, PluginEvent::Disconnected { reason: None });

        client.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_closes_transport_and_emits_disconnected() {
        let (transport, _sent, closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = start_idle(transport).await;

        let _ = events.recv().await; // Ready
        client.shutdown().await;

        assert!(closed.load(Ordering::Relaxed));
        assert_eq!(
            events.recv().await.unwrap(),
            PluginEvent::Disconnected {
                reason: Some("client shut down".into())
            }
        );
        assert!(!client.is_running());
    }

    #[tokio::test]
    async fn shutdown_timeout_aborts_stuck_transport_task() {
        let close_called = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicBool::new(false));
        let transport = HangingCloseTransport {
            close_called: Arc::clone(&close_called),
            dropped: Arc::clone(&dropped),
        };
        let config = PluginConfig::default().with_shutdown_timeout(Duration::from_millis(20));
        let (mut client, mut events) = PartyOwnerClient::start(IdleApi, transport, config)
            .await
            .unwrap();

        let _ = events.recv().await; // Ready
        client.shutdown().await;

        assert!(close_called.load(Ordering::Acquire));
        assert!(
            dropped.load(Ordering::Acquire),
            "timed-out shutdown should abort and drop the dispatch task"
        );
        assert!(!client.is_running());
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, _events) = start_idle(transport).await;

        client.shutdown().await;
        client.shutdown().await;
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (client, mut events) = start_idle(transport).await;

        let _ = events.recv().await; // Ready
        drop(client);

        // The aborted task drops its sender; the channel must close.
        while let Some(_event) = events.recv().await {}
    }

    #[tokio::test]
    async fn chat_handler_reports_toggles() {
        let tracker = Arc::new(Mutex::new(LeadershipTracker::new(None)));
        let handler = ChatCommandHandler::new(SummonerId(1), Arc::clone(&tracker));
        let message = ChatMessage {
            kind: "groupchat".into(),
            from_summoner_id: SummonerId(1),
            body: "Enable Party Leader".into(),
        };

        assert_eq!(
            handler.handle(EventType::Create, &message).await,
            Some(PluginEvent::Toggled { enabled: false })
        );
        assert!(!tracker.lock().await.is_enabled());
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, _events) = start_idle(transport).await;

        let printed = format!("{client:?}");
        assert!(printed.contains("PartyOwnerClient"));
        assert!(printed.contains("running"));

        client.shutdown().await;
    }
}
