//! Async client for the Totpal game protocol.
//!
//! [`TotpalClient`] is a thin handle that communicates with a background
//! transport loop task via an unbounded MPSC channel. Events are emitted on a
//! bounded channel ([`tokio::sync::mpsc::Receiver<GameEvent>`]) returned from
//! [`TotpalClient::start`], and the mirrored game state is readable at any
//! time through [`TotpalClient::snapshot`].
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = connect_somehow().await;
//! let sessions = Arc::new(InMemorySessionStore::new());
//! let (client, mut events) = TotpalClient::start(transport, TotpalConfig::new(), sessions);
//!
//! client.join("Alice", "wxyz").await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         GameEvent::StateChanged => { /* re-render from client.snapshot() */ }
//!         GameEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::dispatch::Dispatcher;
use crate::error::{Result, TotpalError};
use crate::event::GameEvent;
use crate::notify::Notifier;
use crate::protocol::{
    normalize_game_code, ClientMessage, GameAction, GlobalAction, StatePatch, GAME_CODE_LEN,
};
use crate::session::{self, SessionStore};
use crate::state::GameState;
use crate::store::GameStore;
use crate::transport::Transport;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Toast shown when the transport fails mid-session.
const CONNECT_ERROR_TOAST: &str = "Could not connect to Game Server!";

/// How long the connectivity error toast stays visible.
const CONNECT_ERROR_TIMEOUT: Duration = Duration::from_millis(3000);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`TotpalClient`] connection.
///
/// All fields have sensible defaults.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use totpal_client::TotpalConfig;
///
/// let config = TotpalConfig::new()
///     .with_event_channel_capacity(512)
///     .with_shutdown_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct TotpalConfig {
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up with incoming server messages, events
    /// are dropped (with a warning logged) to avoid blocking the transport
    /// loop. The `Disconnected` event is always delivered regardless of
    /// capacity.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`TotpalClient::shutdown`] is called, the background transport
    /// loop is given this much time to close the transport and emit a final
    /// `Disconnected` event. If the timeout expires the task is aborted.
    ///
    /// Defaults to **1 second**. A zero timeout aborts the transport loop
    /// immediately without waiting for graceful shutdown.
    pub shutdown_timeout: Duration,
}

impl TotpalConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for TotpalConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for the Totpal game protocol.
///
/// Created via [`TotpalClient::start`], which spawns a background transport
/// loop and returns this handle together with an event receiver.
///
/// All action methods serialize a [`ClientMessage`] and queue it to the
/// transport loop; they return once the message is queued (no round-trip
/// await). Lobby actions additionally patch the local document the way the
/// server will confirm it, announced with a `StateChanged` event, so the UI
/// reflects the intent immediately.
pub struct TotpalClient {
    /// Sender half of the command channel to the transport loop.
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    /// The shared state document, also mutated by the transport loop.
    store: GameStore,
    /// Raises local-validation errors without touching the transport.
    notifier: Notifier,
    /// Announces local-patch mutations to the consumer as `StateChanged`.
    events: mpsc::Sender<GameEvent>,
    /// Fast connected flag mirrored from the loop for sync send gating.
    connected: Arc<AtomicBool>,
    /// Handle to the background transport loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the transport loop to shut down gracefully.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
}

impl TotpalClient {
    /// Start the client transport loop and return a handle plus event receiver.
    ///
    /// The loop immediately performs session negotiation: the first outbound
    /// frame is `{connection: "restore", session}` if `sessions` holds a
    /// token, otherwise `{connection: "new"}` — exactly one per transport
    /// open.
    ///
    /// # Arguments
    ///
    /// * `transport` — A connected [`Transport`] implementation.
    /// * `config` — Client configuration.
    /// * `sessions` — Injected session token persistence; pass the same store
    ///   across reconnects to resume the session.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: TotpalConfig,
        sessions: Arc<dyn SessionStore>,
    ) -> (Self, mpsc::Receiver<GameEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientMessage>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<GameEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let store = GameStore::new();
        let notifier = Notifier::new(store.clone(), event_tx.clone());
        let connected = Arc::new(AtomicBool::new(true));

        // Queue the negotiation frame so the transport loop picks it up as
        // the very first outgoing message.
        let negotiation = session::negotiation_request(sessions.as_ref());
        // This cannot fail because we just created the channel.
        let _ = cmd_tx.send(negotiation.into());

        let dispatcher = Dispatcher::new(
            store.clone(),
            notifier.clone(),
            sessions,
            event_tx.clone(),
        );

        let task = tokio::spawn(transport_loop(
            transport,
            cmd_rx,
            event_tx.clone(),
            store.clone(),
            notifier.clone(),
            dispatcher,
            Arc::clone(&connected),
            shutdown_rx,
        ));

        let client = Self {
            cmd_tx,
            store,
            notifier,
            events: event_tx,
            connected,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Lobby actions ───────────────────────────────────────────────

    /// Join an existing game.
    ///
    /// The code is normalized (uppercased, non-alphanumerics stripped) before
    /// validation. Sends `set-name` followed by `join`, in that order — the
    /// server treats name-setting as a prerequisite side channel.
    ///
    /// # Errors
    ///
    /// Returns [`TotpalError::InvalidInput`] (after raising an error toast)
    /// if the name is empty or the code is not 4 alphanumeric characters;
    /// nothing is sent in that case. Returns [`TotpalError::NotConnected`]
    /// if the transport has closed.
    pub async fn join(&self, name: &str, code: &str) -> Result<()> {
        let name = self.validated_name(name).await?;
        let code = normalize_game_code(code);
        if code.len() != GAME_CODE_LEN {
            self.notifier.error("That game code doesn't look right").await;
            return Err(TotpalError::InvalidInput(format!(
                "game code must be {GAME_CODE_LEN} letters or digits"
            )));
        }

        self.store
            .patch(StatePatch {
                name: Some(name.clone()),
                game_code: Some(code.clone()),
                ..StatePatch::default()
            })
            .await;
        emit_event(&self.events, GameEvent::StateChanged);

        self.send(GlobalAction::SetName { name })?;
        self.send(GlobalAction::Join { code })
    }

    /// Create a new game, becoming its host.
    ///
    /// Sends `set-name` followed by `create`, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`TotpalError::InvalidInput`] if the name is empty, or
    /// [`TotpalError::NotConnected`] if the transport has closed.
    pub async fn create(&self, name: &str) -> Result<()> {
        let name = self.validated_name(name).await?;

        self.store
            .patch(StatePatch {
                name: Some(name.clone()),
                ..StatePatch::default()
            })
            .await;
        emit_event(&self.events, GameEvent::StateChanged);

        self.send(GlobalAction::SetName { name })?;
        self.send(GlobalAction::Create)
    }

    // ── Game actions ────────────────────────────────────────────────

    /// Nominate the investigator for the round.
    ///
    /// # Errors
    ///
    /// Returns [`TotpalError::NotConnected`] if the transport has closed.
    pub fn set_guessing(&self, player_id: impl Into<String>) -> Result<()> {
        self.send(GameAction::SetGuessing {
            guessing: player_id.into(),
        })
    }

    /// Submit the local player's article topic.
    ///
    /// # Errors
    ///
    /// Returns [`TotpalError::InvalidInput`] (after raising an error toast)
    /// if the topic is empty, or [`TotpalError::NotConnected`] if the
    /// transport has closed.
    pub async fn set_own_word(&self, word: &str) -> Result<()> {
        let word = word.trim();
        if word.is_empty() {
            self.notifier.error("Enter an article title first").await;
            return Err(TotpalError::InvalidInput("topic must not be empty".into()));
        }

        self.store
            .patch(StatePatch {
                own_word: Some(word.to_string()),
                ..StatePatch::default()
            })
            .await;
        emit_event(&self.events, GameEvent::StateChanged);

        self.send(GameAction::SetOwnWord { word: word.into() })
    }

    /// Host only: remove players whose connections have dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TotpalError::NotConnected`] if the transport has closed.
    pub fn boot_inactive(&self) -> Result<()> {
        self.send(GameAction::BootInactive)
    }

    /// Host only: have the server select the round's word and start it.
    ///
    /// # Errors
    ///
    /// Returns [`TotpalError::NotConnected`] if the transport has closed.
    pub fn start_round(&self) -> Result<()> {
        self.send(GameAction::SelectWord)
    }

    /// Investigator only: accuse a player of being the liar.
    ///
    /// # Errors
    ///
    /// Returns [`TotpalError::NotConnected`] if the transport has closed.
    pub fn guess_liar(&self, player_id: impl Into<String>) -> Result<()> {
        self.send(GameAction::GuessLiar {
            id: player_id.into(),
        })
    }

    /// Host only: reset the game back to the research phase.
    ///
    /// # Errors
    ///
    /// Returns [`TotpalError::NotConnected`] if the transport has closed.
    pub fn reset_game(&self) -> Result<()> {
        self.send(GameAction::ResetGame)
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Shut down the client, closing the transport and stopping the background task.
    ///
    /// After calling this method, the event receiver will yield `None` once
    /// the transport loop exits.
    pub async fn shutdown(&mut self) {
        debug!("TotpalClient: shutdown requested");

        // Signal the transport loop to shut down gracefully.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the transport loop with a timeout. If it doesn't exit in time,
        // abort it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` if the transport is believed to be connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// A cloned snapshot of the current game state document.
    pub async fn snapshot(&self) -> GameState {
        self.store.snapshot().await
    }

    /// A handle to the shared state store, for consumers that want to read
    /// snapshots without going through the client.
    pub fn store(&self) -> GameStore {
        self.store.clone()
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Validate and trim a display name, raising the error toast on failure.
    async fn validated_name(&self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            self.notifier.error("Enter a name first").await;
            return Err(TotpalError::InvalidInput("name must not be empty".into()));
        }
        Ok(name.to_string())
    }

    /// Queue a message to the transport loop.
    fn send(&self, msg: impl Into<ClientMessage>) -> Result<()> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(TotpalError::NotConnected);
        }
        self.cmd_tx
            .send(msg.into())
            .map_err(|_| TotpalError::NotConnected)
    }
}

impl std::fmt::Debug for TotpalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TotpalClient")
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for TotpalClient {
    fn drop(&mut self) {
        // `Drop` is synchronous so we cannot await a graceful shutdown.
        // The only safe action is to abort the spawned task, which causes
        // the transport loop future to be dropped immediately. The
        // `shutdown_tx` oneshot is intentionally *not* sent here: sending
        // it would trigger a graceful path that calls async `transport.close()`,
        // but there is no executor context to drive it inside `Drop`.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Background transport loop that multiplexes send/receive via `tokio::select!`.
///
/// Exits when:
/// - The command channel closes (client handle dropped or shutdown called)
/// - The transport returns `None` (server closed connection)
/// - A transport error occurs
#[allow(clippy::too_many_arguments)]
async fn transport_loop(
    mut transport: impl Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    event_tx: mpsc::Sender<GameEvent>,
    store: GameStore,
    notifier: Notifier,
    dispatcher: Dispatcher,
    connected: Arc<AtomicBool>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    debug!("transport loop started");

    // Acknowledge the open before entering the select loop.
    store.update(|state| state.connected = true).await;
    emit_event(&event_tx, GameEvent::Connected);

    loop {
        tokio::select! {
            // Branch 1: outgoing command from the client handle
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(msg) => {
                        debug!("sending client message: {:?}", std::mem::discriminant(&msg));
                        match serde_json::to_string(&msg) {
                            Ok(json) => {
                                if let Err(e) = transport.send(json).await {
                                    error!("transport send error: {e}");
                                    emit_disconnected(
                                        &event_tx,
                                        &store,
                                        &connected,
                                        Some(format!("transport send error: {e}")),
                                    ).await;
                                    break;
                                }
                            }
                            Err(e) => {
                                error!("failed to serialize ClientMessage: {e}");
                                // Serialization errors are programming bugs; don't kill the loop.
                            }
                        }
                    }
                    // Command channel closed — client handle dropped.
                    None => {
                        debug!("command channel closed, shutting down transport loop");
                        let _ = transport.close().await;
                        emit_disconnected(&event_tx, &store, &connected, Some("client shut down".into())).await;
                        break;
                    }
                }
            }

            // Branch 2: shutdown signal
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                emit_disconnected(&event_tx, &store, &connected, Some("client shut down".into())).await;
                break;
            }

            // Branch 3: incoming message from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        dispatcher.handle_frame(&text).await;
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        notifier
                            .error_with_timeout(CONNECT_ERROR_TOAST, CONNECT_ERROR_TIMEOUT)
                            .await;
                        emit_disconnected(
                            &event_tx,
                            &store,
                            &connected,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    // Transport closed cleanly.
                    None => {
                        debug!("transport closed by server");
                        emit_disconnected(&event_tx, &store, &connected, None).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("transport loop exited");
}

/// Emit an event to the event channel. If the channel is full, log a warning
/// and drop the event to avoid blocking the transport loop.
fn emit_event(event_tx: &mpsc::Sender<GameEvent>, event: GameEvent) {
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

/// Emit a [`Disconnected`](GameEvent::Disconnected) event and mark the client
/// disconnected.
///
/// Uses `send().await` (blocking) instead of `try_send` because `Disconnected`
/// is always the last event on the channel and must never be silently dropped.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<GameEvent>,
    store: &GameStore,
    connected: &AtomicBool,
    reason: Option<String>,
) {
    connected.store(false, Ordering::Release);
    store.update(|state| state.connected = false).await;
    let event = GameEvent::Disconnected { reason };
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{ConnectionRequest, ScopedAction};
    use crate::session::InMemorySessionStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// A mock transport that records sent messages and replays scripted responses.
    struct MockTransport {
        /// Messages that `recv()` will yield in order.
        incoming: VecDeque<Option<std::result::Result<String, TotpalError>>>,
        /// Recorded outgoing messages.
        sent: Arc<StdMutex<Vec<String>>>,
        /// Whether `close()` was called.
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, TotpalError>>>,
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
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), TotpalError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, TotpalError>> {
            if let Some(item) = self.incoming.pop_front() {
                // An explicit `None` entry signals a clean transport close;
                // `Some(result)` delivers the scripted message or error.
                item
            } else {
                // All scripted messages have been delivered — hang forever
                // so the transport loop stays alive until shutdown.
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), TotpalError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn session_set_json(token: &str) -> String {
        format!(r#"{{"action":"session-set","session":"{token}"}}"#)
    }

    fn start_with_sessions(
        sessions: Arc<dyn SessionStore>,
    ) -> (
        TotpalClient,
        mpsc::Receiver<GameEvent>,
        Arc<StdMutex<Vec<String>>>,
    ) {
        let (transport, sent, _closed) =
            MockTransport::new(vec![Some(Ok(session_set_json("tok-1")))]);
        let (client, events) = TotpalClient::start(transport, TotpalConfig::new(), sessions);
        (client, events, sent)
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn start_without_token_negotiates_new_session() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events, sent) = start_with_sessions(sessions);

        // First event should be Connected.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, GameEvent::Connected));

        // Wait for the session assignment to flow through.
        let event = events.recv().await.unwrap();
        assert!(matches!(event, GameEvent::SessionEstablished { .. }));

        {
            let messages = sent.lock().unwrap();
            assert_eq!(messages.len(), 1, "exactly one negotiation frame");
            let first: ClientMessage = serde_json::from_str(&messages[0]).unwrap();
            assert_eq!(
                first,
                ClientMessage::Connection(ConnectionRequest::New)
            );
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn start_with_token_negotiates_restore() {
        let sessions = Arc::new(InMemorySessionStore::with_token("tok-old"));
        let (mut client, mut events, sent) = start_with_sessions(sessions);

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // SessionEstablished

        {
            let messages = sent.lock().unwrap();
            assert_eq!(messages.len(), 1);
            let first: ClientMessage = serde_json::from_str(&messages[0]).unwrap();
            assert_eq!(
                first,
                ClientMessage::Connection(ConnectionRequest::Restore {
                    session: "tok-old".into()
                })
            );
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn session_set_overwrites_stored_token() {
        let sessions = Arc::new(InMemorySessionStore::with_token("tok-old"));
        let (mut client, mut events, _sent) =
            start_with_sessions(Arc::clone(&sessions) as Arc<dyn SessionStore>);

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // SessionEstablished

        assert_eq!(sessions.get().as_deref(), Some("tok-1"));
        assert_eq!(
            client.snapshot().await.identity.session_token.as_deref(),
            Some("tok-1")
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn join_sends_set_name_then_join_in_order() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events, sent) = start_with_sessions(sessions);

        let _ = events.recv().await; // Connected

        client.join("Alice", "ab1d").await.unwrap();

        // Give the loop a moment to process.
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            // Negotiation, then set-name, then join.
            assert!(messages.len() >= 3);
            let second: ClientMessage = serde_json::from_str(&messages[1]).unwrap();
            assert_eq!(
                second,
                ClientMessage::Action(ScopedAction::Global(GlobalAction::SetName {
                    name: "Alice".into()
                }))
            );
            let third: ClientMessage = serde_json::from_str(&messages[2]).unwrap();
            assert_eq!(
                third,
                ClientMessage::Action(ScopedAction::Global(GlobalAction::Join {
                    code: "AB1D".into()
                }))
            );
        }

        // The intent is reflected locally before the server confirms.
        let state = client.snapshot().await;
        assert_eq!(state.identity.name, "Alice");
        assert_eq!(state.location.game_code.as_deref(), Some("AB1D"));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn create_sends_set_name_then_create() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events, sent) = start_with_sessions(sessions);

        let _ = events.recv().await; // Connected
        client.create("Bob").await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            assert!(messages.len() >= 3);
            let second: ClientMessage = serde_json::from_str(&messages[1]).unwrap();
            assert!(matches!(
                second,
                ClientMessage::Action(ScopedAction::Global(GlobalAction::SetName { .. }))
            ));
            let third: ClientMessage = serde_json::from_str(&messages[2]).unwrap();
            assert_eq!(
                third,
                ClientMessage::Action(ScopedAction::Global(GlobalAction::Create))
            );
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_join_code_is_rejected_before_any_send() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events, sent) = start_with_sessions(sessions);

        let _ = events.recv().await; // Connected

        let result = client.join("Alice", "abc").await;
        assert!(matches!(result, Err(TotpalError::InvalidInput(_))));

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            // Only the negotiation frame went out.
            assert_eq!(messages.len(), 1);
        }
        assert!(client.snapshot().await.notification.is_error);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events, _sent) = start_with_sessions(sessions);

        let _ = events.recv().await; // Connected

        let result = client.create("   ").await;
        assert!(matches!(result, Err(TotpalError::InvalidInput(_))));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn empty_topic_is_rejected() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events, _sent) = start_with_sessions(sessions);

        let _ = events.recv().await; // Connected

        let result = client.set_own_word("").await;
        assert!(matches!(result, Err(TotpalError::InvalidInput(_))));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn set_own_word_patches_and_sends() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events, sent) = start_with_sessions(sessions);

        let _ = events.recv().await; // Connected
        client.set_own_word("Lighthouse of Alexandria").await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let last: ClientMessage = serde_json::from_str(messages.last().unwrap()).unwrap();
            assert_eq!(
                last,
                ClientMessage::Action(ScopedAction::Game(GameAction::SetOwnWord {
                    word: "Lighthouse of Alexandria".into()
                }))
            );
        }
        assert_eq!(
            client.snapshot().await.round.own_word,
            "Lighthouse of Alexandria"
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn local_patches_announce_state_changed() {
        // No scripted frames: every event past Connected must come from the
        // client's own local patches.
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events) =
            TotpalClient::start(transport, TotpalConfig::new(), sessions);

        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, GameEvent::Connected));

        client.create("Alice").await.unwrap();
        assert_eq!(events.recv().await.unwrap(), GameEvent::StateChanged);
        assert_eq!(client.snapshot().await.identity.name, "Alice");

        client.set_own_word("Rosetta Stone").await.unwrap();
        assert_eq!(events.recv().await.unwrap(), GameEvent::StateChanged);

        client.join("Alice", "ab1d").await.unwrap();
        assert_eq!(events.recv().await.unwrap(), GameEvent::StateChanged);
        assert_eq!(
            client.snapshot().await.location.game_code.as_deref(),
            Some("AB1D")
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn game_actions_send_expected_frames() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events, sent) = start_with_sessions(sessions);

        let _ = events.recv().await; // Connected

        client.set_guessing("p2").unwrap();
        client.boot_inactive().unwrap();
        client.start_round().unwrap();
        client.guess_liar("p3").unwrap();
        client.reset_game().unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let messages = sent.lock().unwrap();
        let decoded: Vec<ClientMessage> = messages
            .iter()
            .skip(1) // negotiation frame
            .map(|m| serde_json::from_str(m).unwrap())
            .collect();
        assert_eq!(
            decoded,
            vec![
                ClientMessage::Action(ScopedAction::Game(GameAction::SetGuessing {
                    guessing: "p2".into()
                })),
                ClientMessage::Action(ScopedAction::Game(GameAction::BootInactive)),
                ClientMessage::Action(ScopedAction::Game(GameAction::SelectWord)),
                ClientMessage::Action(ScopedAction::Game(GameAction::GuessLiar {
                    id: "p3".into()
                })),
                ClientMessage::Action(ScopedAction::Game(GameAction::ResetGame)),
            ]
        );
    }

    #[tokio::test]
    async fn disconnected_on_transport_close() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok(session_set_json("tok-1"))),
            // Explicit None signals clean transport close.
            None,
        ]);
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events) =
            TotpalClient::start(transport, TotpalConfig::new(), sessions);

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // SessionEstablished
        let event = events.recv().await.unwrap();
        assert!(matches!(event, GameEvent::Disconnected { .. }));

        assert!(!client.is_connected());
        assert!(!client.snapshot().await.connected);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn transport_error_raises_connectivity_toast() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Err(
            TotpalError::TransportReceive("boom".into()),
        ))]);
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events) =
            TotpalClient::start(transport, TotpalConfig::new(), sessions);

        let _ = events.recv().await; // Connected
        // Notification precedes the final Disconnected.
        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            GameEvent::Notification {
                message: CONNECT_ERROR_TOAST.into(),
                is_error: true
            }
        );
        let event = events.recv().await.unwrap();
        if let GameEvent::Disconnected { reason } = event {
            assert!(reason.unwrap().contains("boom"));
        } else {
            panic!("expected Disconnected, got {event:?}");
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn not_connected_error_after_shutdown() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events, _sent) = start_with_sessions(sessions);

        let _ = events.recv().await; // Connected

        client.shutdown().await;

        let result = client.boot_inactive();
        assert!(matches!(result, Err(TotpalError::NotConnected)));
    }

    #[tokio::test]
    async fn shutdown_emits_disconnected() {
        let (transport, _sent, closed) =
            MockTransport::new(vec![Some(Ok(session_set_json("tok-1")))]);
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events) =
            TotpalClient::start(transport, TotpalConfig::new(), sessions);

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // SessionEstablished

        client.shutdown().await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event, GameEvent::Disconnected { .. }));
        if let GameEvent::Disconnected { reason } = event {
            assert_eq!(reason.as_deref(), Some("client shut down"));
        }

        // The transport should have been closed.
        assert!(closed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events, _sent) = start_with_sessions(sessions);

        let _ = events.recv().await; // Connected

        client.shutdown().await;
        client.shutdown().await; // should not panic
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let (client, mut events, _sent) = start_with_sessions(sessions);

        let _ = events.recv().await; // Connected

        // Drop the client without calling shutdown.
        drop(client);

        // The transport loop should eventually exit; the event channel
        // will close. We just verify we don't hang or panic.
        while let Some(_event) = events.recv().await {}
    }

    #[tokio::test]
    async fn config_defaults() {
        let config = TotpalConfig::new();
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn event_channel_capacity_is_clamped_to_one() {
        let config = TotpalConfig::new().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let (mut client, mut events, _sent) = start_with_sessions(sessions);

        let _ = events.recv().await; // Connected

        let debug_str = format!("{client:?}");
        assert!(debug_str.contains("TotpalClient"));
        assert!(debug_str.contains("connected"));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn event_channel_backpressure_does_not_block() {
        // Script more frames than the event channel capacity.
        let mut incoming: Vec<Option<std::result::Result<String, TotpalError>>> = Vec::new();
        incoming.push(Some(Ok(session_set_json("tok-1"))));
        let reset = r#"{"action":"broadcast","broadcastType":"game-reset"}"#.to_string();
        for _ in 0..20 {
            incoming.push(Some(Ok(reset.clone())));
        }
        incoming.push(None);

        let (transport, _sent, _closed) = MockTransport::new(incoming);
        let sessions = Arc::new(InMemorySessionStore::new());
        let config = TotpalConfig::new().with_event_channel_capacity(1);
        let (mut client, mut events) = TotpalClient::start(transport, config, sessions);

        // Don't read events immediately — let the channel fill up.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut count = 0;
        while let Some(_event) = events.recv().await {
            count += 1;
        }
        // Connected (first try_send) and Disconnected (blocking send) always
        // arrive; intermediate StateChanged events may be dropped.
        assert!(count >= 2, "expected at least 2 events, got {count}");
        assert!(
            count < 23,
            "expected backpressure to drop some events, but got all {count}"
        );

        client.shutdown().await;
    }
}
