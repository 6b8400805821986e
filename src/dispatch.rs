//! Inbound frame dispatch.
//!
//! One [`Dispatcher`] handles every text frame the transport delivers, in
//! delivery order. A frame is decoded into a [`ServerEnvelope`] and routed:
//! session assignment, direct state patch, or broadcast sub-dispatch. An
//! embedded `error` field is surfaced as an error toast without suppressing
//! the rest of the frame — the server may attach an error and a state update
//! to the same envelope.
//!
//! Every path is total: a malformed frame is logged and dropped with no
//! partial mutation, and unknown actions or broadcast sub-types are inert so
//! newer servers do not break older clients.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::GameEvent;
use crate::notify::Notifier;
use crate::protocol::{Broadcast, ServerAction, ServerEnvelope};
use crate::session::SessionStore;
use crate::store::GameStore;

pub(crate) struct Dispatcher {
    store: GameStore,
    notifier: Notifier,
    sessions: Arc<dyn SessionStore>,
    events: mpsc::Sender<GameEvent>,
}

impl Dispatcher {
    pub(crate) fn new(
        store: GameStore,
        notifier: Notifier,
        sessions: Arc<dyn SessionStore>,
        events: mpsc::Sender<GameEvent>,
    ) -> Self {
        Self {
            store,
            notifier,
            sessions,
            events,
        }
    }

    /// Decode and process one inbound text frame.
    ///
    /// A frame that fails full decoding may still carry a server `error`
    /// worth showing (the server attaches errors independently of actions);
    /// that toast is salvaged before the rest of the frame is dropped.
    /// Anything else undecodable is transport noise: dropped with a warning,
    /// no state mutation, no user-visible error.
    pub(crate) async fn handle_frame(&self, text: &str) {
        match serde_json::from_str::<ServerEnvelope>(text) {
            Ok(envelope) => self.handle_envelope(envelope).await,
            Err(e) => {
                if let Ok(ErrorOnly { error: Some(error) }) =
                    serde_json::from_str::<ErrorOnly>(text)
                {
                    warn!("server error in frame without a usable action: {error}");
                    self.notifier.error(error).await;
                    return;
                }
                warn!("failed to decode server frame: {e} — raw: {text}");
            }
        }
    }

    pub(crate) async fn handle_envelope(&self, envelope: ServerEnvelope) {
        // Error fields may accompany any action and do not suppress it.
        if let Some(error) = envelope.error {
            self.notifier.error(error).await;
        }

        match envelope.action {
            ServerAction::SessionSet { session } => {
                // Last-write-wins: a fresh token after a rejected restore
                // simply overwrites the stored one.
                self.sessions.set(&session);
                let token = session.clone();
                self.store
                    .update(move |state| state.identity.session_token = Some(token))
                    .await;
                debug!("session token assigned");
                self.emit(GameEvent::SessionEstablished { session });
            }
            ServerAction::StateUpdate { state } => {
                self.store.patch(state).await;
                self.emit(GameEvent::StateChanged);
            }
            ServerAction::Broadcast(broadcast) => {
                self.handle_broadcast(broadcast).await;
            }
            ServerAction::Unknown => {
                debug!("ignoring unrecognized server action");
            }
        }
    }

    async fn handle_broadcast(&self, broadcast: Broadcast) {
        match broadcast {
            Broadcast::StateUpdate {
                states,
                selected_word,
                points,
            } => {
                self.store
                    .update(move |state| state.apply_snapshot(states, selected_word, points))
                    .await;
                self.emit(GameEvent::StateChanged);
            }
            Broadcast::GuessResult {
                correct,
                truth,
                guess,
            } => {
                self.store
                    .update(move |state| state.apply_guess_result(correct, truth, guess))
                    .await;
                self.emit(GameEvent::StateChanged);
            }
            Broadcast::GameReset => {
                self.store.update(|state| state.apply_reset()).await;
                self.emit(GameEvent::StateChanged);
            }
            Broadcast::Unknown => {
                debug!("ignoring unrecognized broadcast sub-type");
            }
        }
    }

    /// Forward an event without blocking the transport loop; drop with a
    /// warning on backpressure.
    fn emit(&self, event: GameEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!("event channel full, dropping event: {dropped:?}");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }
}

/// Lenient view of a frame that failed full decoding; only the error field
/// is worth salvaging.
#[derive(Deserialize)]
struct ErrorOnly {
    #[serde(default)]
    error: Option<String>,
}
