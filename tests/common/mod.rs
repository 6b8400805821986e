#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for Totpal Client integration tests.
//!
//! Provides a channel-based [`MockTransport`] and helper functions for
//! constructing common server frame JSON strings.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use totpal_client::protocol::{Broadcast, PlayerState, ServerAction, ServerEnvelope, StatePatch};
use totpal_client::{Transport, TotpalError};

// ── MockTransport ───────────────────────────────────────────────────

/// A channel-based mock transport for integration testing.
///
/// Scripted server responses are consumed in order by `recv()`.
/// All messages sent by the client are recorded in `sent`.
pub struct MockTransport {
    /// Scripted server responses (consumed in order by `recv`).
    incoming: VecDeque<Option<Result<String, TotpalError>>>,
    /// Recorded outgoing messages from the client.
    pub sent: Arc<StdMutex<Vec<String>>>,
    /// Whether `close()` has been called.
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a new mock transport with the given scripted incoming messages.
    ///
    /// Returns the transport plus shared handles for inspecting sent messages
    /// and whether close was called.
    pub fn new(
        incoming: Vec<Option<Result<String, TotpalError>>>,
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
    async fn send(&mut self, message: String) -> Result<(), TotpalError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, TotpalError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // No more scripted messages — hang forever so the transport loop
            // stays alive until shutdown is called.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), TotpalError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── Player fixtures ─────────────────────────────────────────────────

/// A roster entry with the given id and name, inactive flags defaulted off.
pub fn player(id: &str, name: &str) -> PlayerState {
    PlayerState {
        id: id.into(),
        name: name.into(),
        host: false,
        active: true,
        guessing: false,
        wordset: None,
    }
}

/// A roster entry flagged as the game host.
pub fn host_player(id: &str, name: &str) -> PlayerState {
    PlayerState {
        host: true,
        ..player(id, name)
    }
}

/// A roster entry flagged as the round's investigator.
pub fn guessing_player(id: &str, name: &str) -> PlayerState {
    PlayerState {
        guessing: true,
        ..player(id, name)
    }
}

// ── JSON helper functions ───────────────────────────────────────────

/// Returns the JSON string for a `session-set` frame.
pub fn session_set_json(token: &str) -> String {
    serde_json::to_string(&ServerEnvelope::from_action(ServerAction::SessionSet {
        session: token.into(),
    }))
    .expect("session_set_json serialization")
}

/// Returns the JSON string for a direct `state-update` frame.
pub fn state_update_json(patch: StatePatch) -> String {
    serde_json::to_string(&ServerEnvelope::from_action(ServerAction::StateUpdate {
        state: patch,
    }))
    .expect("state_update_json serialization")
}

/// Returns the JSON string for a broadcast `state-update` snapshot frame.
pub fn snapshot_json(
    states: Vec<PlayerState>,
    selected_word: Option<&str>,
    points: HashMap<String, i64>,
) -> String {
    serde_json::to_string(&ServerEnvelope::from_action(ServerAction::Broadcast(
        Broadcast::StateUpdate {
            states,
            selected_word: selected_word.map(Into::into),
            points,
        },
    )))
    .expect("snapshot_json serialization")
}

/// Returns the JSON string for a broadcast `guess-result` frame.
pub fn guess_result_json(correct: bool, truth: &str, guess: Option<&str>) -> String {
    serde_json::to_string(&ServerEnvelope::from_action(ServerAction::Broadcast(
        Broadcast::GuessResult {
            correct,
            truth: truth.into(),
            guess: guess.map(Into::into),
        },
    )))
    .expect("guess_result_json serialization")
}

/// Returns the JSON string for a broadcast `game-reset` frame.
pub fn game_reset_json() -> String {
    serde_json::to_string(&ServerEnvelope::from_action(ServerAction::Broadcast(
        Broadcast::GameReset,
    )))
    .expect("game_reset_json serialization")
}

/// Returns the JSON string for a frame carrying a server error alongside an
/// action.
pub fn error_json(message: &str, when: &str, action: ServerAction) -> String {
    serde_json::to_string(&ServerEnvelope {
        error_when: Some(serde_json::Value::String(when.into())),
        error: Some(message.into()),
        action,
    })
    .expect("error_json serialization")
}
