//! Shared single-writer store for the [`GameState`] document.
//!
//! [`GameStore`] is the only shared mutable resource in the client. Every
//! producer (dispatcher, notifier, action methods) mutates through
//! [`patch`](GameStore::patch) or [`update`](GameStore::update), both
//! serialized behind one mutex, so consumers always observe a consistent
//! document at each patch boundary. Consumers read via
//! [`snapshot`](GameStore::snapshot) and never hold a live reference that
//! could diverge.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::protocol::StatePatch;
use crate::state::GameState;

/// Cheaply cloneable handle to the shared game state.
#[derive(Debug, Clone, Default)]
pub struct GameStore {
    inner: Arc<Mutex<GameState>>,
}

impl GameStore {
    /// Create a store holding the default (disconnected, lobby) state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a cloned snapshot of the current document.
    pub async fn snapshot(&self) -> GameState {
        self.inner.lock().await.clone()
    }

    /// Shallow-merge a direct `state-update` patch.
    pub async fn patch(&self, patch: StatePatch) {
        self.inner.lock().await.apply_patch(patch);
    }

    /// Run a whole-document mutation while holding the writer lock.
    ///
    /// Used by the broadcast handler and notifier for multi-field updates
    /// that must land atomically.
    pub async fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut GameState),
    {
        let mut state = self.inner.lock().await;
        mutate(&mut state);
    }
}
