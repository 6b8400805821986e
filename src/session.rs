//! Session token persistence and negotiation.
//!
//! The server issues an opaque session token that lets a client resume its
//! seat across transport reconnects. Where that token lives is a platform
//! concern (browser tab storage, a file, plain memory), so persistence is an
//! injected [`SessionStore`] rather than a hidden global — tests and
//! embedders substitute their own.
//!
//! Negotiation itself is one message per transport open: restore the stored
//! token if there is one, otherwise ask for a new session. A rejected
//! restore needs no special handling; the server just issues a fresh
//! `session-set`, which overwrites the stored token (last-write-wins).

use std::sync::{Mutex, PoisonError};

use crate::protocol::ConnectionRequest;

/// Key-value persistence for the session token.
///
/// Implementations must tolerate being called from multiple tasks; the
/// provided [`InMemorySessionStore`] is a plain mutex-guarded slot.
pub trait SessionStore: Send + Sync {
    /// The stored token, if any.
    fn get(&self) -> Option<String>;
    /// Persist a token, replacing any previous one.
    fn set(&self, token: &str);
    /// Forget the stored token.
    fn clear(&self);
}

/// Build the single negotiation frame for a transport open.
pub fn negotiation_request(sessions: &dyn SessionStore) -> ConnectionRequest {
    match sessions.get() {
        Some(session) => ConnectionRequest::Restore { session },
        None => ConnectionRequest::New,
    }
}

/// Ephemeral in-process token storage.
///
/// Mirrors per-tab browser storage semantics: the token survives reconnects
/// within one process lifetime and is gone after restart.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    token: Mutex<Option<String>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a token, as if restored from a
    /// previous run.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    // A poisoned lock only means some caller panicked mid-access; the token
    // itself is always a coherent value, so recover the guard.
    fn get(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, token: &str) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
    }

    fn clear(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
