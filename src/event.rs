//! Events emitted by the client to its consumer.
//!
//! The event channel is a change feed, not a data feed: most mutations are
//! announced as [`StateChanged`](GameEvent::StateChanged) and the consumer
//! re-reads the document via [`GameStore::snapshot`](crate::GameStore::snapshot).
//! Under backpressure events other than `Disconnected` may be dropped, which
//! is harmless for a change feed — the next snapshot is always complete.

/// An event delivered on the channel returned by
/// [`TotpalClient::start`](crate::TotpalClient::start).
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// The transport loop is running and the negotiation frame was queued.
    Connected,
    /// The server assigned (or re-assigned) a session token.
    SessionEstablished { session: String },
    /// The shared document changed; take a fresh snapshot to re-render.
    StateChanged,
    /// A toast or error became visible (also mirrored into the document).
    Notification { message: String, is_error: bool },
    /// The transport closed. Always the final event; never dropped.
    Disconnected { reason: Option<String> },
}
