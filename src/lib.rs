//! # Totpal Client
//!
//! Transport-agnostic Rust client for the Totpal social deduction party game
//! ("two truths and a liar", played with Wikipedia articles).
//!
//! The server is authoritative; this crate keeps a client-side mirror of the
//! game consistent with what the server declares, across network drops and
//! reconnects. It provides:
//!
//! - **Session resumption** — a persisted session token, negotiated on every
//!   transport open through an injected [`SessionStore`]
//! - **Typed protocol** — inbound envelope decoding with broadcast
//!   sub-dispatch, outbound intent encoding, forward compatible with unknown
//!   actions
//! - **Round progression** — the broadcast-driven stage machine
//!   ([`RoundStage`]) mirroring the server's round lifecycle
//! - **Transient notifications** — auto-expiring toasts and errors inside
//!   the shared state document
//! - **Pluggable transports** — implement the [`Transport`] trait for any
//!   backend; the default `transport-websocket` feature provides
//!   [`WebSocketTransport`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use totpal_client::{
//!     GameEvent, InMemorySessionStore, TotpalClient, TotpalConfig, WebSocketTransport,
//! };
//!
//! let transport = WebSocketTransport::connect("ws://localhost:8888").await?;
//! let sessions = Arc::new(InMemorySessionStore::new());
//! let (client, mut events) = TotpalClient::start(transport, TotpalConfig::new(), sessions);
//!
//! client.create("Alice").await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         GameEvent::StateChanged => {
//!             let state = client.snapshot().await;
//!             // re-render from `state`
//!         }
//!         GameEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
mod dispatch;
pub mod error;
pub mod event;
pub mod notify;
pub mod protocol;
pub mod round;
pub mod session;
pub mod state;
pub mod store;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{TotpalClient, TotpalConfig};
pub use error::TotpalError;
pub use event::GameEvent;
pub use notify::Notifier;
pub use protocol::{ClientMessage, PlayerState, ServerEnvelope};
pub use round::RoundStage;
pub use session::{InMemorySessionStore, SessionStore};
pub use state::GameState;
pub use store::GameStore;
pub use transport::Transport;

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
