//! # Basic Client Example
//!
//! Demonstrates a complete Totpal client lifecycle:
//!
//! 1. Connect to a game server via WebSocket
//! 2. Negotiate a session (fresh, since the in-memory store starts empty)
//! 3. Create a game as host
//! 4. React to state changes as players join and rounds progress
//! 5. Shut down gracefully on Ctrl+C or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start a Totpal server on localhost:8888, then:
//! cargo run --example basic_client
//!
//! # Override the server URL:
//! TOTPAL_URL=ws://my-server:8888 cargo run --example basic_client
//! ```

use std::sync::Arc;

use totpal_client::{
    GameEvent, InMemorySessionStore, TotpalClient, TotpalConfig, WebSocketTransport,
};

/// Default server URL when `TOTPAL_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:8888";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("TOTPAL_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    tracing::info!("Connecting to {url}");

    // ── Connect ─────────────────────────────────────────────────────
    // Establish a WebSocket connection to the game server.
    let transport = WebSocketTransport::connect(&url).await?;

    // The in-memory store starts empty, so the client will request a
    // brand-new session. Swap in your own `SessionStore` implementation
    // to survive process restarts.
    let sessions = Arc::new(InMemorySessionStore::new());

    // Start the client. This spawns a background task that drives the
    // transport and emits events on `event_rx`.
    let (mut client, mut event_rx) = TotpalClient::start(transport, TotpalConfig::new(), sessions);

    // ── Event loop ──────────────────────────────────────────────────
    // Use `tokio::select!` to listen for both game events and Ctrl+C.
    loop {
        tokio::select! {
            // Branch 1: Incoming event from the client task.
            event = event_rx.recv() => {
                let Some(event) = event else {
                    // Channel closed — transport loop exited.
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    // ── Synthetic: transport connected ───────────────
                    GameEvent::Connected => {
                        tracing::info!("Transport connected, awaiting session…");
                    }

                    // ── Session established ──────────────────────────
                    GameEvent::SessionEstablished { session } => {
                        tracing::info!("Session established: {session}");

                        // Now that the server knows us, host a game.
                        client.create("RustHost").await?;
                        tracing::info!("Create-game request sent");
                    }

                    // ── State changes ────────────────────────────────
                    GameEvent::StateChanged => {
                        let state = client.snapshot().await;
                        tracing::info!(
                            "{:?} in {:?} — code {:?}, {} player(s), stage {:?}",
                            state.identity.name,
                            state.location.position,
                            state.location.game_code,
                            state.roster.len(),
                            state.round.stage,
                        );
                    }

                    // ── Transient notifications ──────────────────────
                    GameEvent::Notification { message, is_error } => {
                        if is_error {
                            tracing::error!("Server says: {message}");
                        } else {
                            tracing::info!("Server says: {message}");
                        }
                    }

                    // ── Disconnect ───────────────────────────────────
                    GameEvent::Disconnected { reason } => {
                        tracing::warn!("Disconnected: {}", reason.as_deref().unwrap_or("unknown"));
                        break;
                    }
                }
            }

            // Branch 2: Ctrl+C — shut down gracefully.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Client shut down. Goodbye!");
    Ok(())
}
