//! Integration-style client tests for the Totpal Client.
//!
//! Uses the shared `MockTransport` from `tests/common` to script server
//! frames and verify that `TotpalClient` processes them correctly, including
//! session negotiation, roster and round-stage transitions, and event
//! delivery.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use totpal_client::protocol::{ClientMessage, ConnectionRequest, Position, StatePatch};
use totpal_client::{
    GameEvent, InMemorySessionStore, RoundStage, SessionStore, TotpalClient, TotpalConfig,
    TotpalError,
};

use common::{
    error_json, game_reset_json, guess_result_json, guessing_player, host_player, player,
    session_set_json, snapshot_json, state_update_json, MockTransport,
};

// ════════════════════════════════════════════════════════════════════
// Helper: start a mock client with scripted responses
// ════════════════════════════════════════════════════════════════════

/// Start a client with the given scripted server frames and a fresh
/// in-memory session store. The first frame is typically
/// `session_set_json(..)` so negotiation completes.
#[allow(clippy::type_complexity)]
fn start_client(
    incoming: Vec<Option<Result<String, TotpalError>>>,
) -> (
    TotpalClient,
    tokio::sync::mpsc::Receiver<GameEvent>,
    std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    std::sync::Arc<std::sync::atomic::AtomicBool>,
) {
    let sessions = Arc::new(InMemorySessionStore::new());
    start_client_with(incoming, sessions)
}

/// Start a client with scripted frames and an explicit session store, for
/// tests exercising resumption.
#[allow(clippy::type_complexity)]
fn start_client_with(
    incoming: Vec<Option<Result<String, TotpalError>>>,
    sessions: Arc<dyn SessionStore>,
) -> (
    TotpalClient,
    tokio::sync::mpsc::Receiver<GameEvent>,
    std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    std::sync::Arc<std::sync::atomic::AtomicBool>,
) {
    let (transport, sent, closed) = MockTransport::new(incoming);
    let (client, events) = TotpalClient::start(transport, TotpalConfig::new(), sessions);
    (client, events, sent, closed)
}

/// Consume events up to and including the first `SessionEstablished` event.
/// Panics if the Connected or SessionEstablished events are not received.
async fn drain_until_session(rx: &mut tokio::sync::mpsc::Receiver<GameEvent>) -> String {
    let ev = rx.recv().await.expect("expected Connected event");
    assert!(
        matches!(ev, GameEvent::Connected),
        "first event should be Connected, got {ev:?}"
    );
    let ev = rx.recv().await.expect("expected SessionEstablished event");
    if let GameEvent::SessionEstablished { session } = ev {
        session
    } else {
        panic!("second event should be SessionEstablished, got {ev:?}");
    }
}

/// Consume events until the next `StateChanged`.
async fn next_state_changed(rx: &mut tokio::sync::mpsc::Receiver<GameEvent>) {
    loop {
        let ev = rx.recv().await.expect("expected an event");
        if matches!(ev, GameEvent::StateChanged) {
            return;
        }
    }
}

// ════════════════════════════════════════════════════════════════════
// Session negotiation and resumption
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn fresh_store_negotiates_new_session_and_persists_token() {
    let sessions = Arc::new(InMemorySessionStore::new());
    let (mut client, mut events, sent, _closed) = start_client_with(
        vec![Some(Ok(session_set_json("sess-abc")))],
        Arc::clone(&sessions) as Arc<dyn SessionStore>,
    );

    let session = drain_until_session(&mut events).await;
    assert_eq!(session, "sess-abc");

    // The token is persisted and mirrored into the state document.
    assert_eq!(sessions.get().as_deref(), Some("sess-abc"));
    let state = client.snapshot().await;
    assert_eq!(state.identity.session_token.as_deref(), Some("sess-abc"));
    assert!(state.connected);

    // Exactly one negotiation frame went out, and it asked for a new session.
    {
        let messages = sent.lock().unwrap();
        assert_eq!(messages.len(), 1);
        let first: ClientMessage = serde_json::from_str(&messages[0]).expect("parse negotiation");
        assert_eq!(first, ClientMessage::Connection(ConnectionRequest::New));
    }

    client.shutdown().await;
}

#[tokio::test]
async fn seeded_store_negotiates_restore() {
    let sessions = Arc::new(InMemorySessionStore::with_token("sess-old"));
    let (mut client, mut events, sent, _closed) = start_client_with(
        vec![Some(Ok(session_set_json("sess-old")))],
        sessions,
    );

    drain_until_session(&mut events).await;

    {
        let messages = sent.lock().unwrap();
        assert_eq!(messages.len(), 1);
        let first: ClientMessage = serde_json::from_str(&messages[0]).expect("parse negotiation");
        assert_eq!(
            first,
            ClientMessage::Connection(ConnectionRequest::Restore {
                session: "sess-old".into()
            })
        );
    }

    client.shutdown().await;
}

#[tokio::test]
async fn reconnect_with_same_store_resumes_session() {
    let sessions = Arc::new(InMemorySessionStore::new());

    // First connection: server assigns a token.
    let (mut client, mut events, _sent, _closed) = start_client_with(
        vec![Some(Ok(session_set_json("sess-1")))],
        Arc::clone(&sessions) as Arc<dyn SessionStore>,
    );
    drain_until_session(&mut events).await;
    client.shutdown().await;

    // Second connection with the same store: the client offers the token back.
    let (mut client, mut events, sent, _closed) = start_client_with(
        vec![Some(Ok(session_set_json("sess-1")))],
        Arc::clone(&sessions) as Arc<dyn SessionStore>,
    );
    drain_until_session(&mut events).await;

    {
        let messages = sent.lock().unwrap();
        let first: ClientMessage = serde_json::from_str(&messages[0]).expect("parse negotiation");
        assert_eq!(
            first,
            ClientMessage::Connection(ConnectionRequest::Restore {
                session: "sess-1".into()
            })
        );
    }

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Direct state updates
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn direct_state_update_shallow_merges() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(session_set_json("sess-1"))),
        Some(Ok(state_update_json(StatePatch {
            id: Some("p1".into()),
            position: Some(Position::Game),
            game_code: Some("WXYZ".into()),
            host: Some(true),
            ..StatePatch::default()
        }))),
        Some(Ok(state_update_json(StatePatch {
            guessing: Some(true),
            ..StatePatch::default()
        }))),
    ]);

    drain_until_session(&mut events).await;
    next_state_changed(&mut events).await;
    next_state_changed(&mut events).await;

    let state = client.snapshot().await;
    assert_eq!(state.identity.id.as_deref(), Some("p1"));
    assert_eq!(state.location.position, Position::Game);
    assert_eq!(state.location.game_code.as_deref(), Some("WXYZ"));
    // The second patch only touched `guessing`; the first patch's fields survive.
    assert!(state.identity.host);
    assert!(state.identity.guessing);

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Broadcast snapshots and round progression
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn snapshot_replaces_roster_wholesale() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(session_set_json("sess-1"))),
        Some(Ok(snapshot_json(
            vec![
                host_player("p1", "Alice"),
                player("p2", "Bob"),
                player("p3", "Carol"),
            ],
            None,
            HashMap::new(),
        ))),
        // Bob drops; the next snapshot simply omits him.
        Some(Ok(snapshot_json(
            vec![host_player("p1", "Alice"), player("p3", "Carol")],
            None,
            HashMap::new(),
        ))),
    ]);

    drain_until_session(&mut events).await;
    // NOTE: Scripted frames are consumed as fast as the loop polls, so
    // intermediate snapshots cannot be asserted reliably; the document after
    // the final StateChanged is what gets pinned.
    next_state_changed(&mut events).await;
    next_state_changed(&mut events).await;

    let state = client.snapshot().await;
    assert_eq!(state.roster.len(), 2);
    assert!(state.roster.iter().all(|p| p.id != "p2"));
    assert_eq!(state.round.stage, RoundStage::Research);

    client.shutdown().await;
}

#[tokio::test]
async fn selected_word_arrival_moves_stage_to_investigation() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(session_set_json("sess-1"))),
        Some(Ok(snapshot_json(
            vec![host_player("p1", "Alice"), guessing_player("p2", "Bob")],
            None,
            HashMap::new(),
        ))),
        Some(Ok(snapshot_json(
            vec![host_player("p1", "Alice"), guessing_player("p2", "Bob")],
            Some("Voynich manuscript"),
            HashMap::new(),
        ))),
    ]);

    drain_until_session(&mut events).await;
    next_state_changed(&mut events).await;
    next_state_changed(&mut events).await;

    let state = client.snapshot().await;
    assert_eq!(state.round.stage, RoundStage::Investigation);
    assert_eq!(
        state.round.selected_word.as_deref(),
        Some("Voynich manuscript")
    );

    client.shutdown().await;
}

#[tokio::test]
async fn snapshot_after_guess_result_preserves_result_stage() {
    // A roster snapshot arriving while a guess result is shown (players
    // reconnecting, scores updating) must not bounce the stage back to
    // Investigation as long as the word stays selected.
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(session_set_json("sess-1"))),
        Some(Ok(snapshot_json(
            vec![player("p1", "Alice")],
            Some("Voynich manuscript"),
            HashMap::new(),
        ))),
        Some(Ok(guess_result_json(true, "p1", Some("p1")))),
        Some(Ok(snapshot_json(
            vec![player("p1", "Alice")],
            Some("Voynich manuscript"),
            HashMap::from([("p1".to_string(), 3)]),
        ))),
    ]);

    drain_until_session(&mut events).await;
    next_state_changed(&mut events).await; // snapshot → Investigation
    next_state_changed(&mut events).await; // guess-result → GuessCorrect
    next_state_changed(&mut events).await; // follow-up snapshot

    let state = client.snapshot().await;
    assert_eq!(state.round.stage, RoundStage::GuessCorrect);
    assert_eq!(state.round.points.get("p1"), Some(&3));

    client.shutdown().await;
}

#[tokio::test]
async fn incorrect_guess_records_truth_and_accusation() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(session_set_json("sess-1"))),
        Some(Ok(snapshot_json(
            vec![player("p1", "Alice"), player("p2", "Bob")],
            Some("Antikythera mechanism"),
            HashMap::new(),
        ))),
        Some(Ok(guess_result_json(false, "p2", Some("p1")))),
    ]);

    drain_until_session(&mut events).await;
    next_state_changed(&mut events).await;
    next_state_changed(&mut events).await;

    let state = client.snapshot().await;
    assert_eq!(state.round.stage, RoundStage::GuessIncorrect);
    assert_eq!(state.round.truth.as_deref(), Some("p2"));
    assert_eq!(state.round.guess.as_deref(), Some("p1"));

    client.shutdown().await;
}

#[tokio::test]
async fn game_reset_returns_round_to_research() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(session_set_json("sess-1"))),
        Some(Ok(snapshot_json(
            vec![player("p1", "Alice"), player("p2", "Bob")],
            Some("Antikythera mechanism"),
            HashMap::new(),
        ))),
        Some(Ok(guess_result_json(false, "p2", Some("p1")))),
        Some(Ok(game_reset_json())),
    ]);

    drain_until_session(&mut events).await;
    next_state_changed(&mut events).await;
    next_state_changed(&mut events).await;
    next_state_changed(&mut events).await;

    // Reset touches only the stage; the word stays until the next snapshot
    // clears it.
    let state = client.snapshot().await;
    assert_eq!(state.round.stage, RoundStage::Research);

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Server errors and malformed frames
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn error_frame_raises_toast_and_still_applies_action() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(session_set_json("sess-1"))),
        Some(Ok(error_json(
            "No such game",
            "join",
            totpal_client::protocol::ServerAction::StateUpdate {
                state: StatePatch {
                    game_code: Some("NOPE".into()),
                    ..StatePatch::default()
                },
            },
        ))),
    ]);

    drain_until_session(&mut events).await;

    // The error surfaces as a notification event first.
    let ev = events.recv().await.expect("event");
    assert_eq!(
        ev,
        GameEvent::Notification {
            message: "No such game".into(),
            is_error: true
        }
    );
    next_state_changed(&mut events).await;

    let state = client.snapshot().await;
    assert!(state.notification.is_error);
    assert_eq!(state.notification.toast, "No such game");
    // The action piggybacked on the error frame was still applied.
    assert_eq!(state.location.game_code.as_deref(), Some("NOPE"));

    client.shutdown().await;
}

#[tokio::test]
async fn unknown_and_malformed_frames_are_ignored() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(r#"{"action":"future-feature","payload":42}"#.to_string())),
        Some(Ok("not json at all".to_string())),
        Some(Ok(
            r#"{"action":"broadcast","broadcastType":"mystery"}"#.to_string()
        )),
        // A well-formed frame afterwards proves the loop survived.
        Some(Ok(session_set_json("sess-after"))),
    ]);

    let session = drain_until_session(&mut events).await;
    assert_eq!(session, "sess-after");

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Notifications
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn notification_expires_after_default_timeout() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(session_set_json("sess-1"))),
        Some(Ok(error_json(
            "Game is full",
            "join",
            totpal_client::protocol::ServerAction::StateUpdate {
                state: StatePatch::default(),
            },
        ))),
    ]);

    drain_until_session(&mut events).await;

    let ev = events.recv().await.expect("event");
    assert!(matches!(ev, GameEvent::Notification { .. }));
    next_state_changed(&mut events).await;

    assert_eq!(client.snapshot().await.notification.toast, "Game is full");

    // The toast clears itself after the expiry window, announced by another
    // StateChanged.
    next_state_changed(&mut events).await;
    let state = client.snapshot().await;
    assert_eq!(state.notification.toast, "");
    assert!(!state.notification.is_error);

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Full game walkthrough
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn host_creates_game_and_plays_a_round() {
    let (mut client, mut events, sent, _closed) = start_client(vec![
        Some(Ok(session_set_json("sess-1"))),
        Some(Ok(state_update_json(StatePatch {
            id: Some("p1".into()),
            position: Some(Position::Game),
            game_code: Some("QRXZ".into()),
            host: Some(true),
            ..StatePatch::default()
        }))),
        Some(Ok(snapshot_json(
            vec![host_player("p1", "Alice"), guessing_player("p2", "Bob")],
            None,
            HashMap::new(),
        ))),
        Some(Ok(snapshot_json(
            vec![host_player("p1", "Alice"), guessing_player("p2", "Bob")],
            Some("Rosetta Stone"),
            HashMap::new(),
        ))),
        Some(Ok(guess_result_json(true, "p1", Some("p1")))),
    ]);

    drain_until_session(&mut events).await;

    client.create("Alice").await.expect("create");
    client.set_own_word("Rosetta Stone").await.expect("topic");
    client.start_round().expect("start round");

    // Six mutations announce themselves: two local patches (create,
    // set-own-word) and four server frames. Only the document after the
    // last one is deterministic, since scripted frames are consumed as fast
    // as the loop polls.
    for _ in 0..6 {
        next_state_changed(&mut events).await;
    }

    let state = client.snapshot().await;
    assert_eq!(state.identity.name, "Alice");
    assert!(state.identity.host);
    assert_eq!(state.location.game_code.as_deref(), Some("QRXZ"));
    assert_eq!(state.roster.len(), 2);
    assert_eq!(state.round.own_word, "Rosetta Stone");
    assert_eq!(state.round.stage, RoundStage::GuessCorrect);

    // Five frames total: negotiation, set-name, create, set-own-word,
    // select-word.
    tokio::time::sleep(Duration::from_millis(50)).await;
    {
        let messages = sent.lock().unwrap();
        assert_eq!(messages.len(), 5);
    }

    client.shutdown().await;
}
