//! Wire-compatible protocol types for the Totpal game protocol.
//!
//! Every type in this module produces and consumes the exact JSON the Totpal
//! server speaks. The server frames are ad-hoc tagged objects rather than an
//! enveloped `{type, data}` pair, so the enums here are internally tagged:
//!
//! - inbound frames on `action`, with broadcast payload fields flattened
//!   alongside a `broadcastType` sub-discriminator
//! - outbound frames on either `connection` (session negotiation) or
//!   `scope` + `action` (lobby and game intents)
//!
//! Unrecognized `action` and `broadcastType` values decode to `Unknown`
//! variants so the client stays forward compatible with newer servers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Required length of a game code (uppercase alphanumeric).
pub const GAME_CODE_LEN: usize = 4;

/// Normalize a user-entered game code the way the server expects it:
/// uppercased, non-alphanumeric characters stripped, truncated to
/// [`GAME_CODE_LEN`] characters.
pub fn normalize_game_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(GAME_CODE_LEN)
        .collect()
}

// ── Shared types ────────────────────────────────────────────────────

/// Where the client currently is: the lobby splash or inside a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Lobby,
    Game,
}

/// One entry in the server's player roster snapshot.
///
/// The roster is always replaced wholesale from a broadcast `state-update`;
/// entries are never merged or mutated individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Unique server-assigned player id.
    pub id: String,
    pub name: String,
    /// Whether this player is the game host.
    #[serde(default)]
    pub host: bool,
    /// Whether the player's connection is currently live.
    #[serde(default)]
    pub active: bool,
    /// Whether this player is the investigator for the current round.
    #[serde(default)]
    pub guessing: bool,
    /// Whether the player has submitted a topic (`None` until known).
    #[serde(default)]
    pub wordset: Option<bool>,
}

// ── Inbound frames (server → client) ────────────────────────────────

/// One decoded inbound frame.
///
/// The error fields may accompany any action; the dispatcher surfaces them as
/// an error toast and still processes the action in the same frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEnvelope {
    /// Opaque marker describing which request the error relates to.
    #[serde(
        rename = "error-when",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error_when: Option<serde_json::Value>,
    /// Human-readable error message from the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub action: ServerAction,
}

impl ServerEnvelope {
    /// Construct an envelope carrying only an action, no error fields.
    pub fn from_action(action: ServerAction) -> Self {
        Self {
            error_when: None,
            error: None,
            action,
        }
    }
}

/// The `action` discriminator of an inbound frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ServerAction {
    /// Session token assignment, replying to a `connection` negotiation.
    SessionSet { session: String },
    /// Direct reply carrying a partial state object to shallow-merge.
    StateUpdate { state: StatePatch },
    /// Fan-out message for all clients in the game, sub-typed by
    /// `broadcastType`.
    Broadcast(Broadcast),
    /// Forward compatibility: actions this client does not know are a no-op.
    #[serde(other)]
    Unknown,
}

/// Broadcast sub-types, discriminated by `broadcastType`.
///
/// Payload fields sit flat in the frame next to the discriminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "broadcastType", rename_all = "kebab-case")]
pub enum Broadcast {
    /// Authoritative snapshot of the round: full roster, selected word and
    /// score table, replaced verbatim on the client.
    StateUpdate {
        #[serde(default)]
        states: Vec<PlayerState>,
        #[serde(rename = "selectedWord", default)]
        selected_word: Option<String>,
        #[serde(default)]
        points: HashMap<String, i64>,
    },
    /// Resolution of the investigator's guess.
    GuessResult {
        correct: bool,
        truth: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guess: Option<String>,
    },
    /// The host (or server) started a fresh round.
    GameReset,
    /// Forward compatibility: unknown sub-types are ignored.
    #[serde(other)]
    Unknown,
}

/// Partial state object carried by a direct `state-update` reply.
///
/// Applied to the store as a trusted shallow merge: only fields present in
/// the frame are touched. This is deliberately a different merge strategy
/// from broadcast snapshots, which replace the roster wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The local player's own server-assigned id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guessing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_word: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub own_word: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guess: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<HashMap<String, i64>>,
}

// ── Outbound frames (client → server) ───────────────────────────────

/// Any message the client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientMessage {
    /// Session negotiation, sent exactly once per transport open.
    Connection(ConnectionRequest),
    /// A lobby or game intent.
    Action(ScopedAction),
}

/// Session negotiation frame, discriminated by `connection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "connection", rename_all = "lowercase")]
pub enum ConnectionRequest {
    /// Request a brand new session.
    New,
    /// Resume a previously issued session token.
    Restore { session: String },
}

/// An intent frame, discriminated by `scope` and then `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum ScopedAction {
    Global(GlobalAction),
    Game(GameAction),
}

/// Lobby-level intents (`scope: "global"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum GlobalAction {
    /// Set the display name. Sent as a prerequisite before `join`/`create`.
    SetName { name: String },
    /// Join an existing game by code.
    Join { code: String },
    /// Create a new game.
    Create,
}

/// In-game intents (`scope: "game"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum GameAction {
    /// Nominate the investigator for the round.
    SetGuessing { guessing: String },
    /// Submit the local player's article topic.
    SetOwnWord { word: String },
    /// Host only: remove players whose connections have dropped.
    BootInactive,
    /// Host only: have the server pick the round's word and start it.
    SelectWord,
    /// Investigator only: accuse a player of being the liar.
    GuessLiar { id: String },
    /// Host only: reset the game back to the research phase.
    ResetGame,
}

impl From<ConnectionRequest> for ClientMessage {
    fn from(req: ConnectionRequest) -> Self {
        Self::Connection(req)
    }
}

impl From<GlobalAction> for ClientMessage {
    fn from(action: GlobalAction) -> Self {
        Self::Action(ScopedAction::Global(action))
    }
}

impl From<GameAction> for ClientMessage {
    fn from(action: GameAction) -> Self {
        Self::Action(ScopedAction::Game(action))
    }
}
