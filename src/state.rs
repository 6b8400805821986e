//! The shared game state document.
//!
//! [`GameState`] is the single source of truth mirrored from the server. It
//! is owned by the [`GameStore`](crate::store::GameStore); everything else
//! mutates it through the methods here, which encode the two merge
//! strategies the protocol uses:
//!
//! - direct `state-update` replies shallow-merge a [`StatePatch`]
//! - broadcast snapshots replace the roster, selected word and points
//!   wholesale and recompute the round stage
//!
//! Keeping the strategies separate matters: unifying them would risk
//! silently retaining stale roster entries from an earlier snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::protocol::{PlayerState, Position, StatePatch};
use crate::round::RoundStage;

/// Who the local player is, as far as the server has told us.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Display name, set locally on join/create and confirmed by the server.
    pub name: String,
    /// The local player's server-assigned id, once known.
    pub id: Option<String>,
    /// Resumable session token. `None` until the server assigns one; cleared
    /// only by explicit new-session negotiation, never by game actions.
    pub session_token: Option<String>,
    /// Whether the local player is the game host.
    pub host: bool,
    /// Whether the local player is the investigator this round.
    pub guessing: bool,
}

/// Server-confirmed position of the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub position: Position,
    /// 4-character uppercase game code, once in a game.
    pub game_code: Option<String>,
}

/// Everything about the round in progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub stage: RoundStage,
    /// The word the server selected for this round, if any.
    pub selected_word: Option<String>,
    /// The topic the local player submitted.
    pub own_word: String,
    /// Revealed after a guess: who actually held the selected word.
    pub truth: Option<String>,
    /// The accusation the investigator submitted, if the server echoed it.
    pub guess: Option<String>,
    /// Score table keyed by player id.
    pub points: HashMap<String, i64>,
}

/// Transient user-facing message with bounded lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub toast: String,
    pub is_error: bool,
}

impl Notification {
    pub fn clear(&mut self) {
        self.toast.clear();
        self.is_error = false;
    }
}

/// The whole shared document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub identity: Identity,
    /// True between transport open acknowledgment and close.
    pub connected: bool,
    pub location: Location,
    /// The server's latest complete player snapshot, never accumulated
    /// client-side.
    pub roster: Vec<PlayerState>,
    pub round: Round,
    pub notification: Notification,
}

impl GameState {
    /// Shallow-merge a direct `state-update` patch: only fields present in
    /// the frame are touched.
    pub fn apply_patch(&mut self, patch: StatePatch) {
        let StatePatch {
            name,
            id,
            position,
            game_code,
            host,
            guessing,
            selected_word,
            own_word,
            truth,
            guess,
            points,
        } = patch;

        if let Some(name) = name {
            self.identity.name = name;
        }
        if let Some(id) = id {
            self.identity.id = Some(id);
        }
        if let Some(position) = position {
            self.location.position = position;
        }
        if let Some(game_code) = game_code {
            self.location.game_code = Some(game_code);
        }
        if let Some(host) = host {
            self.identity.host = host;
        }
        if let Some(guessing) = guessing {
            self.identity.guessing = guessing;
        }
        if let Some(selected_word) = selected_word {
            self.round.selected_word = Some(selected_word);
        }
        if let Some(own_word) = own_word {
            self.round.own_word = own_word;
        }
        if let Some(truth) = truth {
            self.round.truth = Some(truth);
        }
        if let Some(guess) = guess {
            self.round.guess = Some(guess);
        }
        if let Some(points) = points {
            self.round.points = points;
        }
    }

    /// Apply a broadcast `state-update` snapshot: roster, selected word and
    /// points are replaced verbatim and the stage is recomputed.
    pub fn apply_snapshot(
        &mut self,
        states: Vec<PlayerState>,
        selected_word: Option<String>,
        points: HashMap<String, i64>,
    ) {
        self.round.stage = self
            .round
            .stage
            .on_state_update(selected_word.as_deref());
        self.roster = states;
        self.round.selected_word = selected_word;
        self.round.points = points;
    }

    /// Apply a `guess-result` broadcast.
    pub fn apply_guess_result(&mut self, correct: bool, truth: String, guess: Option<String>) {
        self.round.stage = RoundStage::on_guess_result(correct);
        self.round.truth = Some(truth);
        if guess.is_some() {
            self.round.guess = guess;
        }
    }

    /// Apply a `game-reset` broadcast.
    pub fn apply_reset(&mut self) {
        self.round.stage = RoundStage::on_game_reset();
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn player(id: &str, name: &str) -> PlayerState {
        PlayerState {
            id: id.into(),
            name: name.into(),
            host: false,
            active: true,
            guessing: false,
            wordset: None,
        }
    }

    #[test]
    fn patch_touches_only_present_fields() {
        let mut state = GameState::default();
        state.identity.name = "Alice".into();
        state.round.own_word = "Lighthouse".into();

        state.apply_patch(StatePatch {
            id: Some("p1".into()),
            host: Some(true),
            ..StatePatch::default()
        });

        assert_eq!(state.identity.id.as_deref(), Some("p1"));
        assert!(state.identity.host);
        // Untouched by the patch.
        assert_eq!(state.identity.name, "Alice");
        assert_eq!(state.round.own_word, "Lighthouse");
    }

    #[test]
    fn patch_moves_client_into_game() {
        let mut state = GameState::default();
        state.apply_patch(StatePatch {
            position: Some(Position::Game),
            game_code: Some("WXYZ".into()),
            ..StatePatch::default()
        });
        assert_eq!(state.location.position, Position::Game);
        assert_eq!(state.location.game_code.as_deref(), Some("WXYZ"));
    }

    #[test]
    fn snapshot_replaces_roster_wholesale() {
        let mut state = GameState::default();
        state.apply_snapshot(
            vec![player("a", "Alice"), player("b", "Bob")],
            None,
            HashMap::new(),
        );
        assert_eq!(state.roster.len(), 2);

        // A third player joins: the roster is the new list, not an
        // accumulation of both snapshots.
        state.apply_snapshot(
            vec![player("a", "Alice"), player("b", "Bob"), player("c", "Cleo")],
            None,
            HashMap::new(),
        );
        let ids: Vec<&str> = state.roster.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(state.round.stage, RoundStage::Research);

        // A player leaves: shrinks, never merges.
        state.apply_snapshot(vec![player("b", "Bob")], None, HashMap::new());
        assert_eq!(state.roster.len(), 1);
        assert_eq!(state.roster[0].id, "b");
    }

    #[test]
    fn snapshot_with_word_starts_investigation() {
        let mut state = GameState::default();
        assert_eq!(state.round.stage, RoundStage::Research);

        state.apply_snapshot(vec![player("a", "Alice")], Some("Dog".into()), HashMap::new());

        assert_eq!(state.round.stage, RoundStage::Investigation);
        assert_eq!(state.round.selected_word.as_deref(), Some("Dog"));
    }

    #[test]
    fn snapshot_does_not_regress_resolved_guess() {
        let mut state = GameState::default();
        state.round.stage = RoundStage::GuessCorrect;

        state.apply_snapshot(vec![], Some("Dog".into()), HashMap::new());

        assert_eq!(state.round.stage, RoundStage::GuessCorrect);
    }

    #[test]
    fn guess_result_records_truth_verbatim() {
        let mut state = GameState::default();
        state.round.stage = RoundStage::Investigation;

        state.apply_guess_result(false, "Bob".into(), Some("Alice".into()));

        assert_eq!(state.round.stage, RoundStage::GuessIncorrect);
        assert_eq!(state.round.truth.as_deref(), Some("Bob"));
        assert_eq!(state.round.guess.as_deref(), Some("Alice"));
    }

    #[test]
    fn reset_forces_research() {
        for stage in [
            RoundStage::Research,
            RoundStage::Investigation,
            RoundStage::GuessCorrect,
            RoundStage::GuessIncorrect,
        ] {
            let mut state = GameState::default();
            state.round.stage = stage;
            state.apply_reset();
            assert_eq!(state.round.stage, RoundStage::Research);
        }
    }

    #[test]
    fn snapshot_points_replace_previous_table() {
        let mut state = GameState::default();
        state.round.points.insert("a".into(), 3);

        let mut points = HashMap::new();
        points.insert("b".into(), 1);
        state.apply_snapshot(vec![player("b", "Bob")], None, points);

        assert_eq!(state.round.points.get("a"), None);
        assert_eq!(state.round.points.get("b"), Some(&1));
    }
}
