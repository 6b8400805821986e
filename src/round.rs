//! Round progression: the per-round stage and its transition rules.
//!
//! The client is a passive mirror of server-declared state, so nothing here
//! rejects a transition — the functions only answer "given what the server
//! just said, which stage are we in now?". The rules are written as an
//! explicit decision table so the one asymmetric case is visible: a snapshot
//! with a selected word only advances `Research` to `Investigation`; it never
//! regresses an in-progress investigation or a resolved guess.

use serde::{Deserialize, Serialize};

/// Which phase of a single game round is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoundStage {
    /// Players are hunting for article topics; no word selected yet.
    #[default]
    Research,
    /// A word has been selected and the investigator is questioning players.
    Investigation,
    /// The investigator accused the right player.
    GuessCorrect,
    /// The investigator accused the wrong player.
    GuessIncorrect,
}

impl RoundStage {
    /// Stage after a broadcast `state-update` snapshot.
    ///
    /// No selected word means a fresh round: back to `Research` from any
    /// stage. A selected word is edge-triggered: it advances `Research` to
    /// `Investigation` and leaves every other stage untouched.
    #[must_use]
    pub fn on_state_update(self, selected_word: Option<&str>) -> Self {
        match (self, selected_word) {
            (_, None) => Self::Research,
            (Self::Research, Some(_)) => Self::Investigation,
            (current, Some(_)) => current,
        }
    }

    /// Stage after a `guess-result` broadcast. Terminal for the round until
    /// the next snapshot or reset.
    #[must_use]
    pub fn on_guess_result(correct: bool) -> Self {
        if correct {
            Self::GuessCorrect
        } else {
            Self::GuessIncorrect
        }
    }

    /// Stage after a `game-reset` broadcast: unconditionally `Research`.
    #[must_use]
    pub fn on_game_reset() -> Self {
        Self::Research
    }
}
