//! The mutable aggregate of one play-through
//!
//! [`SessionState`] is plain data. Only the stage transitions in
//! [`crate::game`] and the functions in [`crate::scoring`] mutate it.

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

use crate::{
    round::answer::RawAnswer,
    stage::{Cursor, Stage},
    timer::EpochMillis,
};

/// Identifies one play-through in reports
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The recorded result label of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// Non-final round answered correctly
    #[display("correct")]
    Correct,
    /// Non-final round answered wrongly or not at all
    #[display("wrong")]
    Wrong,
    /// Final round won
    #[display("final-correct")]
    FinalCorrect,
    /// Final round lost
    #[display("final-wrong")]
    FinalWrong,
}

impl Outcome {
    /// The label for a round given its correctness and whether it is final
    pub fn new(correct: bool, is_final: bool) -> Self {
        match (correct, is_final) {
            (true, false) => Self::Correct,
            (false, false) => Self::Wrong,
            (true, true) => Self::FinalCorrect,
            (false, true) => Self::FinalWrong,
        }
    }

    /// Whether the outcome counts as correct
    pub fn is_correct(self) -> bool {
        matches!(self, Self::Correct | Self::FinalCorrect)
    }

    /// Whether the outcome settles the final round
    pub fn is_final(self) -> bool {
        matches!(self, Self::FinalCorrect | Self::FinalWrong)
    }
}

/// The player and their live tallies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Display name, empty until chosen
    pub name: String,
    /// Running score, may go negative after a lost wager
    pub score: i64,
    /// Current run of consecutive correct answers
    pub streak: u32,
    /// Longest streak reached in this run
    pub max_streak: u32,
}

/// The one-time score doubler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerUp {
    /// Whether it can still be armed
    pub available: bool,
    /// The round it was armed for, fixed once set
    pub armed_round: Option<usize>,
}

impl Default for PowerUp {
    fn default() -> Self {
        Self {
            available: true,
            armed_round: None,
        }
    }
}

impl PowerUp {
    /// Whether the power-up doubles round `index`
    pub fn applies_to(&self, index: usize) -> bool {
        self.armed_round == Some(index)
    }
}

/// The stake on the final round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wager {
    /// Points risked, within `0..=MAX_WAGER`
    pub amount: u8,
    /// Whether the final round has been settled in this attempt
    pub resolved: bool,
}

/// Everything that describes a run in progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Id reported with the finished run
    pub run_id: RunId,
    /// Current stage and round index
    pub cursor: Cursor,
    /// Name and live tallies
    pub player: Player,
    /// Power-up state
    pub power_up: PowerUp,
    /// Result label per round index; absent means unanswered
    pub outcomes: BTreeMap<usize, Outcome>,
    /// The value the player submitted per round index
    pub raw_answers: BTreeMap<usize, RawAnswer>,
    /// Final round stake
    pub wager: Wager,
    /// Whether the previous scored event was correct
    pub last_correct: bool,
    /// When the player first reached the intro, or the externally agreed start
    pub started_at: Option<EpochMillis>,
    /// Whether the name-change notification has fired
    pub name_announced: bool,
    /// Whether the finished run has been reported
    pub finish_reported: bool,
}

impl SessionState {
    /// Current stage
    pub fn stage(&self) -> Stage {
        self.cursor.stage
    }

    /// Current round index
    pub fn round_index(&self) -> usize {
        self.cursor.index
    }
}
