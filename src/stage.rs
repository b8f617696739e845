//! The stage machine that orders a run
//!
//! A run walks `Name → Intro → (Category → Question → Answer)* → Results`.
//! Transitions are pure functions over a [`Cursor`]; the session decides
//! which entry and exit effects to run once a transition is accepted.

use serde::{Deserialize, Serialize};

use crate::timer::Phase;

/// Top-level screen of a run
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Waiting for the player to choose a name
    #[default]
    #[display("name")]
    Name,
    /// Overview of the categories ahead
    #[display("intro")]
    Intro,
    /// Category preview of the current round
    #[display("category")]
    Category,
    /// Question of the current round
    #[display("question")]
    Question,
    /// Answer reveal of the current round
    #[display("answer")]
    Answer,
    /// Summary of the whole run
    #[display("results")]
    Results,
}

impl Stage {
    /// The timed phase this stage corresponds to, if any
    pub fn phase(self) -> Option<Phase> {
        match self {
            Self::Category => Some(Phase::Category),
            Self::Question => Some(Phase::Question),
            Self::Answer => Some(Phase::Answer),
            Self::Name | Self::Intro | Self::Results => None,
        }
    }

    /// Whether the stage belongs to a specific round
    pub fn is_round_stage(self) -> bool {
        self.phase().is_some()
    }
}

/// Position within a run: the current stage and round index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cursor {
    /// Current stage
    pub stage: Stage,
    /// Current round index, meaningful for round stages and kept otherwise
    pub index: usize,
}

impl Cursor {
    /// Creates a cursor
    pub fn new(stage: Stage, index: usize) -> Self {
        Self { stage, index }
    }

    /// The cursor one forward step away
    ///
    /// `round_count` is the catalog length. Advancing from the last answer
    /// or from an intro over an empty catalog lands on the results;
    /// advancing from the results stays there.
    pub fn advance(self, round_count: usize) -> Self {
        let Self { stage, index } = self;
        match stage {
            Stage::Name => Self::new(Stage::Intro, 0),
            Stage::Intro if round_count == 0 => Self::new(Stage::Results, 0),
            Stage::Intro => Self::new(Stage::Category, 0),
            Stage::Category => Self::new(Stage::Question, index),
            Stage::Question => Self::new(Stage::Answer, index),
            Stage::Answer if index + 1 >= round_count => Self::new(Stage::Results, index),
            Stage::Answer => Self::new(Stage::Category, index + 1),
            Stage::Results => self,
        }
    }

    /// The cursor one backward step away
    ///
    /// Stepping back from a category lands on the previous round's answer,
    /// skipping its question. `Name` and `Intro` cannot go back.
    pub fn retreat(self) -> Self {
        let Self { stage, index } = self;
        match stage {
            Stage::Name | Stage::Intro => self,
            Stage::Category if index == 0 => Self::new(Stage::Intro, 0),
            Stage::Category => Self::new(Stage::Answer, index - 1),
            Stage::Question => Self::new(Stage::Category, index),
            Stage::Answer => Self::new(Stage::Question, index),
            Stage::Results => Self::new(Stage::Answer, index),
        }
    }

    /// Keeps the index inside a catalog of `round_count` rounds
    pub fn clamped(self, round_count: usize) -> Self {
        Self {
            index: self.index.min(round_count.saturating_sub(1)),
            ..self
        }
    }
}
