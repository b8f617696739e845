//! Contracts with the world outside the runtime
//!
//! The runtime never renders, never talks to a network and never decides
//! when media has loaded. It reaches those concerns only through the traits
//! in this module, which hosts implement and hand to [`crate::game::Game`].

use serde::Serialize;
use thiserror::Error;

use crate::{results::ResultRow, round::config::Round, state::RunId};

/// A failure reported by a [`SessionSink`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("finished run could not be reported: {0}")]
pub struct SinkError(pub String);

/// The summary of a completed run
///
/// Built from the reconstructed results table, never from live tallies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedRun {
    /// Id of the play-through
    pub run_id: RunId,
    /// Room the run was played in, when coordinated with others
    pub room_code: Option<String>,
    /// Player display name
    pub player_name: String,
    /// Total of the results table
    pub final_score: i64,
    /// Longest streak reached
    pub max_streak: u32,
    /// Seconds from start to results, 0 when the start is unknown
    pub duration_seconds: u64,
    /// The full results table
    pub round_results: Vec<ResultRow>,
}

/// Receives the finished run, once, when the results stage is reached
pub trait SessionSink {
    /// Reports a finished run
    ///
    /// # Errors
    ///
    /// Returns an error when the report could not be delivered. The runtime
    /// logs it and carries on.
    fn report(&self, run: &FinishedRun) -> Result<(), SinkError>;
}

/// Tells the runtime whether a round's media is ready to be shown
///
/// While it answers false, the question timer is held paused.
pub trait MediaReadiness {
    /// Whether the media of `round` has loaded
    fn is_ready(&self, round: &Round) -> bool;
}

/// Treats all media as ready immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

impl MediaReadiness for AlwaysReady {
    fn is_ready(&self, _round: &Round) -> bool {
        true
    }
}

/// Called once when a player-entered name is first accepted
pub type NameListener = Box<dyn FnMut(&str)>;
