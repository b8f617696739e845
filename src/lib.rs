//! # Trivia Session Library
//!
//! This library provides the runtime of a single-player trivia session. It
//! walks a player through an ordered catalog of rounds, enforces wall-clock
//! deadlines per phase that survive reloads and backgrounded tabs, scores
//! answers with streak bonuses, a one-time score doubler and a final wager,
//! and rebuilds a verifiable results table from the recorded outcomes.
//!
//! Rendering, networking and answer input widgets live outside the crate;
//! they talk to the runtime through [`game::Game`]'s actions and the
//! collaborator traits in [`session`].

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]
use serde::{Deserialize, Serialize};

pub mod constants;

pub mod game;
pub mod names;
pub mod results;
pub mod round;
pub mod scoring;
pub mod session;
pub mod stage;
pub mod state;
pub mod store;
pub mod timer;

pub use game::{Action, Game, Options};
pub use round::config::Catalog;
pub use store::{KeyValueStore, MemoryStore};
pub use timer::{Clock, SystemClock};

/// A scheduled expiry check for a timed phase
///
/// Hosts that drive the runtime with scheduled callbacks rather than a
/// frame loop obtain one from [`Game::pending_alarm`] and hand it back to
/// [`Game::receive_alarm`] once its delay has passed. The token ties the
/// alarm to one arming of one phase, so an alarm that outlives its phase is
/// recognized and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmMessage {
    /// Arming generation the alarm was issued for
    pub token: u64,
    /// Phase being timed
    pub phase: timer::Phase,
    /// Round the phase belongs to
    pub index: usize,
}
