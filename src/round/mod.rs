//! Round data, ordering and answer evaluation
//!
//! This module contains the immutable round catalog built from external
//! question data, the media a round may carry, and the per-mode answer
//! evaluation used when the player submits a response.

pub mod answer;
pub mod config;
pub mod media;
