//! Configuration constants for the trivia session runtime
//!
//! This module contains the timing defaults, limits and scoring constants
//! used throughout the crate so that every component agrees on the same
//! boundaries.

/// Phase timer defaults and bounds (in seconds unless noted)
pub mod timer {
    /// Default length of the category preview phase
    pub const DEFAULT_CATEGORY_SECONDS: u64 = 20;
    /// Default length of the question phase, unless a round overrides it
    pub const DEFAULT_QUESTION_SECONDS: u64 = 25;
    /// Default length of the answer reveal phase
    pub const DEFAULT_ANSWER_SECONDS: u64 = 10;
    /// Default grace added to every deadline, in milliseconds
    pub const DEFAULT_GRACE_MILLIS: u64 = 1000;
    /// Default interval between deadline writes while a timer is paused, in milliseconds
    pub const DEFAULT_PERSIST_INTERVAL_MILLIS: u64 = 1000;

    /// Minimum configurable phase length
    pub const MIN_PHASE_SECONDS: u64 = 1;
    /// Maximum configurable phase length
    pub const MAX_PHASE_SECONDS: u64 = 600;
    /// Minimum configurable grace
    pub const MIN_GRACE_SECONDS: u64 = 0;
    /// Maximum configurable grace
    pub const MAX_GRACE_SECONDS: u64 = 5;
    /// Minimum configurable persist interval
    pub const MIN_PERSIST_INTERVAL_SECONDS: u64 = 0;
    /// Maximum configurable persist interval
    pub const MAX_PERSIST_INTERVAL_SECONDS: u64 = 60;
}

/// Scoring constants
pub mod scoring {
    /// Largest amount a player may risk on the final round
    pub const MAX_WAGER: u8 = 3;
    /// Consecutive correct answers needed before the streak bonus applies
    pub const STREAK_BONUS_THRESHOLD: u32 = 3;
    /// Flat bonus added once the streak threshold is reached
    pub const STREAK_BONUS: i64 = 1;
    /// Multiplier applied by the power-up
    pub const POWER_UP_MULTIPLIER: i64 = 2;
}

/// Round data limits
pub mod round {
    /// Points assigned to a round whose points value is missing or invalid
    pub const DEFAULT_POINTS: u32 = 1;
    /// Category label used when a round has none
    pub const MISSING_CATEGORY: &str = "—";
    /// Maximum length of alt text for accessibility
    pub const MAX_ALT_LENGTH: usize = 200;
    /// Maximum length of a media source reference
    pub const MAX_MEDIA_SRC_LENGTH: usize = 2048;
}

/// Player name limits
pub mod name {
    /// Minimum length of an accepted player name, in characters
    pub const MIN_LENGTH: usize = 2;
    /// Maximum length of an accepted player name, in characters
    pub const MAX_LENGTH: usize = 18;
}

/// Persistence constants
pub mod storage {
    /// Prefix shared by every key the session writes
    pub const PREFIX: &str = "trivia_session_v2_solo";
    /// Maximum length of a quiz identifier used to namespace storage
    pub const MAX_QUIZ_ID_LENGTH: usize = 64;
}

/// Display placeholder for missing answers
pub const NO_ANSWER_TEXT: &str = "—";
