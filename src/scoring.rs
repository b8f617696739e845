//! Scoring rules
//!
//! Every change to the player's score goes through this module. The delta
//! formulas ([`correct_delta`], [`wager_delta`]) are shared with
//! [`crate::results`], which replays them from recorded outcomes; keeping a
//! single definition is what lets the live score and the reconstructed
//! ledger agree.

use tracing::{debug, info};

use crate::{
    constants::scoring::{MAX_WAGER, POWER_UP_MULTIPLIER, STREAK_BONUS, STREAK_BONUS_THRESHOLD},
    stage::Stage,
    state::{Outcome, SessionState},
};

/// Bonus earned by a correct answer that brings the streak to `streak`
pub fn streak_bonus(streak: u32) -> i64 {
    if streak >= STREAK_BONUS_THRESHOLD {
        STREAK_BONUS
    } else {
        0
    }
}

/// Points for a correct non-final answer
///
/// The power-up multiplies the round's points; the streak bonus is added
/// afterwards and is never multiplied.
pub fn correct_delta(points: u32, doubled: bool, streak: u32) -> i64 {
    let multiplier = if doubled { POWER_UP_MULTIPLIER } else { 1 };
    i64::from(points) * multiplier + streak_bonus(streak)
}

/// Points won or lost on the final round
pub fn wager_delta(amount: u8, correct: bool) -> i64 {
    if correct {
        i64::from(amount)
    } else {
        -i64::from(amount)
    }
}

/// Credits a correct answer on non-final round `index`
///
/// # Returns
///
/// The points added.
pub fn award(state: &mut SessionState, index: usize, points: u32) -> i64 {
    let player = &mut state.player;
    let streak = if state.last_correct {
        player.streak + 1
    } else {
        1
    };
    player.streak = streak;
    player.max_streak = player.max_streak.max(streak);
    state.last_correct = true;

    let delta = correct_delta(points, state.power_up.applies_to(index), streak);
    player.score += delta;

    info!(index, delta, streak, score = player.score, "awarded");
    delta
}

/// Breaks the streak after a wrong or missing answer
///
/// No points are taken away.
pub fn penalize(state: &mut SessionState) {
    state.player.streak = 0;
    state.last_correct = false;
    debug!("streak reset");
}

/// Records the outcome of non-final round `index` and scores it
///
/// # Returns
///
/// false when the round already has an outcome, in which case nothing changes.
pub fn record(state: &mut SessionState, index: usize, points: u32, correct: bool) -> bool {
    if state.outcomes.contains_key(&index) {
        return false;
    }
    state
        .outcomes
        .insert(index, Outcome::new(correct, false));
    if correct {
        award(state, index, points);
    } else {
        penalize(state);
    }
    true
}

/// Arms the power-up for round `index`
///
/// Only legal while the run is in the category phase of that round, the
/// round is not final and has no result yet, and the power-up has not been
/// used.
pub fn arm_power_up(state: &mut SessionState, index: usize, is_final: bool) -> bool {
    let in_category = state.stage() == Stage::Category && state.round_index() == index;
    let scored = state.outcomes.contains_key(&index);
    if !state.power_up.available || is_final || !in_category || scored {
        return false;
    }
    state.power_up.available = false;
    state.power_up.armed_round = Some(index);
    info!(index, "power-up armed");
    true
}

/// Sets the final-round stake, clamped to `0..=MAX_WAGER`
///
/// Rejected once the wager has been settled.
pub fn set_wager(state: &mut SessionState, amount: u8) -> bool {
    if state.wager.resolved {
        return false;
    }
    state.wager.amount = amount.min(MAX_WAGER);
    true
}

/// Settles the final round at `index`
///
/// Applies at most once per attempt; the power-up and the streak bonus
/// never apply here.
pub fn settle_wager(state: &mut SessionState, index: usize, correct: bool) -> bool {
    if state.wager.resolved {
        return false;
    }
    let delta = wager_delta(state.wager.amount, correct);
    state.player.score += delta;
    state.outcomes.insert(index, Outcome::new(correct, true));
    state.wager.resolved = true;

    info!(index, delta, score = state.player.score, "wager settled");
    true
}

/// Re-opens the wager on the final round at `index`
///
/// A previous settlement is reverted and its outcome cleared so the round
/// can be played again; the stake goes back to zero.
pub fn reopen_wager(state: &mut SessionState, index: usize) {
    if state.wager.resolved
        && let Some(outcome) = state.outcomes.remove(&index)
        && outcome.is_final()
    {
        state.player.score -= wager_delta(state.wager.amount, outcome.is_correct());
        debug!(index, "wager settlement reverted");
    }
    state.wager.amount = 0;
    state.wager.resolved = false;
}
