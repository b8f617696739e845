//! Results ledger reconstruction
//!
//! [`reconstruct`] replays the recorded outcomes in round order and derives
//! every row of the results table from scratch: the streak is re-derived
//! from the outcome sequence alone and the live player tallies are never
//! consulted. The function is pure, so the same inputs always produce the
//! same table, and it is the only source for any reported summary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    constants::NO_ANSWER_TEXT,
    round::{
        answer::{AnswerMode, RawAnswer, format_number, normalize_numeric_answer},
        config::Round,
    },
    scoring::{correct_delta, streak_bonus, wager_delta},
    state::{Outcome, PowerUp, Wager},
};

/// One row of the results table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    /// 0-based round index
    pub index: usize,
    /// 1-based round number for display
    pub number: usize,
    /// Category label
    pub category: String,
    /// The question text
    pub prompt: String,
    /// Base points of the round
    pub points: u32,
    /// Whether this is the final round
    pub is_final: bool,
    /// Recorded outcome; `None` when the round was never answered
    pub outcome: Option<Outcome>,
    /// Correctness derived from the outcome
    pub correct: Option<bool>,
    /// Whether the power-up was armed for this round
    pub x2: bool,
    /// Streak bonus earned on this round
    pub streak_bonus: i64,
    /// The player's answer as displayed
    pub answer_text: String,
    /// Points won or lost on this round
    pub delta: i64,
    /// Running total after this round
    pub total: i64,
}

/// Formats a submitted answer for display
///
/// Scorelines read `H - A`, numbers are shown normalized and anything blank
/// or missing reads as a dash.
pub fn answer_text(mode: AnswerMode, raw: Option<&RawAnswer>) -> String {
    let text = match (mode, raw) {
        (_, None) => None,
        (AnswerMode::Numeric, Some(raw)) => normalize_numeric_answer(raw).map(format_number),
        (_, Some(RawAnswer::Scoreline { home, away })) => Some(format!("{home} - {away}")),
        (_, Some(RawAnswer::Numeric { value })) => value.map(format_number),
        (_, Some(RawAnswer::Text(text))) => {
            Some(text.trim().to_owned()).filter(|text| !text.is_empty())
        }
    };
    text.unwrap_or_else(|| NO_ANSWER_TEXT.to_owned())
}

/// Rebuilds the results table from the recorded history
///
/// # Arguments
///
/// * `rounds` - The ordered catalog; the last round is the final round
/// * `outcomes` - Recorded outcome per round index
/// * `power_up` - Power-up state, only `armed_round` is read
/// * `wager` - Final round stake
/// * `raw_answers` - Submitted values, used for display only
pub fn reconstruct(
    rounds: &[Round],
    outcomes: &BTreeMap<usize, Outcome>,
    power_up: &PowerUp,
    wager: &Wager,
    raw_answers: &BTreeMap<usize, RawAnswer>,
) -> Vec<ResultRow> {
    let final_index = rounds.len().checked_sub(1);
    let mut streak = 0;
    let mut last_correct = false;
    let mut total = 0;

    rounds
        .iter()
        .enumerate()
        .map(|(index, round)| {
            let is_final = Some(index) == final_index;
            let outcome = outcomes.get(&index).copied();
            let x2 = !is_final && power_up.applies_to(index);

            let (delta, bonus) = match outcome {
                Some(Outcome::Correct) => {
                    streak = if last_correct { streak + 1 } else { 1 };
                    last_correct = true;
                    (
                        correct_delta(round.points, x2, streak),
                        streak_bonus(streak),
                    )
                }
                Some(Outcome::Wrong) => {
                    streak = 0;
                    last_correct = false;
                    (0, 0)
                }
                Some(outcome @ (Outcome::FinalCorrect | Outcome::FinalWrong)) => {
                    (wager_delta(wager.amount, outcome.is_correct()), 0)
                }
                None => {
                    streak = 0;
                    last_correct = false;
                    (0, 0)
                }
            };
            total += delta;

            ResultRow {
                index,
                number: index + 1,
                category: round.category.clone(),
                prompt: round.prompt.clone(),
                points: round.points,
                is_final,
                outcome,
                correct: outcome.map(Outcome::is_correct),
                x2,
                streak_bonus: bonus,
                answer_text: answer_text(round.answer_mode, raw_answers.get(&index)),
                delta,
                total,
            }
        })
        .collect()
}

/// The total of a reconstructed table, 0 when empty
pub fn final_total(rows: &[ResultRow]) -> i64 {
    rows.last().map_or(0, |row| row.total)
}
