//! Answer modes, raw answers and answer evaluation
//!
//! Every round is answered in one of four modes. Numeric answers are graded
//! here against the round's acceptable numbers; catalog and scoreline answers
//! are handed to a [`Validator`] (an injected one, or [`BuiltinValidator`]);
//! free text is never graded automatically and always goes to manual marking.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::config::Round;

/// How a round expects to be answered
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    /// Pick an entry from a catalog (players, clubs, stadiums, ...)
    #[display("catalog")]
    Catalog,
    /// Enter a home/away score
    #[display("scoreline")]
    Scoreline,
    /// Enter a number
    #[display("numeric")]
    Numeric,
    /// Free text, marked by hand
    #[default]
    #[display("text")]
    Text,
}

/// The value a player submitted for a round
///
/// The shape depends on the input widget: a plain string for catalog and
/// text rounds, `{home, away}` for scorelines and `{value}` for numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAnswer {
    /// A scoreline entered with the stepper
    Scoreline {
        /// Goals of the home side
        home: u32,
        /// Goals of the away side
        away: u32,
    },
    /// A number, `None` when the field was left empty or held garbage
    Numeric {
        /// The entered number
        value: Option<f64>,
    },
    /// A catalog selection or free text
    Text(String),
}

impl RawAnswer {
    /// The value submitted on the player's behalf when they give no answer
    ///
    /// This is what an expired question timer or a "don't know" button submits.
    pub fn empty_for(mode: AnswerMode) -> Self {
        match mode {
            AnswerMode::Numeric => Self::Numeric { value: None },
            AnswerMode::Catalog | AnswerMode::Scoreline | AnswerMode::Text => {
                Self::Text(String::new())
            }
        }
    }

    /// Reshapes the value into the form stored for `mode`
    ///
    /// Numeric rounds always store `{value}`, so a typed string is parsed here
    /// and anything that is not a finite number becomes `{value: null}`.
    pub fn stored_for(self, mode: AnswerMode) -> Self {
        match mode {
            AnswerMode::Numeric => Self::Numeric {
                value: normalize_numeric_answer(&self),
            },
            AnswerMode::Catalog | AnswerMode::Scoreline | AnswerMode::Text => self,
        }
    }
}

/// The outcome of checking an answer against a round's canonical answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    /// Whether the answer is accepted
    pub correct: bool,
    /// The canonical form of the answer, when one is known
    pub canonical: Option<String>,
}

/// Errors raised by answer validators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    /// The validator has no data for this round
    #[error("no canonical answer for round {0}")]
    MissingAnswer(String),
    /// The validator could not complete
    #[error("validator failed: {0}")]
    Failed(String),
}

/// Checks raw answers for catalog and scoreline rounds
///
/// Implementations must be pure: the same round and value always give the
/// same verdict.
pub trait Validator {
    /// Checks `raw` against the canonical answer of `round`
    ///
    /// # Errors
    ///
    /// Returns a [`ValidatorError`] when the answer cannot be checked. The
    /// caller degrades the round to manual marking in that case.
    fn validate(&self, round: &Round, raw: &RawAnswer) -> Result<Validation, ValidatorError>;
}

/// Validation used when no external validator is supplied
///
/// Catalog answers are compared trimmed and case-insensitively against the
/// round's answer and aliases; scorelines are compared against an answer of
/// the form `H-A`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinValidator;

impl Validator for BuiltinValidator {
    fn validate(&self, round: &Round, raw: &RawAnswer) -> Result<Validation, ValidatorError> {
        if round.answer_mode == AnswerMode::Numeric {
            return Ok(grade_numeric(round, raw));
        }

        let canonical = round
            .answer
            .clone()
            .ok_or_else(|| ValidatorError::MissingAnswer(round.id.clone()))?;

        let correct = match round.answer_mode {
            AnswerMode::Scoreline => {
                let expected = parse_scoreline(&canonical).ok_or_else(|| {
                    ValidatorError::Failed(format!("unreadable scoreline {canonical:?}"))
                })?;
                scoreline_of(raw) == Some(expected)
            }
            AnswerMode::Catalog | AnswerMode::Text | AnswerMode::Numeric => match raw {
                RawAnswer::Text(text) => {
                    let text = clean_answer(text);
                    std::iter::once(&canonical)
                        .chain(&round.aliases)
                        .any(|accepted| clean_answer(accepted) == text)
                }
                RawAnswer::Scoreline { .. } | RawAnswer::Numeric { .. } => false,
            },
        };

        Ok(Validation {
            correct,
            canonical: Some(canonical),
        })
    }
}

/// How a submitted answer is to be scored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The player explicitly gave no answer; scored as wrong without validation
    NoAnswer,
    /// The answer was checked automatically
    Graded(Validation),
    /// The answer needs to be marked by hand
    Manual,
}

/// Normalizes an answer string for comparison
fn clean_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// Parses a string to a finite number, `None` for blank or non-numeric text
fn normalize_number_str(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Normalizes a JSON value (number or numeric string) to a finite number
pub(crate) fn normalize_number_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        serde_json::Value::String(s) => normalize_number_str(s),
        _ => None,
    }
}

/// Parses a raw answer to a finite number
///
/// Returns `None` when the value is missing, blank or not a finite number.
/// `None` means "no answer" for numeric rounds regardless of any validator.
pub fn normalize_numeric_answer(raw: &RawAnswer) -> Option<f64> {
    match raw {
        RawAnswer::Numeric { value } => value.filter(|n| n.is_finite()),
        RawAnswer::Text(text) => normalize_number_str(text),
        RawAnswer::Scoreline { .. } => None,
    }
}

/// Formats a number the way it is shown back to the player (`3`, `2.5`)
pub fn format_number(n: f64) -> String {
    n.to_string()
}

/// Parses `"2-1"`, `"2 - 1"`, `"2–1"` or `"2:1"`
pub fn parse_scoreline(text: &str) -> Option<(u32, u32)> {
    let (home, away) = text.split(['-', '–', ':']).collect_tuple()?;
    Some((home.trim().parse().ok()?, away.trim().parse().ok()?))
}

fn scoreline_of(raw: &RawAnswer) -> Option<(u32, u32)> {
    match raw {
        RawAnswer::Scoreline { home, away } => Some((*home, *away)),
        RawAnswer::Text(text) => parse_scoreline(text),
        RawAnswer::Numeric { .. } => None,
    }
}

/// Returns true when the submission counts as an explicit "no answer"
///
/// A numeric value that does not normalize, an empty scoreline or a blank
/// catalog selection are all "no answer". Free text never is: it always goes
/// on to manual marking.
pub fn is_explicit_no_answer(mode: AnswerMode, raw: &RawAnswer) -> bool {
    match mode {
        AnswerMode::Numeric => normalize_numeric_answer(raw).is_none(),
        AnswerMode::Scoreline | AnswerMode::Catalog => {
            matches!(raw, RawAnswer::Text(text) if text.trim().is_empty())
        }
        AnswerMode::Text => false,
    }
}

/// Grades a numeric answer against the round's acceptable numbers
///
/// Comparison is exact after normalization. The canonical string is the
/// normalized number the player entered.
pub fn grade_numeric(round: &Round, raw: &RawAnswer) -> Validation {
    match normalize_numeric_answer(raw) {
        Some(got) => {
            #[allow(clippy::float_cmp)]
            let correct = round.accepted_numbers().iter().any(|n| *n == got);
            Validation {
                correct,
                canonical: Some(format_number(got)),
            }
        }
        None => Validation {
            correct: false,
            canonical: None,
        },
    }
}

/// Routes a submitted answer to the evaluation its round's mode requires
///
/// A failing validator is logged and the round falls back to manual marking.
pub fn resolve(round: &Round, raw: &RawAnswer, validator: &dyn Validator) -> Resolution {
    if is_explicit_no_answer(round.answer_mode, raw) {
        return Resolution::NoAnswer;
    }

    match round.answer_mode {
        AnswerMode::Numeric => Resolution::Graded(grade_numeric(round, raw)),
        AnswerMode::Catalog | AnswerMode::Scoreline => match validator.validate(round, raw) {
            Ok(validation) => Resolution::Graded(validation),
            Err(e) => {
                warn!(round = %round.id, mode = %round.answer_mode, "validation failed: {e}");
                Resolution::Manual
            }
        },
        AnswerMode::Text => Resolution::Manual,
    }
}
