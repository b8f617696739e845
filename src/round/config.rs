//! Round data and the ordered round catalog
//!
//! Question data arrives from outside the runtime as loosely-typed JSON. It is
//! decoded leniently into [`RoundConfig`] (malformed fields fall back to their
//! defaults instead of rejecting the round) and then built once into an
//! immutable [`Catalog`] sorted by each round's `order` key.

use std::time::Duration;

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::skip_serializing_none;
use tracing::warn;

use super::{
    answer::{AnswerMode, normalize_number_value},
    media::Media,
};
use crate::constants::round::{DEFAULT_POINTS, MISSING_CATEGORY};

/// Accepts a string or a number and yields it as text
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// One question as it appears in the external question data
///
/// Every field is optional. Missing or malformed values default to order `0`,
/// points `1` and mode `text` so that a damaged entry stays playable.
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundConfig {
    /// Identifier of the question
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    /// Sort key defining the play sequence
    #[serde_as(as = "serde_with::DefaultOnError")]
    #[serde(default)]
    pub order: Option<f64>,
    /// Category shown in the preview phase
    #[serde_as(as = "serde_with::DefaultOnError")]
    #[serde(default)]
    pub category: Option<String>,
    /// The question text
    #[serde_as(as = "serde_with::DefaultOnError")]
    #[serde(default)]
    pub prompt: String,
    /// Scoring weight of the question
    #[serde_as(as = "serde_with::DefaultOnError")]
    #[serde(default)]
    pub points: Option<u32>,
    /// How the question is answered
    #[serde_as(as = "serde_with::DefaultOnError")]
    #[serde(default)]
    pub answer_mode: AnswerMode,
    /// Question phase length overriding the session default
    #[serde_as(as = "serde_with::DefaultOnError")]
    #[serde(default, alias = "time_seconds")]
    pub time_seconds: Option<u64>,
    /// Accompanying media
    #[serde_as(as = "serde_with::DefaultOnError")]
    #[serde(default)]
    pub media: Option<Media>,
    /// Canonical answer as displayed after the question
    #[serde(default, deserialize_with = "lenient_text")]
    pub answer: Option<String>,
    /// Alternative spellings accepted for catalog answers
    #[serde_as(as = "serde_with::DefaultOnError")]
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Acceptable values for numeric questions
    #[serde_as(as = "serde_with::DefaultOnError")]
    #[serde(default)]
    pub accept_numbers: Vec<serde_json::Value>,
    /// Single acceptable value for numeric questions
    #[serde(default)]
    pub accept_number: Option<serde_json::Value>,
    /// Trivia shown next to the answer
    #[serde_as(as = "serde_with::DefaultOnError")]
    #[serde(default)]
    pub fact: Option<String>,
}

/// An immutable, normalized round of the session
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    /// Identifier of the round (`round-N` when the data had none)
    pub id: String,
    /// Sort key the catalog was ordered by
    pub order: f64,
    /// Category label
    pub category: String,
    /// The question text
    pub prompt: String,
    /// Scoring weight, at least 1
    pub points: u32,
    /// How the round is answered
    pub answer_mode: AnswerMode,
    /// Question phase length overriding the session default
    pub time: Option<Duration>,
    /// Accompanying media
    pub media: Option<Media>,
    /// Canonical answer as displayed
    pub answer: Option<String>,
    /// Alternative accepted spellings
    pub aliases: Vec<String>,
    /// Normalized acceptable numbers for numeric rounds
    accept_numbers: Vec<f64>,
    /// Trivia shown next to the answer
    pub fact: Option<String>,
}

impl Round {
    /// Normalizes raw question data
    ///
    /// # Arguments
    ///
    /// * `config` - The question as decoded from external data
    /// * `position` - The position of the question in the source data
    fn from_config(config: RoundConfig, position: usize) -> Self {
        let accept_numbers = if config.accept_numbers.is_empty() {
            config
                .accept_number
                .as_ref()
                .and_then(normalize_number_value)
                .or_else(|| {
                    config
                        .answer
                        .as_deref()
                        .map(|a| serde_json::Value::String(a.to_owned()))
                        .as_ref()
                        .and_then(normalize_number_value)
                })
                .into_iter()
                .collect_vec()
        } else {
            config
                .accept_numbers
                .iter()
                .filter_map(normalize_number_value)
                .collect_vec()
        };

        let id = config
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("round-{}", position + 1));

        let media = config.media.filter(|media| match media.validate() {
            Ok(()) => true,
            Err(report) => {
                warn!(round = %id, "dropping invalid media: {report}");
                false
            }
        });

        Self {
            order: config.order.unwrap_or_default(),
            category: config
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| MISSING_CATEGORY.to_owned()),
            prompt: config.prompt,
            points: config
                .points
                .filter(|p| *p >= 1)
                .unwrap_or(DEFAULT_POINTS),
            answer_mode: config.answer_mode,
            time: config
                .time_seconds
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
            media,
            answer: config.answer,
            aliases: config.aliases,
            accept_numbers,
            fact: config.fact,
            id,
        }
    }

    /// The numbers a numeric round accepts
    pub fn accepted_numbers(&self) -> &[f64] {
        &self.accept_numbers
    }

    /// Whether the round carries media that must load before its timer runs
    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }
}

/// Per-category preview shown before the session starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    /// The category label
    pub category: String,
    /// Number of rounds in the category
    pub count: usize,
    /// Distinct point values in the category, ascending
    pub points: Vec<u32>,
}

impl CategorySummary {
    /// Formats the point values as shown in the preview (`×1`, `×1 / ×2`, `×1–×3`)
    pub fn points_label(&self) -> String {
        match self.points.as_slice() {
            [] => format!("×{DEFAULT_POINTS}"),
            [only] => format!("×{only}"),
            [low, high] => format!("×{low} / ×{high}"),
            [low, .., high] => format!("×{low}–×{high}"),
        }
    }
}

/// The ordered, immutable list of rounds of a session
///
/// The last round by order is the final round: it takes a wager instead of
/// regular scoring and cannot be doubled by the power-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    rounds: Vec<Round>,
}

impl Catalog {
    /// Builds the catalog from raw question data
    ///
    /// Rounds are sorted by `order` ascending; ties keep their original
    /// relative position.
    pub fn build(configs: Vec<RoundConfig>) -> Self {
        let rounds = configs
            .into_iter()
            .enumerate()
            .map(|(position, config)| Round::from_config(config, position))
            .sorted_by(|a, b| a.order.total_cmp(&b.order))
            .collect_vec();

        Self { rounds }
    }

    /// Builds the catalog from a JSON array of questions
    ///
    /// Never fails: an unreadable document yields an empty catalog and an
    /// entry that is not an object is skipped, both with a warning.
    pub fn from_json(json: &str) -> Self {
        let entries = match serde_json::from_str::<Vec<serde_json::Value>>(json) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("unreadable question data, starting with an empty catalog: {e}");
                return Self::default();
            }
        };

        Self::build(
            entries
                .into_iter()
                .enumerate()
                .filter_map(|(position, entry)| {
                    serde_json::from_value::<RoundConfig>(entry)
                        .inspect_err(|e| warn!(position, "skipping malformed question: {e}"))
                        .ok()
                })
                .collect(),
        )
    }

    /// Returns the number of rounds
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    /// Checks if the catalog contains any rounds
    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Index of the last round, `0` for an empty catalog
    pub fn last_index(&self) -> usize {
        self.rounds.len().saturating_sub(1)
    }

    /// The round at `index`, if any
    pub fn get(&self, index: usize) -> Option<&Round> {
        self.rounds.get(index)
    }

    /// All rounds in play order
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// Whether `index` is the final round
    pub fn is_final(&self, index: usize) -> bool {
        !self.rounds.is_empty() && index == self.rounds.len() - 1
    }

    /// The final round, if the catalog is not empty
    pub fn final_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    /// The category of the final round
    pub fn final_category(&self) -> Option<&str> {
        self.final_round().map(|round| round.category.as_str())
    }

    /// Groups rounds by category for the intro preview
    ///
    /// Categories are listed in order of first appearance.
    pub fn summarize(&self) -> Vec<CategorySummary> {
        self.rounds
            .iter()
            .map(|round| round.category.as_str())
            .unique()
            .map(|category| {
                let in_category = self
                    .rounds
                    .iter()
                    .filter(|round| round.category == category)
                    .collect_vec();

                CategorySummary {
                    category: category.to_owned(),
                    count: in_category.len(),
                    points: in_category
                        .iter()
                        .map(|round| round.points)
                        .sorted()
                        .dedup()
                        .collect(),
                }
            })
            .collect()
    }

    /// The intro preview without the final round's category
    pub fn intro_categories(&self) -> Vec<CategorySummary> {
        let final_category = self.final_category();
        self.summarize()
            .into_iter()
            .filter(|summary| Some(summary.category.as_str()) != final_category)
            .collect()
    }

    /// Identifies the catalog content for storage namespacing
    ///
    /// A persisted session whose signature differs from the current catalog's
    /// belongs to different content and must not be restored.
    pub fn signature(&self) -> Vec<String> {
        self.rounds.iter().map(|round| round.id.clone()).collect()
    }
}
