//! Relevance scoring.
//!
//! The final score of an entry combines its best fuzzy strength across the
//! matchable fields with a usage boost from history:
//!
//! ```text
//! score = boost * (1 / len(text)) + strength * len(text)
//! ```
//!
//! Short queries lean on usage and recency, long queries on match quality.
//! Matches outside the label lose 10% per field index, never more than 30%.

use crate::config::Config;
use crate::engine::matcher::{self, Match};
use crate::history::{HistoryMatch, HistoryStore};
use crate::models::{Entry, MatchingMode};
use tracing::debug;

/// Score forced by `AlwaysTop` and `AlwaysTopOnEmpty`.
pub const FORCED_TOP_SCORE: f64 = 1000.0;
/// Score forced by `AlwaysBottom`.
pub const FORCED_BOTTOM_SCORE: f64 = 1.0;
/// Neutral score for the empty query.
pub const EMPTY_QUERY_SCORE: f64 = 1.0;

pub const FIELD_PENALTY_STEP: f64 = 0.10;
pub const FIELD_PENALTY_FLOOR: f64 = 0.70;

const USAGE_DECAY_BASE: i64 = 10;
// Stale items keep a minimal positive weight instead of going negative.
const USAGE_DECAY_FLOOR: i64 = 1;

/// Scoring settings taken from the configuration snapshot.
#[derive(Debug, Clone)]
pub struct ScoringOptions {
    /// Leading marker that switches to literal matching. Empty disables it.
    pub exact_marker: String,
    /// Only the label is matchable.
    pub label_only: bool,
    pub history_match: HistoryMatch,
    pub visibility_threshold: f64,
    pub debug: bool,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ScoringOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            exact_marker: config.search.exact_marker.clone(),
            label_only: config.search.label_only,
            history_match: config.search.history_match,
            visibility_threshold: config.list.visibility_threshold,
            debug: config.search.debug,
        }
    }
}

/// Multiplier applied to a match found in field `index`.
pub fn field_penalty(index: usize) -> f64 {
    (1.0 - FIELD_PENALTY_STEP * index as f64).max(FIELD_PENALTY_FLOOR)
}

/// Usage contribution: `(10 - days_since_used) * used`, zero when unused.
pub fn usage_boost(used: u32, days_since_used: i64) -> f64 {
    if used == 0 {
        return 0.0;
    }

    let decay = (USAGE_DECAY_BASE - days_since_used.max(0)).max(USAGE_DECAY_FLOOR);
    (decay * i64::from(used)) as f64
}

/// Usage boost for `entry` under `text`.
pub fn history_boost(
    entry: &Entry,
    text: &str,
    history: &dyn HistoryStore,
    policy: HistoryMatch,
) -> f64 {
    history
        .usage_for(text, &entry.identifier(), policy)
        .map(|record| usage_boost(record.used, record.days_since_used))
        .unwrap_or(0.0)
}

fn matchables<'a>(entry: &'a Entry, label_only: bool) -> Vec<&'a str> {
    if label_only {
        return vec![entry.label.as_str()];
    }

    let mut fields = vec![
        entry.label.as_str(),
        entry.sub.as_str(),
        entry.searchable.as_str(),
        entry.searchable2.as_str(),
    ];
    fields.extend(entry.categories.iter().map(String::as_str));
    fields
}

/// Fuzzy path: best field match, field penalty, usage boost.
///
/// Records the penalized strength, matched field and positions on the
/// entry and returns the combined score; zero means no match.
pub fn fuzzy_score(
    entry: &mut Entry,
    text: &str,
    use_history: bool,
    history: &dyn HistoryStore,
    options: &ScoringOptions,
) -> f64 {
    let text_length = text.chars().count();

    entry.score_fuzzy = 0.0;
    entry.matched_field = None;
    entry.positions.clear();

    let text = if entry.prefix_matches(text) {
        &text[entry.prefix.len()..]
    } else {
        text
    };

    if text_length == 0 {
        return EMPTY_QUERY_SCORE;
    }

    let literal = (!options.exact_marker.is_empty())
        .then(|| text.strip_prefix(options.exact_marker.as_str()))
        .flatten();

    let mut best: Option<(usize, Match)> = None;
    for (index, field) in matchables(entry, options.label_only).into_iter().enumerate() {
        if field.is_empty() {
            continue;
        }

        let found = match literal {
            Some(needle) => matcher::exact_match(needle, field),
            None => matcher::fuzzy_match(text, field),
        };

        if let Some(found) = found {
            if best.as_ref().map_or(true, |(_, current)| found.score > current.score) {
                best = Some((index, found));
            }
        }
    }

    let Some((index, found)) = best else {
        return 0.0;
    };

    let penalty = field_penalty(index);
    let strength = f64::from(found.score) * penalty;

    entry.score_fuzzy = strength;
    entry.matched_field = Some(index);
    entry.positions = found.positions;

    let usage = if use_history {
        history_boost(entry, text, history, options.history_match)
    } else {
        0.0
    };

    let length = text_length.max(1) as f64;
    let score = usage * (1.0 / length) + strength * length;

    if options.debug {
        debug!(
            label = %entry.label,
            sub = %entry.sub,
            score,
            usage,
            fuzzy = strength,
            penalty,
            "Matched entry"
        );
    }

    score
}

/// An entry that passed scoring and the visibility gate.
#[derive(Debug, Clone)]
pub struct Scored {
    pub entry: Entry,
    /// The entry's own prefix matched the query.
    pub prefixed: bool,
}

/// Score one entry and apply the visibility gate.
///
/// Returns `None` when the entry does not match or is hidden.
pub fn evaluate(
    mut entry: Entry,
    text: &str,
    use_history: bool,
    history: &dyn HistoryStore,
    options: &ScoringOptions,
) -> Option<Scored> {
    let to_match = if entry.match_first_word {
        text.split_whitespace().next().unwrap_or("").to_string()
    } else {
        text.to_string()
    };

    if entry.recalculate_score {
        entry.score_final = 0.0;
        entry.score_fuzzy = 0.0;
    }

    if entry.score_final == 0.0 {
        entry.score_final = match entry.matching {
            MatchingMode::Fuzzy => fuzzy_score(&mut entry, &to_match, use_history, history, options),
            MatchingMode::AlwaysTop => FORCED_TOP_SCORE,
            MatchingMode::AlwaysBottom => FORCED_BOTTOM_SCORE,
            MatchingMode::AlwaysTopOnEmpty => {
                if text.is_empty() {
                    FORCED_TOP_SCORE
                } else {
                    fuzzy_score(&mut entry, &to_match, use_history, history, options)
                }
            }
        };
    }

    if !entry.score_final.is_finite() {
        entry.score_final = 0.0;
    }

    let visible = if to_match.is_empty() {
        entry.score_final != 0.0
    } else {
        entry.score_final > options.visibility_threshold
    };

    if !visible {
        return None;
    }

    let prefixed = entry.prefix_matches(text);
    if !prefixed && entry.ignore_unprefixed {
        return None;
    }

    Some(Scored { entry, prefixed })
}
