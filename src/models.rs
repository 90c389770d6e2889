//! Data models for the query engine.
//!
//! This module contains the candidate `Entry` produced by providers on
//! every round, together with the matching modes that control how an
//! entry is scored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How an entry takes part in scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingMode {
    /// Scored by the fuzzy matcher and usage history.
    #[default]
    Fuzzy,
    /// Pinned to the top with a forced score.
    AlwaysTop,
    /// Kept at the bottom with the lowest forced score.
    AlwaysBottom,
    /// Pinned to the top while the query is empty, fuzzy otherwise.
    AlwaysTopOnEmpty,
}

impl fmt::Display for MatchingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchingMode::Fuzzy => write!(f, "fuzzy"),
            MatchingMode::AlwaysTop => write!(f, "always_top"),
            MatchingMode::AlwaysBottom => write!(f, "always_bottom"),
            MatchingMode::AlwaysTopOnEmpty => write!(f, "always_top_on_empty"),
        }
    }
}

/// One candidate result.
///
/// Providers build entries fresh on every round. The engine stamps the
/// owning provider, fills in the score fields and drops the entry once it
/// has been rendered or superseded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entry {
    /// Primary text shown to the user.
    pub label: String,
    /// Secondary text.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sub: String,
    /// Extra matchable text, not displayed.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub searchable: String,
    /// Second extra matchable field.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub searchable2: String,
    /// Category tags, each matchable.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,

    /// Command line to run on activation.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub exec: String,
    /// Alternate command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_alt: Option<String>,
    /// Run inside the configured terminal.
    pub terminal: bool,
    /// Working directory for the command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Name of the provider that produced this entry.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub provider: String,
    /// Weight of the owning provider.
    pub weight: i32,

    pub matching: MatchingMode,
    /// Per-entry prefix; a matching prefix suppresses unprefixed results.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prefix: String,

    /// Only shown when a single provider is in scope.
    pub single_provider_only: bool,
    /// Dropped unless its own prefix matches the query.
    pub ignore_unprefixed: bool,
    /// Discard any preset score and score again.
    pub recalculate_score: bool,
    /// Record activations in usage history.
    pub history: bool,
    /// Explicit identifier for history lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_identifier: Option<String>,
    /// Match against the first word of the query only.
    pub match_first_word: bool,

    /// Best fuzzy strength after the field penalty.
    pub score_fuzzy: f64,
    /// Combined score used for ordering.
    pub score_final: f64,

    /// Index of the field that produced the best match.
    #[serde(skip)]
    pub matched_field: Option<usize>,
    /// Character positions of the best match within that field.
    #[serde(skip)]
    pub positions: Vec<usize>,
}

impl Entry {
    /// Create an entry with just a label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn with_sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = sub.into();
        self
    }

    pub fn with_searchable(mut self, searchable: impl Into<String>) -> Self {
        self.searchable = searchable.into();
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exec(mut self, exec: impl Into<String>) -> Self {
        self.exec = exec.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_matching(mut self, matching: MatchingMode) -> Self {
        self.matching = matching;
        self
    }

    pub fn with_history(mut self, history: bool) -> Self {
        self.history = history;
        self
    }

    /// Identifier used for usage history lookups.
    pub fn identifier(&self) -> String {
        match &self.history_identifier {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("{}{}", self.label, self.sub),
        }
    }

    /// Whether the entry carries a non-empty prefix that the query starts with.
    pub fn prefix_matches(&self, text: &str) -> bool {
        !self.prefix.is_empty() && text.starts_with(&self.prefix)
    }
}
