//! Usage history and typeahead input history.
//!
//! Usage records are keyed by the query text that was typed when an entry
//! was activated, then by the entry identifier. Rounds read them
//! concurrently; activation is the single writer.

use crate::error::{Result, SiftError};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name used under the user cache directory.
pub const HISTORY_FILE_NAME: &str = "history.json";

/// Which stored query keys contribute usage for the current query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMatch {
    /// The stored key is a prefix of the current query ("fi" counts for "fir").
    #[default]
    KeyIsPrefix,
    /// The current query is a prefix of the stored key ("firefox" counts for "fi").
    QueryIsPrefix,
    /// Only the exact query counts.
    Exact,
}

impl HistoryMatch {
    /// Whether `key` counts for `text`. An empty query accepts every key.
    pub fn matches(&self, key: &str, text: &str) -> bool {
        if text.is_empty() {
            return true;
        }

        match self {
            HistoryMatch::KeyIsPrefix => text.starts_with(key),
            HistoryMatch::QueryIsPrefix => key.starts_with(text),
            HistoryMatch::Exact => key == text,
        }
    }
}

/// Usage of one entry under one query key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Provider that owned the entry when it was last activated.
    #[serde(default)]
    pub provider: String,
    pub used: u32,
    pub last_used: DateTime<Utc>,
    /// Whole days between `last_used` and the time of the lookup.
    #[serde(skip)]
    pub days_since_used: i64,
}

impl UsageRecord {
    fn with_days(&self, now: DateTime<Utc>) -> Self {
        Self {
            days_since_used: (now - self.last_used).num_days().max(0),
            ..self.clone()
        }
    }
}

/// A term typed before activating an entry, used for inline suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputTerm {
    pub term: String,
    pub identifier: String,
    pub last_used: DateTime<Utc>,
}

/// Lookup/save interface the engine consumes.
pub trait HistoryStore: Send + Sync {
    /// All usage records for `identifier`, paired with their query key.
    fn usages(&self, identifier: &str) -> Vec<(String, UsageRecord)>;

    /// Most recently used record of `identifier` whose key counts for `text`.
    fn usage_for(&self, text: &str, identifier: &str, policy: HistoryMatch) -> Option<UsageRecord> {
        self.usages(identifier)
            .into_iter()
            .filter(|(key, _)| policy.matches(key, text))
            .map(|(_, record)| record)
            .max_by_key(|record| record.last_used)
    }

    /// Record that `identifier` was activated after typing `text`.
    fn record_activation(&self, provider: &str, text: &str, identifier: &str) -> Result<()>;

    /// Terms previously typed for `provider`.
    fn input_history(&self, provider: &str) -> Vec<InputTerm>;

    /// Remember `term` as typed for `provider` before activating `identifier`.
    fn save_input(&self, provider: &str, term: &str, identifier: &str) -> Result<()>;

    /// Forget everything.
    fn reset(&self) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryData {
    #[serde(default)]
    usage: BTreeMap<String, BTreeMap<String, UsageRecord>>,
    #[serde(default)]
    inputs: HashMap<String, Vec<InputTerm>>,
}

/// In-memory history, optionally persisted as JSON.
#[derive(Debug, Default)]
pub struct UsageHistory {
    data: RwLock<HistoryData>,
    path: Option<PathBuf>,
}

impl UsageHistory {
    /// History that lives only for this process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open history persisted at `path`; a missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| {
                SiftError::History(format!("failed to parse {}: {}", path.display(), e))
            })?
        } else {
            debug!("No history at {}, starting empty", path.display());
            HistoryData::default()
        };

        Ok(Self {
            data: RwLock::new(data),
            path: Some(path),
        })
    }

    /// Default location under the user cache directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("sift").join(HISTORY_FILE_NAME))
    }

    /// Path this history persists to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert a usage record directly.
    pub fn insert_usage(&self, key: &str, identifier: &str, record: UsageRecord) {
        self.data
            .write()
            .usage
            .entry(key.to_string())
            .or_default()
            .insert(identifier.to_string(), record);
    }

    fn persist(&self, data: &HistoryData) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(data)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }
}

impl HistoryStore for UsageHistory {
    fn usages(&self, identifier: &str) -> Vec<(String, UsageRecord)> {
        let now = Utc::now();
        let data = self.data.read();

        data.usage
            .iter()
            .filter_map(|(key, records)| {
                records
                    .get(identifier)
                    .map(|record| (key.clone(), record.with_days(now)))
            })
            .collect()
    }

    fn record_activation(&self, provider: &str, text: &str, identifier: &str) -> Result<()> {
        let mut data = self.data.write();
        let record = data
            .usage
            .entry(text.to_string())
            .or_default()
            .entry(identifier.to_string())
            .or_insert_with(|| UsageRecord {
                provider: provider.to_string(),
                used: 0,
                last_used: Utc::now(),
                days_since_used: 0,
            });

        record.used += 1;
        record.last_used = Utc::now();
        record.provider = provider.to_string();

        debug!(provider, identifier, used = record.used, "Recorded activation");

        self.persist(&data)
    }

    fn input_history(&self, provider: &str) -> Vec<InputTerm> {
        self.data
            .read()
            .inputs
            .get(provider)
            .cloned()
            .unwrap_or_default()
    }

    fn save_input(&self, provider: &str, term: &str, identifier: &str) -> Result<()> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(());
        }

        let mut data = self.data.write();
        let terms = data.inputs.entry(provider.to_string()).or_default();

        match terms.iter_mut().find(|t| t.term == term) {
            Some(existing) => {
                existing.identifier = identifier.to_string();
                existing.last_used = Utc::now();
            }
            None => terms.push(InputTerm {
                term: term.to_string(),
                identifier: identifier.to_string(),
                last_used: Utc::now(),
            }),
        }

        self.persist(&data)
    }

    fn reset(&self) -> Result<()> {
        let mut data = self.data.write();
        *data = HistoryData::default();

        if let Some(ref path) = self.path {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }

        Ok(())
    }
}
