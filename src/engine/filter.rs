//! Per-entry filtering before scoring.

use crate::error::{Result, SiftError};
use crate::models::Entry;
use crate::provider::ProviderMetadata;
use regex::Regex;

/// Which entry fields a blacklist rule tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistTarget {
    Both,
    Label,
    Sub,
}

/// A compiled blacklist rule.
#[derive(Debug, Clone)]
pub struct BlacklistRule {
    pattern: Regex,
    target: BlacklistTarget,
}

impl BlacklistRule {
    /// Compile a rule. Neither or both flags set means both fields are tested.
    pub fn new(pattern: &str, label: bool, sub: bool) -> Result<Self> {
        let compiled = Regex::new(pattern).map_err(|source| SiftError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let target = match (label, sub) {
            (true, false) => BlacklistTarget::Label,
            (false, true) => BlacklistTarget::Sub,
            _ => BlacklistTarget::Both,
        };

        Ok(Self {
            pattern: compiled,
            target,
        })
    }

    pub fn target(&self) -> BlacklistTarget {
        self.target
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        match self.target {
            BlacklistTarget::Label => self.pattern.is_match(&entry.label),
            BlacklistTarget::Sub => self.pattern.is_match(&entry.sub),
            BlacklistTarget::Both => {
                self.pattern.is_match(&entry.label) || self.pattern.is_match(&entry.sub)
            }
        }
    }
}

/// Whether a raw entry may proceed to scoring.
pub fn admit(entry: &Entry, rules: &[BlacklistRule], single_provider: bool) -> bool {
    if rules.iter().any(|rule| rule.matches(entry)) {
        return false;
    }

    !entry.single_provider_only || single_provider
}

/// Stamp the owning provider onto an entry.
pub fn stamp(entry: &mut Entry, metadata: &ProviderMetadata) {
    entry.provider = metadata.name.clone();
    entry.weight = metadata.weight;
    entry.history |= metadata.history;
}

/// Drop blacklisted and out-of-mode entries, stamping the survivors.
pub fn filter_entries(
    entries: Vec<Entry>,
    metadata: &ProviderMetadata,
    single_provider: bool,
) -> Vec<Entry> {
    entries
        .into_iter()
        .filter(|entry| admit(entry, &metadata.blacklist, single_provider))
        .map(|mut entry| {
            stamp(&mut entry, metadata);
            entry
        })
        .collect()
}
