//! Static entries declared in the configuration.

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::models::{Entry, MatchingMode};
use crate::provider::{Provider, ProviderMetadata};
use async_trait::async_trait;

/// Serves a fixed list of entries on every round.
pub struct ListProvider {
    metadata: ProviderMetadata,
    entries: Vec<Entry>,
}

impl ListProvider {
    pub fn new(metadata: ProviderMetadata, entries: Vec<Entry>) -> Self {
        Self { metadata, entries }
    }

    /// Build from a provider definition. Entries left on the default
    /// matching mode take the provider's mode.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let metadata = ProviderMetadata::from_config(config)?;
        let entries = config
            .entries
            .iter()
            .cloned()
            .map(|mut entry| {
                if entry.matching == MatchingMode::Fuzzy {
                    entry.matching = config.matching;
                }
                entry
            })
            .collect();

        Ok(Self::new(metadata, entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Provider for ListProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn entries(&self, _text: &str) -> Result<Vec<Entry>> {
        Ok(self.entries.clone())
    }
}
