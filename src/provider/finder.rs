//! Files below a root directory.
//!
//! The directory is walked once, during setup, and the collected files are
//! served on every round. Hidden names and the configured excludes are
//! skipped along with everything beneath them.

use crate::config::{Config, ProviderConfig};
use crate::error::{Result, SiftError};
use crate::models::{Entry, MatchingMode};
use crate::provider::{shell_quote, Provider, ProviderMetadata, RESULT_PLACEHOLDER};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Activation template used when none is configured.
pub const DEFAULT_OPEN_TEMPLATE: &str = "xdg-open %RESULT%";

/// Walk settings.
#[derive(Debug, Clone)]
pub struct FinderOptions {
    pub root: PathBuf,
    pub excludes: Vec<String>,
    pub max_files: usize,
    pub exec: String,
    pub matching: MatchingMode,
}

pub struct FinderProvider {
    metadata: ProviderMetadata,
    options: FinderOptions,
    files: RwLock<Vec<Entry>>,
}

impl FinderProvider {
    pub fn new(metadata: ProviderMetadata, options: FinderOptions) -> Self {
        Self {
            metadata,
            options,
            files: RwLock::new(Vec::new()),
        }
    }

    /// Build from a provider definition. Without a `root` the home
    /// directory is searched.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let metadata = ProviderMetadata::from_config(config)?;

        let root = match &config.root {
            Some(root) => root.clone(),
            None => dirs::home_dir().ok_or_else(|| {
                SiftError::ConfigurationGap(format!(
                    "provider '{}' has no root and no home directory was found",
                    config.name
                ))
            })?,
        };

        let options = FinderOptions {
            root,
            excludes: config.excludes.clone(),
            max_files: config.max_files,
            exec: config
                .exec
                .clone()
                .filter(|exec| !exec.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_OPEN_TEMPLATE.to_string()),
            matching: config.matching,
        };

        Ok(Self::new(metadata, options))
    }

    pub fn root(&self) -> &Path {
        &self.options.root
    }

    /// Number of files collected by setup.
    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }
}

fn is_excluded(name: &str, excludes: &[String]) -> bool {
    // Hidden files
    if name.starts_with('.') {
        return true;
    }

    excludes.iter().any(|pattern| name == pattern)
}

fn to_entry(file: &DirEntry, options: &FinderOptions) -> Entry {
    let path = file.path();
    let relative = path.strip_prefix(&options.root).unwrap_or(path);
    let parent = relative
        .parent()
        .map(|parent| parent.to_string_lossy().to_string())
        .unwrap_or_default();
    let full = path.to_string_lossy();

    let mut entry = Entry::new(file.file_name().to_string_lossy())
        .with_sub(parent)
        .with_searchable(relative.to_string_lossy());
    entry.exec = options.exec.replace(RESULT_PLACEHOLDER, &shell_quote(&full));
    entry.path = path.parent().map(|dir| dir.to_string_lossy().to_string());
    entry.history_identifier = Some(full.to_string());
    entry.matching = options.matching;
    entry
}

/// Walk `options.root` and collect up to `max_files` files as entries.
pub fn scan(options: &FinderOptions) -> Vec<Entry> {
    WalkDir::new(&options.root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !is_excluded(&entry.file_name().to_string_lossy(), &options.excludes)
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Cannot read {}: {}", options.root.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .take(options.max_files)
        .map(|entry| to_entry(&entry, options))
        .collect()
}

#[async_trait]
impl Provider for FinderProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn setup(&self, _config: &Config) -> Result<()> {
        if !self.options.root.is_dir() {
            return Err(SiftError::ConfigurationGap(format!(
                "finder root is not a directory: {}",
                self.options.root.display()
            )));
        }

        let options = self.options.clone();
        let files = tokio::task::spawn_blocking(move || scan(&options))
            .await
            .map_err(|e| SiftError::provider(&self.metadata.name, e.to_string()))?;

        info!(
            provider = %self.metadata.name,
            files = files.len(),
            "Indexed {}",
            self.options.root.display()
        );
        *self.files.write() = files;
        Ok(())
    }

    async fn entries(&self, _text: &str) -> Result<Vec<Entry>> {
        Ok(self.files.read().clone())
    }

    async fn cleanup(&self) {
        self.files.write().clear();
    }
}
