//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `sift.toml` files. The engine treats the loaded `Config` as an
//! immutable settings snapshot shared across rounds.

use crate::history::HistoryMatch;
use crate::models::{Entry, MatchingMode};
use crate::error::{Result, SiftError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "sift.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Terminal used for entries that ask for one.
    #[serde(default)]
    pub terminal: String,

    /// Prepended to every launched command line.
    #[serde(default)]
    pub launch_prefix: String,

    /// Result list settings.
    #[serde(default)]
    pub list: ListConfig,

    /// Matching and scoring settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Session lifecycle settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Registered providers, in merge order.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// Result list settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConfig {
    /// Maximum number of published entries. Zero means the default.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Entries must score strictly above this with a non-empty query.
    #[serde(default)]
    pub visibility_threshold: f64,

    /// Preserve provider order on empty queries.
    #[serde(default)]
    pub keep_sort: bool,

    /// Wrap selection around the ends of the list.
    #[serde(default)]
    pub cycle: bool,

    /// Show a usage-ranked listing for the empty query.
    #[serde(default)]
    pub show_initial_entries: bool,

    /// Provider whose entries make up the initial listing.
    #[serde(default = "default_initial_provider")]
    pub initial_provider: String,

    /// Hide secondary text when rendering.
    #[serde(default)]
    pub hide_sub: bool,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            visibility_threshold: 0.0,
            keep_sort: false,
            cycle: false,
            show_initial_entries: false,
            initial_provider: default_initial_provider(),
            hide_sub: false,
        }
    }
}

fn default_max_entries() -> usize {
    50
}

fn default_initial_provider() -> String {
    "applications".to_string()
}

/// Matching and scoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Leading marker that switches to literal matching.
    #[serde(default = "default_exact_marker")]
    pub exact_marker: String,

    /// Which stored query keys count for the current query.
    #[serde(default)]
    pub history_match: HistoryMatch,

    /// Only match against labels.
    #[serde(default)]
    pub label_only: bool,

    /// Log every scored and published entry.
    #[serde(default)]
    pub debug: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            exact_marker: default_exact_marker(),
            history_match: HistoryMatch::default(),
            label_only: false,
            debug: false,
        }
    }
}

fn default_exact_marker() -> String {
    "'".to_string()
}

/// Session lifecycle settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// End the session after this many idle seconds. Zero disables the timer.
    #[serde(default)]
    pub timeout_secs: u64,

    /// Where usage history is persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_file: Option<PathBuf>,
}

/// Kind of built-in provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Static entries listed in the configuration.
    #[default]
    List,
    /// Entries printed by an external command.
    Command,
    /// Files below a root directory.
    Finder,
}

/// A blacklist rule as written in the configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlacklistConfig {
    pub regexp: String,
    /// Only test the label.
    #[serde(default)]
    pub label: bool,
    /// Only test the sub text.
    #[serde(default)]
    pub sub: bool,
}

/// Provider definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,

    #[serde(default)]
    pub kind: ProviderKind,

    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub min_chars: usize,

    #[serde(default)]
    pub history: bool,

    #[serde(default)]
    pub typeahead: bool,

    #[serde(default)]
    pub switcher_only: bool,

    #[serde(default)]
    pub keep_sort: bool,

    #[serde(default)]
    pub weight: i32,

    #[serde(default)]
    pub placeholder: String,

    /// Matching mode applied to entries that do not set their own.
    #[serde(default)]
    pub matching: MatchingMode,

    /// Command line for `command` providers; `%TERM%` is replaced by the query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,

    /// Activation template for plain command output; `%RESULT%` is replaced by the line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<String>,

    /// Root directory for `finder` providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Names skipped by `finder` providers.
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,

    /// Upper bound on files collected by `finder` providers.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default)]
    pub blacklist: Vec<BlacklistConfig>,

    /// Entries for `list` providers.
    #[serde(default)]
    pub entries: Vec<Entry>,
}

impl ProviderConfig {
    /// A provider definition with defaults for everything but name and kind.
    pub fn new(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            kind,
            prefix: String::new(),
            min_chars: 0,
            history: false,
            typeahead: false,
            switcher_only: false,
            keep_sort: false,
            weight: 0,
            placeholder: String::new(),
            matching: MatchingMode::default(),
            cmd: None,
            exec: None,
            root: None,
            excludes: default_excludes(),
            max_files: default_max_files(),
            blacklist: Vec::new(),
            entries: Vec::new(),
        }
    }
}

fn default_excludes() -> Vec<String> {
    vec![".git", "target", "node_modules", "__pycache__", ".venv"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_files() -> usize {
    10_000
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SiftError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            SiftError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Effective maximum entry count.
    pub fn max_entries(&self) -> usize {
        if self.list.max_entries == 0 {
            default_max_entries()
        } else {
            self.list.max_entries
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(max_entries) = args.max_entries {
            self.list.max_entries = max_entries;
        }

        if let Some(ref history_file) = args.history_file {
            self.session.history_file = Some(history_file.clone());
        }

        if let Some(timeout) = args.timeout {
            self.session.timeout_secs = timeout;
        }

        if args.verbose {
            self.search.debug = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let mut config = Config::default();

        let mut applications = ProviderConfig::new("applications", ProviderKind::List);
        applications.history = true;
        applications.typeahead = true;
        applications.entries = vec![
            Entry::new("Terminal").with_sub("System").with_exec("x-terminal-emulator"),
            Entry::new("Files").with_sub("File Manager").with_exec("xdg-open ."),
        ];

        let mut runner = ProviderConfig::new("runner", ProviderKind::Command);
        runner.prefix = "!".to_string();
        runner.cmd = Some("ls /usr/bin | grep -F -- %TERM% | head -n 50".to_string());
        runner.exec = Some("%RESULT%".to_string());
        runner.min_chars = 1;

        let mut files = ProviderConfig::new("files", ProviderKind::Finder);
        files.prefix = "~".to_string();
        files.min_chars = 2;
        files.max_files = 5_000;

        config.providers = vec![applications, runner, files];

        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.list.max_entries, 50);
        assert_eq!(config.search.exact_marker, "'");
        assert_eq!(config.list.initial_provider, "applications");
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_zero_max_entries_falls_back() {
        let mut config = Config::default();
        config.list.max_entries = 0;
        assert_eq!(config.max_entries(), 50);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
terminal = "foot"

[list]
max_entries = 20
visibility_threshold = 5.0

[search]
history_match = "query_is_prefix"

[[providers]]
name = "bookmarks"
prefix = "b"
history = true

[[providers.blacklist]]
regexp = "^private"
label = true

[[providers.entries]]
label = "Rust docs"
exec = "xdg-open https://doc.rust-lang.org"

[[providers]]
name = "runner"
kind = "command"
cmd = "compgen -c %TERM%"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.terminal, "foot");
        assert_eq!(config.list.max_entries, 20);
        assert_eq!(config.list.visibility_threshold, 5.0);
        assert_eq!(config.search.history_match, HistoryMatch::QueryIsPrefix);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].prefix, "b");
        assert_eq!(config.providers[0].blacklist[0].regexp, "^private");
        assert_eq!(config.providers[0].entries[0].label, "Rust docs");
        assert_eq!(config.providers[1].kind, ProviderKind::Command);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[list]"));
        assert!(toml_str.contains("[search]"));
        assert!(toml_str.contains("applications"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.providers.len(), 3);
        assert_eq!(parsed.providers[2].kind, ProviderKind::Finder);
    }

    #[test]
    fn test_load_reports_config_errors() {
        let dir = tempfile::TempDir::new().unwrap();

        let missing = dir.path().join("missing.toml");
        let err = Config::load(&missing).unwrap_err();
        assert!(matches!(err, SiftError::Config(_)));
        assert!(err.to_string().contains("failed to read"));

        let broken = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&broken, "[list\nmax_entries = ").unwrap();
        let err = Config::load(&broken).unwrap_err();
        assert!(matches!(err, SiftError::Config(_)));
        assert!(err.to_string().contains("failed to parse"));

        std::fs::write(&broken, "terminal = \"foot\"\n").unwrap();
        assert_eq!(Config::load(&broken).unwrap().terminal, "foot");
    }
}
