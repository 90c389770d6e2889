//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// sift - concurrent query engine for keyboard launchers
///
/// Fans each query out to the configured providers, ranks the merged
/// results by fuzzy match quality and usage history, and prints the
/// newest round.
///
/// Examples:
///   sift --query fire
///   sift --query f --query fi --query fir --format json
///   sift --provider bookmarks --query rust --activate 1
///   printf 'fi\nfir\n' | sift
///   sift --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for sift.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "SIFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Query to run (repeatable)
    ///
    /// Each query starts a round; rounds are started back to back, so
    /// only the last one publishes. Without --query, queries are read
    /// from stdin, one per line.
    #[arg(long, value_name = "TEXT")]
    pub query: Vec<String>,

    /// Restrict the session to these providers (repeatable)
    ///
    /// Pinned providers receive the query as typed; prefixes are not applied.
    #[arg(short, long, value_name = "NAME")]
    pub provider: Vec<String>,

    /// Maximum number of entries per round
    #[arg(long, value_name = "COUNT")]
    pub max_entries: Option<usize>,

    /// Output format (plain, json)
    #[arg(long, default_value = "plain", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Usage history file
    ///
    /// Defaults to history.json under the user cache directory.
    #[arg(long, value_name = "FILE", env = "SIFT_HISTORY")]
    pub history_file: Option<PathBuf>,

    /// Keep usage history in memory only
    #[arg(long, conflicts_with = "history_file")]
    pub no_history: bool,

    /// End the session after this many idle seconds (0 disables)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Activate the N-th entry of the last published round
    ///
    /// Records the activation in history and prints the command line to run.
    /// Counts past the end wrap around when `list.cycle` is set.
    #[arg(long, value_name = "N")]
    pub activate: Option<usize>,

    /// Use the entry's alternate command when activating
    #[arg(long, requires = "activate")]
    pub alt: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default sift.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for published rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Numbered plain-text list (default)
    #[default]
    Plain,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.max_entries == Some(0) {
            return Err("Max entries must be at least 1".to_string());
        }

        // Entries are numbered from 1
        if self.activate == Some(0) {
            return Err("--activate counts from 1".to_string());
        }

        if let Some(name) = self.provider.iter().find(|name| name.trim().is_empty()) {
            return Err(format!("Invalid provider name: '{}'", name));
        }

        // Validate config file if provided
        if let Some(ref config_path) = self.config {
            if !config_path.is_file() {
                return Err(format!(
                    "Config file does not exist: {}",
                    config_path.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        }
    }

    /// Whether queries come from stdin rather than --query.
    pub fn reads_stdin(&self) -> bool {
        self.query.is_empty()
    }
}
