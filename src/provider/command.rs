//! Entries printed by an external command.
//!
//! The configured command line runs through `sh -c` on every round with
//! `%TERM%` replaced by the shell-quoted query. Each output line becomes
//! an entry: lines holding a JSON object are decoded as entries, anything
//! else becomes a plain entry whose command comes from the `exec`
//! template (`%RESULT%` is replaced by the quoted line).

use crate::config::ProviderConfig;
use crate::error::{Result, SiftError};
use crate::models::{Entry, MatchingMode};
use crate::provider::{shell_quote, Provider, ProviderMetadata, QUERY_PLACEHOLDER, RESULT_PLACEHOLDER};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

pub struct CommandProvider {
    metadata: ProviderMetadata,
    cmd: String,
    exec: Option<String>,
    matching: MatchingMode,
}

impl CommandProvider {
    pub fn new(metadata: ProviderMetadata, cmd: impl Into<String>) -> Self {
        Self {
            metadata,
            cmd: cmd.into(),
            exec: None,
            matching: MatchingMode::default(),
        }
    }

    pub fn with_exec(mut self, exec: impl Into<String>) -> Self {
        self.exec = Some(exec.into());
        self
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let metadata = ProviderMetadata::from_config(config)?;

        let cmd = config
            .cmd
            .as_deref()
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
            .ok_or_else(|| {
                SiftError::ConfigurationGap(format!("provider '{}' has no cmd", config.name))
            })?;

        Ok(Self {
            metadata,
            cmd: cmd.to_string(),
            exec: config.exec.clone().filter(|exec| !exec.trim().is_empty()),
            matching: config.matching,
        })
    }

    /// The command line for `text`.
    pub fn command_line(&self, text: &str) -> String {
        self.cmd.replace(QUERY_PLACEHOLDER, &shell_quote(text))
    }

    /// Turn command output into entries.
    pub fn parse_output(&self, output: &str) -> Vec<Entry> {
        let mut entries = Vec::new();

        for line in output.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut entry = if line.starts_with('{') {
                match serde_json::from_str::<Entry>(line) {
                    Ok(entry) => entry,
                    Err(e) => {
                        debug!(provider = %self.metadata.name, error = %e, "Skipping malformed line");
                        continue;
                    }
                }
            } else {
                self.plain_entry(line)
            };

            if entry.matching == MatchingMode::Fuzzy {
                entry.matching = self.matching;
            }
            entries.push(entry);
        }

        entries
    }

    fn plain_entry(&self, line: &str) -> Entry {
        let mut entry = Entry::new(line);
        if let Some(exec) = &self.exec {
            entry.exec = exec.replace(RESULT_PLACEHOLDER, &shell_quote(line));
        }
        entry
    }
}

#[async_trait]
impl Provider for CommandProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn entries(&self, text: &str) -> Result<Vec<Entry>> {
        let command_line = self.command_line(text);
        debug!(provider = %self.metadata.name, command = %command_line, "Running command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&command_line)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                SiftError::provider(&self.metadata.name, format!("failed to run '{}': {}", self.cmd, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SiftError::provider(
                &self.metadata.name,
                format!("'{}' exited with {}: {}", self.cmd, output.status, stderr.trim()),
            ));
        }

        Ok(self.parse_output(&String::from_utf8_lossy(&output.stdout)))
    }
}
