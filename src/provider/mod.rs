//! Provider capability and registry.
//!
//! A provider is a long-lived source of candidate entries. The engine
//! only ever talks to it through the `Provider` trait: static metadata,
//! a lazy one-time setup, the per-round `entries` call and a best-effort
//! cleanup at session end.

pub mod command;
pub mod finder;
pub mod list;

pub use command::CommandProvider;
pub use finder::FinderProvider;
pub use list::ListProvider;

use crate::config::{Config, ProviderConfig, ProviderKind};
use crate::engine::filter::BlacklistRule;
use crate::error::{Result, SiftError};
use crate::models::Entry;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Replaced by the query in `command` provider command lines.
pub const QUERY_PLACEHOLDER: &str = "%TERM%";
/// Replaced by the emitted value in activation templates.
pub const RESULT_PLACEHOLDER: &str = "%RESULT%";

/// Quote `value` as a single POSIX shell word.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Static description of a provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderMetadata {
    pub name: String,
    /// Routing prefix; empty for providers that take unprefixed queries.
    pub prefix: String,
    /// Minimum routed text length (in characters) before the provider runs.
    pub min_chars: usize,
    pub blacklist: Vec<BlacklistRule>,
    /// Weigh usage history into scores.
    pub history: bool,
    /// Offer inline suggestions from input history.
    pub typeahead: bool,
    /// Only reachable through its prefix or by pinning.
    pub switcher_only: bool,
    /// Keep emission order when it is the only provider in scope.
    pub keep_sort: bool,
    pub weight: i32,
    pub placeholder: String,
}

impl ProviderMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Build metadata from a provider definition, compiling its blacklist.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let blacklist = config
            .blacklist
            .iter()
            .map(|rule| BlacklistRule::new(&rule.regexp, rule.label, rule.sub))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: config.name.clone(),
            prefix: config.prefix.clone(),
            min_chars: config.min_chars,
            blacklist,
            history: config.history,
            typeahead: config.typeahead,
            switcher_only: config.switcher_only,
            keep_sort: config.keep_sort,
            weight: config.weight,
            placeholder: config.placeholder.clone(),
        })
    }
}

/// The capability every provider exposes.
#[async_trait]
pub trait Provider: Send + Sync {
    fn metadata(&self) -> &ProviderMetadata;

    /// Prepare data. Called at most once per process, before the first `entries`.
    async fn setup(&self, _config: &Config) -> Result<()> {
        Ok(())
    }

    /// Candidate entries for the routed query text.
    async fn entries(&self, text: &str) -> Result<Vec<Entry>>;

    /// Release resources at session end. Failures are ignored.
    async fn cleanup(&self) {}
}

/// A registered provider plus its memoized setup state.
pub struct ProviderHandle {
    provider: Arc<dyn Provider>,
    setup: OnceCell<bool>,
}

impl ProviderHandle {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            setup: OnceCell::new(),
        }
    }

    pub fn metadata(&self) -> &ProviderMetadata {
        self.provider.metadata()
    }

    pub fn name(&self) -> &str {
        &self.provider.metadata().name
    }

    /// Whether setup has run (successfully or not).
    pub fn is_setup(&self) -> bool {
        self.setup.initialized()
    }

    /// Run setup once; concurrent callers wait for the first one.
    pub async fn ensure_setup(&self, config: &Config) -> bool {
        *self
            .setup
            .get_or_init(|| async {
                match self.provider.setup(config).await {
                    Ok(()) => {
                        debug!(provider = %self.name(), "Provider set up");
                        true
                    }
                    Err(e) => {
                        warn!(provider = %self.name(), error = %e, "Provider setup failed");
                        false
                    }
                }
            })
            .await
    }

    pub async fn entries(&self, text: &str) -> Result<Vec<Entry>> {
        self.provider.entries(text).await
    }

    pub async fn cleanup(&self) {
        self.provider.cleanup().await
    }
}

/// All registered providers, in registration order.
#[derive(Default)]
pub struct Registry {
    handles: Vec<Arc<ProviderHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the built-in providers described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();

        for provider_config in &config.providers {
            let provider: Arc<dyn Provider> = match provider_config.kind {
                ProviderKind::List => Arc::new(ListProvider::from_config(provider_config)?),
                ProviderKind::Command => Arc::new(CommandProvider::from_config(provider_config)?),
                ProviderKind::Finder => Arc::new(FinderProvider::from_config(provider_config)?),
            };
            registry.register(provider);
        }

        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        debug!(provider = %provider.metadata().name, "Registered provider");
        self.handles.push(Arc::new(ProviderHandle::new(provider)));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn handles(&self) -> &[Arc<ProviderHandle>] {
        &self.handles
    }

    /// Position and handle of the provider called `name`.
    pub fn find(&self, name: &str) -> Option<(usize, &Arc<ProviderHandle>)> {
        self.handles
            .iter()
            .enumerate()
            .find(|(_, handle)| handle.name() == name)
    }

    /// Like `find`, but an unknown name is an error.
    pub fn require(&self, name: &str) -> Result<(usize, &Arc<ProviderHandle>)> {
        self.find(name)
            .ok_or_else(|| SiftError::UnknownProvider(name.to_string()))
    }
}
