//! Query sessions.
//!
//! A `Session` owns the provider registry, the settings snapshot, the
//! history store and the presentation channel. Every input change starts
//! a round on the tokio runtime; rounds overlap freely and only the newest
//! one publishes.

use crate::config::Config;
use crate::engine::aggregator::{self, Finalize};
use crate::engine::fanout::{self, RoundContext};
use crate::engine::filter;
use crate::engine::router::{self, SessionMode};
use crate::engine::scoring;
use crate::engine::staleness::{Round, StalenessController};
use crate::error::{Result, SiftError};
use crate::history::HistoryStore;
use crate::models::Entry;
use crate::presentation::{self, EventReceiver, EventSender, ExitReason, PresentationEvent, RoundResults};
use crate::provider::Registry;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What activating an entry should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    /// Full command line, with launch prefix and terminal applied.
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

/// Ends the session after a period without state-changing events.
pub struct InactivityTimer {
    timeout: Duration,
    deadline: watch::Sender<Instant>,
    task: JoinHandle<()>,
}

impl InactivityTimer {
    /// Start the timer. Must be called from within a tokio runtime.
    pub fn start(timeout: Duration, events: EventSender) -> Self {
        let (deadline, mut next_deadline) = watch::channel(Instant::now() + timeout);

        let task = tokio::spawn(async move {
            loop {
                let current = *next_deadline.borrow_and_update();

                tokio::select! {
                    _ = tokio::time::sleep_until(current) => {
                        info!(timeout_secs = timeout.as_secs(), "Session timed out");
                        let _ = events.send(PresentationEvent::SessionExit(ExitReason::Timeout));
                        break;
                    }
                    changed = next_deadline.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            timeout,
            deadline,
            task,
        }
    }

    /// Push the deadline out by the full timeout.
    pub fn reset(&self) {
        let _ = self.deadline.send(Instant::now() + self.timeout);
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for InactivityTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Inner {
    registry: Registry,
    context: RoundContext,
    staleness: StalenessController,
    mode: RwLock<SessionMode>,
    events: EventSender,
    timer: Option<InactivityTimer>,
}

/// A running query session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Create a session and the receiving end of its presentation channel.
    ///
    /// When `session.timeout_secs` is set the inactivity timer is started,
    /// which requires a tokio runtime.
    pub fn new(
        registry: Registry,
        config: Config,
        history: Arc<dyn HistoryStore>,
    ) -> (Self, EventReceiver) {
        let (events, receiver) = presentation::channel();

        let timer = (config.session.timeout_secs > 0).then(|| {
            InactivityTimer::start(
                Duration::from_secs(config.session.timeout_secs),
                events.clone(),
            )
        });

        let session = Self {
            inner: Arc::new(Inner {
                registry,
                context: RoundContext::new(Arc::new(config), history),
                staleness: StalenessController::new(),
                mode: RwLock::new(SessionMode::Free),
                events,
                timer,
            }),
        };

        (session, receiver)
    }

    pub fn config(&self) -> &Config {
        &self.inner.context.config
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn mode(&self) -> SessionMode {
        self.inner.mode.read().clone()
    }

    /// Start a round for `text`.
    ///
    /// The round's generation is taken before this returns, so calls made
    /// in sequence supersede each other in that order. The handle yields
    /// the published results, or `None` if the round went stale.
    pub fn query(&self, text: &str) -> JoinHandle<Option<RoundResults>> {
        let round = self.inner.staleness.begin(text);
        let session = self.clone();
        tokio::spawn(async move { session.run_round(round).await })
    }

    async fn run_round(&self, round: Round) -> Option<RoundResults> {
        self.send(PresentationEvent::RoundBegin {
            generation: round.generation,
            query: round.text.clone(),
        });
        self.touch();

        let config = &self.inner.context.config;
        let mode = self.mode();

        let (entries, placeholder) = if round.text.is_empty()
            && config.list.show_initial_entries
            && mode == SessionMode::Free
        {
            let placeholder = self
                .inner
                .registry
                .find(&config.list.initial_provider)
                .and_then(|(_, handle)| router::non_empty(&handle.metadata().placeholder))
                .map(String::from);
            (self.initial_entries().await, placeholder)
        } else {
            let plan = router::route(&self.inner.registry, &round.text, &mode, config.list.keep_sort);
            debug!(
                generation = round.generation,
                providers = ?plan.provider_names(),
                "Routed query"
            );

            let history = self.inner.context.history.as_ref();
            if let Some(suggestion) = fanout::typeahead(&plan, &round.text, history) {
                if self.inner.staleness.is_current(&round) {
                    self.send(PresentationEvent::Typeahead {
                        generation: round.generation,
                        suggestion,
                    });
                }
            }

            let contributions = fanout::run(&plan, &self.inner.context).await;
            let entries = aggregator::finalize(
                contributions,
                Finalize {
                    keep_sort: plan.keep_sort,
                    text_is_empty: round.text.is_empty(),
                    max_entries: config.max_entries(),
                },
            );
            (entries, plan.placeholder().map(String::from))
        };

        let results = RoundResults {
            generation: round.generation,
            query: round.text.clone(),
            entries,
            placeholder,
            elapsed: round.elapsed(),
        };

        let published = self.inner.staleness.publish_if_current(&round, || {
            if config.search.debug {
                for entry in &results.entries {
                    debug!(label = %entry.label, sub = %entry.sub, score = entry.score_final, "Published entry");
                }
            }
            debug!(
                generation = round.generation,
                elapsed_ms = results.elapsed.as_millis() as u64,
                "{}",
                aggregator::summary_text(&results.entries)
            );
            self.send(PresentationEvent::Results(results.clone()));
        });

        if published {
            Some(results)
        } else {
            debug!(generation = round.generation, query = %round.text, "Discarding stale round");
            None
        }
    }

    /// Entries of the initial provider ranked by usage alone.
    pub async fn initial_entries(&self) -> Vec<Entry> {
        let config = &self.inner.context.config;
        let name = config.list.initial_provider.as_str();

        let Some((_, handle)) = self.inner.registry.find(name) else {
            warn!(provider = %name, "Initial provider is not registered");
            return Vec::new();
        };

        handle.ensure_setup(config).await;
        let raw = match AssertUnwindSafe(handle.entries("")).catch_unwind().await {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                warn!(provider = %name, error = %e, "Initial listing failed");
                return Vec::new();
            }
            Err(payload) => {
                warn!(
                    provider = %name,
                    reason = %fanout::panic_message(payload.as_ref()),
                    "Initial provider panicked"
                );
                return Vec::new();
            }
        };

        let metadata = handle.metadata();
        let history = self.inner.context.history.as_ref();
        let policy = config.search.history_match;

        let mut entries: Vec<Entry> = filter::filter_entries(raw, metadata, true)
            .into_iter()
            .map(|mut entry| {
                entry.score_final = if metadata.history {
                    scoring::history_boost(&entry, "", history, policy)
                } else {
                    0.0
                };
                entry
            })
            .collect();

        aggregator::sort_by_score(&mut entries);
        entries.truncate(config.max_entries());
        entries
    }

    /// Restrict the session to `name`, in addition to any provider already pinned.
    pub fn pin(&self, name: &str) -> Result<()> {
        self.inner.registry.require(name)?;

        let mut mode = self.inner.mode.write();
        match &mut *mode {
            SessionMode::Pinned(names) => {
                if !names.iter().any(|pinned| pinned == name) {
                    names.push(name.to_string());
                }
            }
            SessionMode::Free => *mode = SessionMode::Pinned(vec![name.to_string()]),
        }
        drop(mode);

        info!(provider = %name, "Pinned provider");
        self.touch();
        Ok(())
    }

    /// Back to free search across all providers.
    pub fn unpin(&self) {
        *self.inner.mode.write() = SessionMode::Free;
        self.touch();
    }

    /// Build the invocation for `entry` and record the activation.
    ///
    /// `text` is the raw input the entry was found with. Nothing is
    /// recorded when the entry cannot be launched.
    pub fn activate(&self, entry: &Entry, text: &str, alternate: bool) -> Result<Invocation> {
        let config = &self.inner.context.config;

        let command = if alternate {
            entry
                .exec_alt
                .as_deref()
                .filter(|alt| !alt.trim().is_empty())
                .unwrap_or(entry.exec.as_str())
        } else {
            entry.exec.as_str()
        };
        let command = command.trim();

        if command.is_empty() {
            return Err(SiftError::ConfigurationGap(format!(
                "'{}' has nothing to execute",
                entry.label
            )));
        }

        let mut command_line = command.to_string();
        if entry.terminal {
            if config.terminal.trim().is_empty() {
                return Err(SiftError::ConfigurationGap(format!(
                    "'{}' needs a terminal but none is configured",
                    entry.label
                )));
            }
            command_line = format!("{} -e {}", config.terminal.trim(), command_line);
        }

        if !config.launch_prefix.trim().is_empty() {
            command_line = format!("{} {}", config.launch_prefix.trim(), command_line);
        }

        self.remember(entry, text);

        info!(provider = %entry.provider, label = %entry.label, "Activated entry");
        self.send(PresentationEvent::ItemActivated {
            provider: entry.provider.clone(),
            label: entry.label.clone(),
        });
        self.touch();

        Ok(Invocation {
            command: command_line,
            working_dir: entry
                .path
                .as_deref()
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        })
    }

    fn remember(&self, entry: &Entry, text: &str) {
        let history = self.inner.context.history.as_ref();
        let metadata = self
            .inner
            .registry
            .find(&entry.provider)
            .map(|(_, handle)| handle.metadata());
        let identifier = entry.identifier();

        let routed = metadata
            .filter(|metadata| !metadata.prefix.is_empty())
            .and_then(|metadata| text.strip_prefix(metadata.prefix.as_str()))
            .unwrap_or(text)
            .trim();

        if entry.history {
            if let Err(e) = history.record_activation(&entry.provider, routed, &identifier) {
                warn!(provider = %entry.provider, error = %e, "Failed to record usage");
            }
        }

        let saves_input = metadata.is_some_and(|metadata| metadata.history || metadata.typeahead);
        let typed = text.trim();
        if saves_input && !typed.is_empty() {
            if let Err(e) = history.save_input(&entry.provider, typed, &identifier) {
                warn!(provider = %entry.provider, error = %e, "Failed to save input history");
            }
        }
    }

    /// End the session: clean up providers in the background and notify
    /// the presentation layer.
    pub fn end(&self) {
        for handle in self.inner.registry.handles() {
            let handle = Arc::clone(handle);
            tokio::spawn(async move {
                handle.cleanup().await;
            });
        }

        if let Some(timer) = &self.inner.timer {
            timer.stop();
        }

        self.send(PresentationEvent::SessionExit(ExitReason::Closed));
    }

    fn touch(&self) {
        if let Some(timer) = &self.inner.timer {
            timer.reset();
        }
    }

    fn send(&self, event: PresentationEvent) {
        if self.inner.events.send(event).is_err() {
            debug!("Presentation consumer is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderConfig, ProviderKind};
    use crate::error::Result;
    use crate::history::UsageHistory;
    use crate::provider::{Provider, ProviderMetadata};
    use async_trait::async_trait;

    /// Sleeps longer for shorter queries so older rounds finish last.
    struct Laggy(ProviderMetadata);

    #[async_trait]
    impl Provider for Laggy {
        fn metadata(&self) -> &ProviderMetadata {
            &self.0
        }

        async fn entries(&self, text: &str) -> Result<Vec<Entry>> {
            let delay = 60u64.saturating_sub(20 * text.len() as u64);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(vec![Entry::new("Firefox"), Entry::new("Files")])
        }
    }

    struct Exploding(ProviderMetadata);

    #[async_trait]
    impl Provider for Exploding {
        fn metadata(&self) -> &ProviderMetadata {
            &self.0
        }

        async fn entries(&self, _text: &str) -> Result<Vec<Entry>> {
            panic!("provider exploded")
        }
    }

    fn launcher_config() -> Config {
        let mut config = Config::default();
        config.terminal = "foot".to_string();

        let mut applications = ProviderConfig::new("applications", ProviderKind::List);
        applications.history = true;
        applications.typeahead = true;
        applications.entries = vec![
            Entry::new("Firefox").with_sub("Web Browser").with_exec("firefox"),
            Entry::new("Files").with_exec("nautilus"),
            Entry::new("htop").with_exec("htop"),
        ];
        applications.entries[2].terminal = true;

        let mut bookmarks = ProviderConfig::new("bookmarks", ProviderKind::List);
        bookmarks.prefix = "b".to_string();
        bookmarks.entries = vec![Entry::new("Rust docs").with_exec("xdg-open https://doc.rust-lang.org")];

        config.providers = vec![applications, bookmarks];
        config
    }

    fn session(config: Config) -> (Session, EventReceiver, Arc<UsageHistory>) {
        let history = Arc::new(UsageHistory::in_memory());
        let registry = Registry::from_config(&config).unwrap();
        let (session, events) = Session::new(registry, config, history.clone());
        (session, events, history)
    }

    fn labels(results: &RoundResults) -> Vec<&str> {
        results.entries.iter().map(|e| e.label.as_str()).collect()
    }

    #[tokio::test]
    async fn test_query_publishes_results() {
        let (session, mut events, _) = session(launcher_config());

        let results = session.query("ffx").await.unwrap().unwrap();
        assert_eq!(labels(&results), vec!["Firefox"]);

        assert!(matches!(
            events.recv().await,
            Some(PresentationEvent::RoundBegin { generation: 1, .. })
        ));
        match events.recv().await {
            Some(PresentationEvent::Results(published)) => assert_eq!(published.generation, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_newer_round_supersedes_older() {
        let mut registry = Registry::new();
        registry.register(Arc::new(Laggy(ProviderMetadata::new("applications"))));
        let (session, mut events) =
            Session::new(registry, Config::default(), Arc::new(UsageHistory::in_memory()));

        let older = session.query("fi");
        let newer = session.query("fir");

        let newer = newer.await.unwrap();
        let older = older.await.unwrap();

        assert!(older.is_none());
        assert_eq!(newer.unwrap().query, "fir");

        events.close();
        let mut published = Vec::new();
        while let Some(event) = events.recv().await {
            if let PresentationEvent::Results(results) = event {
                published.push(results.query);
            }
        }
        assert_eq!(published, vec!["fir".to_string()]);
    }

    #[tokio::test]
    async fn test_prefixed_query_reaches_bookmarks_only() {
        let (session, _events, _) = session(launcher_config());

        let results = session.query("brust").await.unwrap().unwrap();
        assert_eq!(labels(&results), vec!["Rust docs"]);
        assert!(results.entries.iter().all(|e| e.provider == "bookmarks"));
    }

    #[tokio::test]
    async fn test_activation_builds_invocation() {
        let mut config = launcher_config();
        config.launch_prefix = "uwsm app --".to_string();
        let (session, _events, history) = session(config);

        let results = session.query("htop").await.unwrap().unwrap();
        let invocation = session.activate(&results.entries[0], "htop", false).unwrap();
        assert_eq!(invocation.command, "uwsm app -- foot -e htop");

        let usages = history.usages(&results.entries[0].identifier());
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].0, "htop");
        assert_eq!(history.input_history("applications")[0].term, "htop");
    }

    #[tokio::test]
    async fn test_activation_configuration_gaps() {
        let mut config = launcher_config();
        config.terminal.clear();
        let (session, _events, history) = session(config);

        let mut htop = Entry::new("htop").with_exec("htop");
        htop.terminal = true;
        htop.provider = "applications".to_string();
        htop.history = true;

        assert!(matches!(
            session.activate(&htop, "htop", false),
            Err(SiftError::ConfigurationGap(_))
        ));
        assert!(matches!(
            session.activate(&Entry::new("nothing"), "no", false),
            Err(SiftError::ConfigurationGap(_))
        ));
        assert!(history.usages(&htop.identifier()).is_empty());
    }

    #[tokio::test]
    async fn test_alternate_command() {
        let (session, _events, _) = session(launcher_config());

        let mut entry = Entry::new("Firefox").with_exec("firefox");
        entry.exec_alt = Some("firefox --private-window".to_string());
        entry.path = Some("/tmp".to_string());

        let invocation = session.activate(&entry, "", true).unwrap();
        assert_eq!(invocation.command, "firefox --private-window");
        assert_eq!(invocation.working_dir, Some(PathBuf::from("/tmp")));
    }

    #[tokio::test]
    async fn test_activation_boosts_later_rounds() {
        let (session, _events, _) = session(launcher_config());

        let before = session.query("fi").await.unwrap().unwrap();
        let files = before
            .entries
            .iter()
            .find(|e| e.label == "Files")
            .cloned()
            .unwrap();
        session.activate(&files, "fi", false).unwrap();

        let after = session.query("fi").await.unwrap().unwrap();
        assert_eq!(after.entries[0].label, "Files");
    }

    #[tokio::test]
    async fn test_initial_listing_ranks_by_usage() {
        let mut config = launcher_config();
        config.list.show_initial_entries = true;
        let (session, _events, history) = session(config);

        history
            .record_activation("applications", "ht", "htop")
            .unwrap();

        let results = session.query("").await.unwrap().unwrap();
        assert_eq!(results.entries.len(), 3);
        assert_eq!(results.entries[0].label, "htop");
    }

    #[tokio::test]
    async fn test_initial_listing_survives_panicking_provider() {
        let mut config = Config::default();
        config.list.show_initial_entries = true;

        let mut registry = Registry::new();
        registry.register(Arc::new(Exploding(ProviderMetadata::new("applications"))));
        let (session, mut events) =
            Session::new(registry, config, Arc::new(UsageHistory::in_memory()));

        let results = session.query("").await.unwrap().unwrap();
        assert!(results.entries.is_empty());

        events.close();
        let mut published = 0;
        while let Some(event) = events.recv().await {
            if let PresentationEvent::Results(results) = event {
                assert!(results.entries.is_empty());
                published += 1;
            }
        }
        assert_eq!(published, 1);
    }

    #[tokio::test]
    async fn test_initial_listing_ignores_usage_without_history() {
        let mut config = launcher_config();
        config.list.show_initial_entries = true;
        config.providers[0].history = false;
        let (session, _events, history) = session(config);

        history
            .record_activation("applications", "ht", "htop")
            .unwrap();

        let results = session.query("").await.unwrap().unwrap();
        assert_eq!(labels(&results), vec!["Firefox", "Files", "htop"]);
        assert!(results.entries.iter().all(|e| e.score_final == 0.0));
    }

    #[tokio::test]
    async fn test_single_provider_placeholder() {
        let mut config = launcher_config();
        config.providers[1].placeholder = "No bookmarks".to_string();
        let (session, _events, _) = session(config);

        let results = session.query("bzzz").await.unwrap().unwrap();
        assert!(results.entries.is_empty());
        assert_eq!(results.placeholder.as_deref(), Some("No bookmarks"));

        let results = session.query("zzz").await.unwrap().unwrap();
        assert_eq!(results.placeholder, None);
    }

    #[tokio::test]
    async fn test_typeahead_event() {
        let (session, mut events, history) = session(launcher_config());
        history
            .save_input("applications", "firefox", "FirefoxWeb Browser")
            .unwrap();

        session.query("fire").await.unwrap();

        let mut suggestion = None;
        events.close();
        while let Some(event) = events.recv().await {
            if let PresentationEvent::Typeahead { suggestion: s, .. } = event {
                suggestion = Some(s);
            }
        }
        assert_eq!(suggestion.as_deref(), Some("firefox"));
    }

    #[tokio::test]
    async fn test_pin_and_unpin() {
        let (session, _events, _) = session(launcher_config());

        assert!(matches!(
            session.pin("missing"),
            Err(SiftError::UnknownProvider(_))
        ));

        session.pin("bookmarks").unwrap();
        assert_eq!(session.mode(), SessionMode::Pinned(vec!["bookmarks".to_string()]));

        let results = session.query("rust").await.unwrap().unwrap();
        assert_eq!(labels(&results), vec!["Rust docs"]);

        session.unpin();
        assert_eq!(session.mode(), SessionMode::Free);
        let results = session.query("rust").await.unwrap().unwrap();
        assert!(results.entries.is_empty());
    }

    #[tokio::test]
    async fn test_end_notifies_presentation() {
        let (session, mut events, _) = session(launcher_config());
        session.end();

        assert!(matches!(
            events.recv().await,
            Some(PresentationEvent::SessionExit(ExitReason::Closed))
        ));
    }

    #[tokio::test]
    async fn test_inactivity_timer_fires() {
        let (sender, mut receiver) = presentation::channel();
        let timer = InactivityTimer::start(Duration::from_millis(30), sender);

        tokio::time::sleep(Duration::from_millis(15)).await;
        timer.reset();

        let event = tokio::time::timeout(Duration::from_secs(2), receiver.recv())
            .await
            .unwrap();
        assert!(matches!(
            event,
            Some(PresentationEvent::SessionExit(ExitReason::Timeout))
        ));
    }
}
