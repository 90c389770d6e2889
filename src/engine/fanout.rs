//! Concurrent fan-out to the providers in scope.
//!
//! One tokio task per routed provider. Each task runs the provider's
//! memoized setup, asks it for entries, filters and scores them and
//! appends its contribution to a shared accumulator. The round waits on
//! all tasks before merging. A provider that errors or panics contributes
//! nothing; the other tasks and the round carry on.

use crate::config::Config;
use crate::engine::aggregator::Contribution;
use crate::engine::filter;
use crate::engine::router::{Route, RoutePlan};
use crate::engine::scoring::{self, ScoringOptions};
use crate::history::HistoryStore;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared inputs of every provider task in a round.
#[derive(Clone)]
pub struct RoundContext {
    pub config: Arc<Config>,
    pub history: Arc<dyn HistoryStore>,
    pub options: Arc<ScoringOptions>,
}

impl RoundContext {
    pub fn new(config: Arc<Config>, history: Arc<dyn HistoryStore>) -> Self {
        let options = Arc::new(ScoringOptions::from_config(&config));
        Self {
            config,
            history,
            options,
        }
    }
}

/// Run every routed provider concurrently and collect their contributions.
pub async fn run(plan: &RoutePlan, context: &RoundContext) -> Vec<Contribution> {
    let accumulator = Arc::new(Mutex::new(Vec::with_capacity(plan.routes.len())));

    let tasks: Vec<_> = plan
        .routes
        .iter()
        .map(|route| {
            tokio::spawn(run_provider(
                route.clone(),
                plan.single,
                context.clone(),
                Arc::clone(&accumulator),
            ))
        })
        .collect();

    for (result, route) in join_all(tasks).await.into_iter().zip(&plan.routes) {
        if let Err(e) = result {
            warn!(provider = %route.handle.name(), error = %e, "Provider task aborted");
        }
    }

    let contributions = std::mem::take(&mut *accumulator.lock());
    contributions
}

async fn run_provider(
    route: Route,
    single: bool,
    context: RoundContext,
    accumulator: Arc<Mutex<Vec<Contribution>>>,
) {
    let handle = &route.handle;
    handle.ensure_setup(&context.config).await;

    let raw = match AssertUnwindSafe(handle.entries(&route.text))
        .catch_unwind()
        .await
    {
        Ok(Ok(entries)) => entries,
        Ok(Err(e)) => {
            warn!(provider = %handle.name(), error = %e, "Provider failed, contributing nothing");
            return;
        }
        Err(payload) => {
            warn!(
                provider = %handle.name(),
                reason = %panic_message(payload.as_ref()),
                "Provider panicked, contributing nothing"
            );
            return;
        }
    };

    let metadata = handle.metadata();
    let raw_count = raw.len();
    let mut contribution = Contribution {
        index: route.index,
        ..Default::default()
    };

    for entry in filter::filter_entries(raw, metadata, single) {
        if let Some(scored) = scoring::evaluate(
            entry,
            &route.text,
            metadata.history,
            context.history.as_ref(),
            &context.options,
        ) {
            contribution.prefixed |= scored.prefixed;
            contribution.entries.push(scored.entry);
        }
    }

    debug!(
        provider = %handle.name(),
        raw = raw_count,
        kept = contribution.entries.len(),
        "Provider contributed"
    );

    accumulator.lock().push(contribution);
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Longest remembered term that extends the trimmed input, across the
/// routed providers that offer typeahead.
pub fn typeahead(plan: &RoutePlan, input: &str, history: &dyn HistoryStore) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    plan.routes
        .iter()
        .filter(|route| route.handle.metadata().typeahead)
        .flat_map(|route| history.input_history(route.handle.name()))
        .filter(|term| term.term.starts_with(trimmed) && term.term != trimmed)
        .max_by(|a, b| {
            a.term
                .chars()
                .count()
                .cmp(&b.term.chars().count())
                .then(a.last_used.cmp(&b.last_used))
        })
        .map(|term| term.term)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::router::{self, SessionMode};
    use crate::error::{Result, SiftError};
    use crate::history::UsageHistory;
    use crate::models::Entry;
    use crate::provider::{Provider, ProviderMetadata, Registry};
    use async_trait::async_trait;
    use std::time::Duration;

    enum Behaviour {
        Entries(Vec<&'static str>),
        Fail,
        Panic,
        Slow(Duration, Vec<&'static str>),
    }

    struct Scripted {
        metadata: ProviderMetadata,
        behaviour: Behaviour,
    }

    #[async_trait]
    impl Provider for Scripted {
        fn metadata(&self) -> &ProviderMetadata {
            &self.metadata
        }

        async fn entries(&self, _text: &str) -> Result<Vec<Entry>> {
            let labels = match &self.behaviour {
                Behaviour::Entries(labels) => labels,
                Behaviour::Fail => return Err(SiftError::provider(&self.metadata.name, "boom")),
                Behaviour::Panic => panic!("provider exploded"),
                Behaviour::Slow(delay, labels) => {
                    tokio::time::sleep(*delay).await;
                    labels
                }
            };
            Ok(labels.iter().map(|label| Entry::new(*label)).collect())
        }
    }

    fn registry(providers: Vec<(&str, Behaviour)>) -> Registry {
        let mut registry = Registry::new();
        for (name, behaviour) in providers {
            registry.register(Arc::new(Scripted {
                metadata: ProviderMetadata::new(name),
                behaviour,
            }));
        }
        registry
    }

    fn context() -> RoundContext {
        RoundContext::new(Arc::new(Config::default()), Arc::new(UsageHistory::in_memory()))
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let registry = registry(vec![
            ("failing", Behaviour::Fail),
            ("apps", Behaviour::Entries(vec!["Firefox", "Files"])),
            ("panicking", Behaviour::Panic),
            (
                "slow",
                Behaviour::Slow(Duration::from_millis(20), vec!["Firewall"]),
            ),
        ]);

        let plan = router::route(&registry, "fi", &SessionMode::Free, false);
        assert_eq!(plan.routes.len(), 4);

        let mut contributions = run(&plan, &context()).await;
        contributions.sort_by_key(|c| c.index);

        assert_eq!(contributions.len(), 2);
        assert_eq!(contributions[0].index, 1);
        assert_eq!(contributions[0].entries.len(), 2);
        assert_eq!(contributions[0].entries[0].provider, "apps");
        assert_eq!(contributions[1].entries[0].label, "Firewall");
    }

    #[tokio::test]
    async fn test_total_failure_yields_nothing() {
        let registry = registry(vec![("a", Behaviour::Fail), ("b", Behaviour::Panic)]);
        let plan = router::route(&registry, "x", &SessionMode::Free, false);
        assert!(run(&plan, &context()).await.is_empty());
    }

    #[tokio::test]
    async fn test_non_matching_entries_are_dropped() {
        let registry = registry(vec![("apps", Behaviour::Entries(vec!["Firefox", "Terminal"]))]);
        let plan = router::route(&registry, "term", &SessionMode::Free, false);

        let contributions = run(&plan, &context()).await;
        assert_eq!(contributions[0].entries.len(), 1);
        assert_eq!(contributions[0].entries[0].label, "Terminal");
        assert!(contributions[0].entries[0].score_final > 0.0);
    }

    #[tokio::test]
    async fn test_typeahead_prefers_longest_extension() {
        let mut metadata = ProviderMetadata::new("apps");
        metadata.typeahead = true;
        let mut registry = Registry::new();
        registry.register(Arc::new(Scripted {
            metadata,
            behaviour: Behaviour::Entries(vec![]),
        }));

        let history = UsageHistory::in_memory();
        history.save_input("apps", "fire", "firefox").unwrap();
        history.save_input("apps", "firefox nightly", "nightly").unwrap();
        history.save_input("apps", "files", "files").unwrap();

        let plan = router::route(&registry, "fir", &SessionMode::Free, false);
        assert_eq!(
            typeahead(&plan, " fir ", &history),
            Some("firefox nightly".to_string())
        );
        assert_eq!(typeahead(&plan, "firefox nightly", &history), None);
        assert_eq!(typeahead(&plan, "   ", &history), None);
    }
}
