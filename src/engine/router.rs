//! Prefix-based provider routing.
//!
//! Decides which providers take part in a round and which text each one
//! receives. A query that starts with some provider's prefix is routed to
//! the prefixed providers only; any other query goes to the unprefixed
//! providers.

use crate::provider::{ProviderHandle, Registry};
use std::sync::Arc;
use tracing::debug;

/// Free search, or search restricted to explicitly chosen providers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionMode {
    #[default]
    Free,
    /// Only these providers participate; prefix routing is bypassed.
    Pinned(Vec<String>),
}

/// One provider in scope and the text it receives.
#[derive(Clone)]
pub struct Route {
    /// Registration index, used as the merge order.
    pub index: usize,
    pub handle: Arc<ProviderHandle>,
    pub text: String,
}

/// Outcome of routing one query.
#[derive(Clone, Default)]
pub struct RoutePlan {
    pub routes: Vec<Route>,
    /// Exactly one provider was in scope before prefix rules.
    pub single: bool,
    /// Preserve provider emission order (honored on empty text only).
    pub keep_sort: bool,
    /// Provider prefixes the query starts with.
    pub prefixes: Vec<String>,
}

impl RoutePlan {
    pub fn provider_names(&self) -> Vec<&str> {
        self.routes.iter().map(|route| route.handle.name()).collect()
    }

    /// Placeholder of the only provider in scope, if it sets one.
    pub fn placeholder(&self) -> Option<&str> {
        match self.routes.as_slice() {
            [route] => non_empty(&route.handle.metadata().placeholder),
            _ => None,
        }
    }
}

pub(crate) fn non_empty(text: &str) -> Option<&str> {
    (!text.is_empty()).then_some(text)
}

/// Route `text` across the registry.
pub fn route(registry: &Registry, text: &str, mode: &SessionMode, keep_sort: bool) -> RoutePlan {
    let candidates: Vec<(usize, &Arc<ProviderHandle>)> = match mode {
        SessionMode::Free => registry.handles().iter().enumerate().collect(),
        SessionMode::Pinned(names) => registry
            .handles()
            .iter()
            .enumerate()
            .filter(|(_, handle)| names.iter().any(|name| name == handle.name()))
            .collect(),
    };

    let prefixes: Vec<String> = match mode {
        SessionMode::Free => registry
            .handles()
            .iter()
            .map(|handle| handle.metadata().prefix.as_str())
            .filter(|prefix| !prefix.is_empty() && text.starts_with(prefix))
            .map(String::from)
            .collect(),
        SessionMode::Pinned(_) => Vec::new(),
    };
    let has_prefix = !prefixes.is_empty();

    let single = candidates.len() == 1;
    let keep_sort = if single {
        candidates[0].1.metadata().keep_sort || keep_sort
    } else {
        keep_sort
    };
    let apply_prefix_rules = !single && matches!(mode, SessionMode::Free);

    let mut routes = Vec::with_capacity(candidates.len());
    for (index, handle) in candidates {
        let metadata = handle.metadata();
        let prefix = metadata.prefix.as_str();
        let mut routed = text;

        if apply_prefix_rules {
            let matches_prefix = !prefix.is_empty() && text.starts_with(prefix);

            if metadata.switcher_only && !matches_prefix {
                continue;
            }
            if has_prefix && prefix.is_empty() {
                continue;
            }
            if !has_prefix && !prefix.is_empty() {
                continue;
            }
            if has_prefix && !matches_prefix {
                continue;
            }

            routed = &text[prefix.len()..];
        }

        if routed.chars().count() < metadata.min_chars {
            debug!(provider = %metadata.name, min_chars = metadata.min_chars, "Query below minimum length");
            continue;
        }

        routes.push(Route {
            index,
            handle: Arc::clone(handle),
            text: routed.to_string(),
        });
    }

    RoutePlan {
        routes,
        single,
        keep_sort,
        prefixes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::models::Entry;
    use crate::provider::{Provider, ProviderMetadata};
    use async_trait::async_trait;

    struct Stub(ProviderMetadata);

    #[async_trait]
    impl Provider for Stub {
        fn metadata(&self) -> &ProviderMetadata {
            &self.0
        }

        async fn entries(&self, _text: &str) -> Result<Vec<Entry>> {
            Ok(vec![])
        }
    }

    fn registry(providers: Vec<ProviderMetadata>) -> Registry {
        let mut registry = Registry::new();
        for metadata in providers {
            registry.register(Arc::new(Stub(metadata)));
        }
        registry
    }

    fn routed(plan: &RoutePlan) -> Vec<(&str, &str)> {
        plan.routes
            .iter()
            .map(|route| (route.handle.name(), route.text.as_str()))
            .collect()
    }

    fn launcher() -> Registry {
        registry(vec![
            ProviderMetadata::new("applications"),
            ProviderMetadata::new("bookmarks").with_prefix("b"),
            ProviderMetadata::new("runner").with_prefix("!"),
        ])
    }

    #[test]
    fn test_empty_query_skips_prefixed_providers() {
        let plan = route(&launcher(), "", &SessionMode::Free, false);
        assert_eq!(routed(&plan), vec![("applications", "")]);
        assert!(!plan.single);
    }

    #[test]
    fn test_unprefixed_query() {
        let plan = route(&launcher(), "fire", &SessionMode::Free, false);
        assert_eq!(routed(&plan), vec![("applications", "fire")]);
        assert!(plan.prefixes.is_empty());
    }

    #[test]
    fn test_prefixed_query_is_stripped() {
        let plan = route(&launcher(), "!htop", &SessionMode::Free, false);
        assert_eq!(routed(&plan), vec![("runner", "htop")]);
        assert_eq!(plan.prefixes, vec!["!".to_string()]);
    }

    #[test]
    fn test_switcher_only_needs_its_prefix() {
        let mut switcher = ProviderMetadata::new("switcher").with_prefix("/");
        switcher.switcher_only = true;
        let mut unprefixed_switcher = ProviderMetadata::new("windows");
        unprefixed_switcher.switcher_only = true;

        let registry = registry(vec![
            ProviderMetadata::new("applications"),
            switcher,
            unprefixed_switcher,
        ]);

        let plan = route(&registry, "fire", &SessionMode::Free, false);
        assert_eq!(routed(&plan), vec![("applications", "fire")]);

        let plan = route(&registry, "/apps", &SessionMode::Free, false);
        assert_eq!(routed(&plan), vec![("switcher", "apps")]);
    }

    #[test]
    fn test_min_chars_applies_to_routed_text() {
        let mut runner = ProviderMetadata::new("runner").with_prefix("!");
        runner.min_chars = 2;
        let registry = registry(vec![ProviderMetadata::new("applications"), runner]);

        assert!(route(&registry, "!h", &SessionMode::Free, false).routes.is_empty());
        assert_eq!(
            routed(&route(&registry, "!ht", &SessionMode::Free, false)),
            vec![("runner", "ht")]
        );
    }

    #[test]
    fn test_single_provider_bypasses_prefix_logic() {
        let mut only = ProviderMetadata::new("bookmarks").with_prefix("b");
        only.keep_sort = true;
        let registry = registry(vec![only]);

        let plan = route(&registry, "rust", &SessionMode::Free, false);
        assert_eq!(routed(&plan), vec![("bookmarks", "rust")]);
        assert!(plan.single);
        assert!(plan.keep_sort);
    }

    #[test]
    fn test_pinned_mode_short_circuits() {
        let registry = launcher();

        let pinned = SessionMode::Pinned(vec!["bookmarks".to_string()]);
        let plan = route(&registry, "!rust", &pinned, false);
        assert_eq!(routed(&plan), vec![("bookmarks", "!rust")]);
        assert!(plan.single);

        let pinned = SessionMode::Pinned(vec!["runner".to_string(), "applications".to_string()]);
        let plan = route(&registry, "fire", &pinned, false);
        assert_eq!(
            routed(&plan),
            vec![("applications", "fire"), ("runner", "fire")]
        );
        assert!(!plan.single);
    }
}
