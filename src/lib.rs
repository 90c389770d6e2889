//! sift - concurrent query aggregation and ranking for keyboard launchers.
//!
//! Every keystroke starts a round: the query is routed to the providers in
//! scope, each provider runs in its own task, and the merged entries are
//! filtered, scored against the query and usage history, sorted and
//! truncated. Only the newest round reaches the presentation layer.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod models;
pub mod presentation;
pub mod provider;
pub mod render;

pub use config::Config;
pub use engine::{Invocation, Session, SessionMode};
pub use error::{Result, SiftError};
pub use history::{HistoryMatch, HistoryStore, UsageHistory};
pub use models::{Entry, MatchingMode};
pub use presentation::{PresentationEvent, RoundResults};
pub use provider::{Provider, ProviderMetadata, Registry};
