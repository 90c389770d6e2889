//! The query engine.
//!
//! Routing, concurrent fan-out, filtering, scoring, aggregation and
//! staleness control, tied together by `session::Session`.

pub mod aggregator;
pub mod fanout;
pub mod filter;
pub mod matcher;
pub mod router;
pub mod scoring;
pub mod session;
pub mod staleness;

pub use aggregator::{finalize, Contribution, Finalize};
pub use router::{route, RoutePlan, SessionMode};
pub use session::{InactivityTimer, Invocation, Session};
pub use staleness::{Round, StalenessController};
