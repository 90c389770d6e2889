//! Round generations and stale-round discard.
//!
//! Every input change starts a round with a fresh generation number. A
//! round may only publish while its generation is still the latest one;
//! the check and the publication happen under one lock so an older round
//! can never land after a newer one.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// One query-to-results computation.
#[derive(Debug, Clone)]
pub struct Round {
    pub generation: u64,
    /// Raw input text that started the round.
    pub text: String,
    pub started: Instant,
}

impl Round {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Hands out generations and gates publication.
#[derive(Debug, Default)]
pub struct StalenessController {
    latest: AtomicU64,
    publish: Mutex<u64>,
}

impl StalenessController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a round for `text`, superseding every earlier round.
    pub fn begin(&self, text: &str) -> Round {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        Round {
            generation,
            text: text.to_string(),
            started: Instant::now(),
        }
    }

    /// Generation of the newest round.
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, round: &Round) -> bool {
        round.generation == self.latest()
    }

    /// Run `publish` if `round` is still current. Returns whether it ran.
    pub fn publish_if_current<F>(&self, round: &Round, publish: F) -> bool
    where
        F: FnOnce(),
    {
        let mut last_published = self.publish.lock();

        if !self.is_current(round) || *last_published >= round.generation {
            return false;
        }

        publish();
        *last_published = round.generation;
        true
    }

    /// Generation of the last published round, zero if none.
    pub fn last_published(&self) -> u64 {
        *self.publish.lock()
    }
}
