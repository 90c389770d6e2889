//! Messages delivered to the presentation layer.
//!
//! Rounds never touch the presentation layer directly. They send
//! `PresentationEvent`s over a channel to a single consumer, which owns
//! whatever applies them (a terminal printer in the binary, a widget tree
//! elsewhere).

use crate::models::Entry;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

/// Sending half handed to sessions.
pub type EventSender = mpsc::UnboundedSender<PresentationEvent>;
/// Receiving half owned by the single consumer.
pub type EventReceiver = mpsc::UnboundedReceiver<PresentationEvent>;

/// Create the presentation channel.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitReason {
    /// Ended by the caller.
    Closed,
    /// The inactivity timer fired.
    Timeout,
}

/// The published output of one round.
#[derive(Debug, Clone, Serialize)]
pub struct RoundResults {
    pub generation: u64,
    pub query: String,
    pub entries: Vec<Entry>,
    /// Shown instead of an empty list; set when one provider was in scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Everything the presentation layer is told.
#[derive(Debug, Clone)]
pub enum PresentationEvent {
    RoundBegin { generation: u64, query: String },
    Results(RoundResults),
    /// Inline completion for the current input.
    Typeahead { generation: u64, suggestion: String },
    ItemActivated { provider: String, label: String },
    SessionExit(ExitReason),
}

/// Selection cursor over a published list.
#[derive(Debug, Clone, Copy, Default)]
pub struct Selection {
    index: usize,
    len: usize,
    cycle: bool,
}

impl Selection {
    pub fn new(len: usize, cycle: bool) -> Self {
        Self { index: 0, len, cycle }
    }

    pub fn index(&self) -> Option<usize> {
        (self.len > 0).then_some(self.index)
    }

    /// Point at a new list, keeping the cursor in range.
    pub fn reset(&mut self, len: usize) {
        self.len = len;
        self.index = 0;
    }

    pub fn next(&mut self) -> bool {
        if self.len == 0 {
            return false;
        }

        if self.index + 1 < self.len {
            self.index += 1;
        } else if self.cycle {
            self.index = 0;
        }

        true
    }

    pub fn prev(&mut self) -> bool {
        if self.len == 0 {
            return false;
        }

        if self.index > 0 {
            self.index -= 1;
        } else if self.cycle {
            self.index = self.len - 1;
        }

        true
    }

    /// Point at `index`. Past the end it wraps when cycling, otherwise
    /// the cursor stays put.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.len {
            self.index = index;
            true
        } else if self.cycle && self.len > 0 {
            self.index = index % self.len;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_without_cycle() {
        let mut selection = Selection::new(3, false);
        assert!(selection.next());
        assert!(selection.next());
        assert!(selection.next());
        assert_eq!(selection.index(), Some(2));

        selection.reset(3);
        assert!(selection.prev());
        assert_eq!(selection.index(), Some(0));
    }

    #[test]
    fn test_selection_cycles() {
        let mut selection = Selection::new(3, true);
        selection.prev();
        assert_eq!(selection.index(), Some(2));
        selection.next();
        assert_eq!(selection.index(), Some(0));
    }

    #[test]
    fn test_select_past_end() {
        let mut selection = Selection::new(3, false);
        assert!(selection.select(1));
        assert!(!selection.select(3));
        assert_eq!(selection.index(), Some(1));

        let mut selection = Selection::new(3, true);
        assert!(selection.select(4));
        assert_eq!(selection.index(), Some(1));
    }

    #[test]
    fn test_empty_selection() {
        let mut selection = Selection::new(0, true);
        assert!(!selection.next());
        assert!(!selection.prev());
        assert_eq!(selection.index(), None);
        assert!(!selection.select(0));
    }
}
