//! Typing-presence tracking.
//!
//! Membership is level-triggered by explicit `typing_start`/`typing_stop`
//! signals — there is no time-based expiry. A peer that disconnects while
//! typing stays in the roster until an explicit stop arrives; that is a
//! documented limitation of the protocol, not something this tracker papers
//! over.

use std::collections::BTreeSet;

/// The set of display names currently typing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypingRoster {
    names: BTreeSet<String>,
}

impl TypingRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a user as typing. Idempotent: repeated starts for a name already
    /// present change nothing. Returns whether the roster changed.
    pub fn start(&mut self, username: &str) -> bool {
        self.names.insert(username.to_string())
    }

    /// Mark a user as no longer typing. Returns whether the roster changed.
    pub fn stop(&mut self, username: &str) -> bool {
        self.names.remove(username)
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, username: &str) -> bool {
        self.names.contains(username)
    }

    /// Snapshot of the roster, sorted for deterministic rendering.
    pub fn names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}
