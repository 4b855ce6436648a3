//! Tracking of the most recent unsettled local edit.
//!
//! While an edit is unsettled, the reconciler protects the edited path from
//! remote snapshots that may have been produced before the host saw it. The
//! edit settles on a trailing-edge deadline pushed forward by every local
//! edit and every accepted update.

use crate::Timestamp;

/// Holder of the last local edit path and its settle deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditTracker {
    key: Option<String>,
    settle_at: Option<Timestamp>,
    settle_delay_ms: u64,
}

impl EditTracker {
    pub fn new(settle_delay_ms: u64) -> Self {
        Self {
            key: None,
            settle_at: None,
            settle_delay_ms,
        }
    }

    /// Record a local edit at `path`, replacing any earlier one.
    pub fn record(&mut self, path: impl Into<String>, now: Timestamp) {
        self.key = Some(path.into());
        self.settle_at = Some(now + self.settle_delay_ms);
    }

    /// Push the settle deadline after an accepted update.
    pub fn touch(&mut self, now: Timestamp) {
        if self.key.is_some() {
            self.settle_at = Some(now + self.settle_delay_ms);
        }
    }

    /// Clear the edit once its deadline has passed. Returns true if cleared.
    pub fn settle(&mut self, now: Timestamp) -> bool {
        match self.settle_at {
            Some(deadline) if now >= deadline => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.key = None;
        self.settle_at = None;
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn settle_at(&self) -> Option<Timestamp> {
        self.settle_at
    }
}
