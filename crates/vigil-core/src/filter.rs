//! Per-camera event whitelist.

use std::collections::HashSet;

/// Decides which event codes a camera forwards.
///
/// Membership is an exact, case-sensitive string match against the `Code=`
/// value, with no wildcard support. Rejected events are dropped with no
/// side effects.
#[derive(Debug, Clone)]
pub struct EventFilter {
    whitelist: HashSet<String>,
}

impl EventFilter {
    /// Build a filter from the camera's configured event codes.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            whitelist: codes.into_iter().map(Into::into).collect(),
        }
    }

    /// True iff the code is whitelisted.
    pub fn accepts(&self, code: &str) -> bool {
        self.whitelist.contains(code)
    }

    /// Number of whitelisted codes.
    pub fn len(&self) -> usize {
        self.whitelist.len()
    }

    /// True if no codes are whitelisted (every event is rejected).
    pub fn is_empty(&self) -> bool {
        self.whitelist.is_empty()
    }
}
