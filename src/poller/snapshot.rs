//! Remembers which issues each watch saw on its previous poll.

use crate::redmine::Issue;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct IssueSnapshots {
    seen: HashMap<u64, HashSet<u64>>,
}

impl IssueSnapshots {
    /// Returns the issues of `current` (newest first) that are newer than
    /// anything seen on the previous poll of `watch_id`, newest first, and
    /// makes `current` the new snapshot.
    ///
    /// The first poll of a watch only records a baseline and reports nothing.
    pub fn delta<'a>(&mut self, watch_id: u64, current: &'a [Issue]) -> Vec<&'a Issue> {
        let ids = current.iter().map(|issue| issue.id).collect();
        let Some(previous) = self.seen.insert(watch_id, ids) else {
            tracing::debug!("watch #{watch_id}: baseline of {} issues", current.len());
            return Vec::new();
        };
        current
            .iter()
            .take_while(|issue| !previous.contains(&issue.id))
            .collect()
    }

    /// Forgets watches that are no longer registered.
    pub fn retain(&mut self, live: &HashSet<u64>) {
        self.seen.retain(|id, _| live.contains(id));
    }

    pub fn is_tracking(&self, watch_id: u64) -> bool {
        self.seen.contains_key(&watch_id)
    }
}
