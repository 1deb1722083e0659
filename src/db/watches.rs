//! The `watches` collection: rules telling the poller which project/tracker
//! pairs to look at, who to rotate new issues between, and where to report.

use crate::db::{Store, load_collection, modify_collection};
use crate::zulip::Origin;
use anyhow::Result;
use serde::{Deserialize, Serialize};

const WATCHES_KEY: &str = "watches";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watch {
    pub id: u64,
    pub project: String,
    pub tracker: String,
    /// Redmine user ids to rotate new issues between. Empty disables
    /// auto-assignment.
    #[serde(default)]
    pub assignees: Vec<u64>,
    /// Rotation cursor. Only the poller moves it.
    #[serde(default)]
    pub assignee_index: u64,
    pub origin: Origin,
}

/// A watch as requested, before it has an id.
#[derive(Debug, Clone)]
pub struct NewWatch {
    pub project: String,
    pub tracker: String,
    pub assignees: Vec<u64>,
    pub origin: Origin,
}

/// Stores a new watch and returns its id (highest existing id + 1).
pub async fn add_watch(db: &dyn Store, rule: NewWatch) -> Result<u64> {
    tracing::trace!("add_watch(project={}, tracker={})", rule.project, rule.tracker);
    modify_collection(db, WATCHES_KEY, move |watches: &mut Vec<Watch>| {
        let id = watches.iter().map(|w| w.id).max().unwrap_or(0) + 1;
        watches.push(Watch {
            id,
            project: rule.project,
            tracker: rule.tracker,
            assignees: rule.assignees,
            assignee_index: 0,
            origin: rule.origin,
        });
        id
    })
    .await
}

/// Deletes the watch with the given id. Returns `None` if there was none.
pub async fn remove_watch(db: &dyn Store, id: u64) -> Result<Option<Watch>> {
    tracing::trace!("remove_watch(id={})", id);
    modify_collection(db, WATCHES_KEY, |watches: &mut Vec<Watch>| {
        let pos = watches.iter().position(|w| w.id == id)?;
        Some(watches.remove(pos))
    })
    .await
}

/// All watches, in the order they were registered.
pub async fn list_watches(db: &dyn Store) -> Result<Vec<Watch>> {
    load_collection(db, WATCHES_KEY).await
}

/// Moves the rotation cursor of a watch forward by one and returns the new
/// value. Returns `None` if the watch has been removed in the meantime.
pub async fn advance_rotation(db: &dyn Store, id: u64) -> Result<Option<u64>> {
    tracing::trace!("advance_rotation(id={})", id);
    modify_collection(db, WATCHES_KEY, |watches: &mut Vec<Watch>| {
        let watch = watches.iter_mut().find(|w| w.id == id)?;
        watch.assignee_index += 1;
        Some(watch.assignee_index)
    })
    .await
}
