//! The background task that looks for new issues.
//!
//! Every pass walks the registered watches in order. For each one it fetches
//! the newest issues of the watched project and tracker, works out which of
//! them appeared since the previous pass, assigns unassigned ones in turn to
//! the watch's pool, and reports them to the chat location the watch was
//! created from.

use crate::db::Store;
use crate::db::watches::{self, Watch};
use crate::redmine::{Issue, IssueTracker};
use crate::utils::pluralize;
use crate::zulip::Notifier;
use anyhow::Context as _;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch as signal;
use tracing::Instrument;

pub mod rotation;
pub mod snapshot;

pub use snapshot::IssueSnapshots;

pub struct Poller {
    tracker: Arc<dyn IssueTracker>,
    db: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    snapshots: IssueSnapshots,
    shutdown_rx: signal::Receiver<bool>,
}

impl Poller {
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        db: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
        shutdown_rx: signal::Receiver<bool>,
    ) -> Self {
        Poller {
            tracker,
            db,
            notifier,
            interval,
            snapshots: IssueSnapshots::default(),
            shutdown_rx,
        }
    }

    /// Polls until shutdown is signalled. The next pass starts `interval`
    /// after the previous one finished.
    pub async fn run(mut self) {
        tracing::info!("poller started, checking every {}s", self.interval.as_secs());
        loop {
            if self.is_shutting_down() {
                break;
            }
            if let Err(e) = self.poll_once().await {
                tracing::error!("polling pass failed: {e:?}");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                res = self.shutdown_rx.changed() => {
                    // A dropped sender means nobody can ask us to stop anymore.
                    if res.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("poller stopped");
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// One pass over all watches. Only a failure to list the watches is an
    /// error; problems with a single watch are logged and skipped.
    pub async fn poll_once(&mut self) -> anyhow::Result<()> {
        let watches = watches::list_watches(&*self.db)
            .await
            .context("listing watches")?;
        let live: HashSet<u64> = watches.iter().map(|w| w.id).collect();
        self.snapshots.retain(&live);

        for watch in watches {
            if self.is_shutting_down() {
                break;
            }
            let span = tracing::info_span!("watch", id = watch.id);
            if let Err(e) = self.process_watch(watch).instrument(span).await {
                tracing::warn!("{e:?}");
            }
        }
        Ok(())
    }

    async fn process_watch(&mut self, mut watch: Watch) -> anyhow::Result<()> {
        let Some(project) = self.tracker.resolve_project(&watch.project).await? else {
            anyhow::bail!("project {:?} not found", watch.project);
        };
        let Some(tracker) = self.tracker.resolve_tracker(&watch.tracker).await? else {
            anyhow::bail!("tracker {:?} not found", watch.tracker);
        };
        let issues = self
            .tracker
            .issues(&project, &tracker)
            .await
            .with_context(|| format!("fetching issues of {} / {}", project.name, tracker.name))?;

        let new_issues = self.snapshots.delta(watch.id, &issues);
        if !new_issues.is_empty() {
            let count = new_issues.len();
            tracing::info!("{count} new {}", pluralize("issue", count));
        }
        for issue in new_issues.into_iter().rev() {
            let assignee = self.assign(&mut watch, issue).await;
            let text = notification(
                issue,
                &project.name,
                &tracker.name,
                assignee.as_deref(),
                &self.tracker.issue_url(issue.id),
            );
            self.notifier.deliver(&watch.origin, &text).await;
        }
        Ok(())
    }

    /// Assigns `issue` to the next member of the pool, returning the chat
    /// handle of whoever got it.
    async fn assign(&self, watch: &mut Watch, issue: &Issue) -> Option<String> {
        if issue.is_assigned() || watch.assignees.is_empty() {
            return None;
        }
        let user = match rotation::next_assignee(&*self.db, watch).await {
            Ok(user) => user?,
            Err(e) => {
                tracing::error!("selecting assignee for #{}: {e:?}", issue.id);
                return None;
            }
        };
        match self
            .tracker
            .update_assignee(issue.id, user.external_id)
            .await
        {
            Ok(()) => {
                tracing::info!("assigned #{} to {}", issue.id, user.external_id);
                Some(user.chat_handle)
            }
            Err(e) => {
                tracing::warn!("assigning #{} to {} failed: {e:?}", issue.id, user.external_id);
                None
            }
        }
    }
}

fn notification(
    issue: &Issue,
    project: &str,
    tracker: &str,
    assignee: Option<&str>,
    url: &str,
) -> String {
    let mut text = format!("New issue in [{tracker}] {project}: {}\n", issue.subject);
    if let Some(handle) = assignee {
        text.push_str(&format!("Assigned to @**{handle}**\n"));
    }
    text.push_str(url);
    text
}
