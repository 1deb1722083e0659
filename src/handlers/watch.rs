//! Watch commands: register, list, and stop watches.
//!
//! Project and tracker names must resolve against Redmine when the watch is
//! registered. They are stored as given, not as ids, and the poller resolves
//! them again on every pass.

use crate::db::watches::{self, NewWatch};
use crate::handlers::Context;
use crate::user_error;
use crate::zulip::Origin;
use itertools::Itertools;
use std::fmt::Write;

pub(super) async fn register_watch(
    ctx: &Context,
    origin: &Origin,
    project: String,
    tracker: String,
    assignees: Vec<u64>,
) -> anyhow::Result<String> {
    if ctx.tracker.resolve_project(&project).await?.is_none() {
        user_error!("Project '{project}' is not found.");
    }
    if ctx.tracker.resolve_tracker(&tracker).await?.is_none() {
        user_error!("Tracker '{tracker}' is not found.");
    }
    let mut reply = format!("Watching new **{tracker}** issues in **{project}**");
    let rule = NewWatch {
        project,
        tracker,
        assignees,
        origin: origin.clone(),
    };
    if !rule.assignees.is_empty() {
        write!(
            reply,
            ", assigning them in turn to {}",
            rule.assignees.iter().format(", ")
        )?;
    }
    let id = watches::add_watch(&*ctx.db, rule).await?;
    write!(reply, " (watch #{id}).")?;
    Ok(reply)
}

pub(super) async fn list_watches(ctx: &Context) -> anyhow::Result<String> {
    let watches = watches::list_watches(&*ctx.db).await?;
    if watches.is_empty() {
        return Ok("No watches registered.".to_string());
    }
    let mut reply = String::new();
    for watch in watches {
        let assignees = if watch.assignees.is_empty() {
            "no auto-assignment".to_string()
        } else {
            format!("assignees {}", watch.assignees.iter().format(", "))
        };
        writeln!(
            reply,
            "- #{} **{}** / **{}**: {} (from {})",
            watch.id,
            watch.project,
            watch.tracker,
            assignees,
            watch.origin.describe()
        )?;
    }
    Ok(reply)
}

pub(super) async fn stop_watch(ctx: &Context, id: u64) -> anyhow::Result<String> {
    match watches::remove_watch(&*ctx.db, id).await? {
        Some(watch) => Ok(format!(
            "Stopped watch #{id} ({} / {}).",
            watch.project, watch.tracker
        )),
        None => user_error!("Watch #{id} not found."),
    }
}
