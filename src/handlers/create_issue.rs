//! `create-issue` and the aliases it can expand.

use crate::db::aliases::{self, Alias};
use crate::handlers::Context;
use crate::redmine::NewIssue;
use crate::user_error;

pub(super) async fn create_issue(
    ctx: &Context,
    subject: String,
    project: Option<String>,
    tracker: Option<String>,
    alias: Option<String>,
) -> anyhow::Result<String> {
    let (mut project, mut tracker) = (project, tracker);
    if let Some(name) = alias {
        let Some(alias) = aliases::get_alias(&*ctx.db, &name).await? else {
            user_error!("Alias '{name}' is not found.");
        };
        project = project.or(Some(alias.project));
        tracker = tracker.or(alias.tracker);
    }

    let Some(project) = project else {
        user_error!("Project must be specified.");
    };
    let Some(project_id) = ctx.tracker.resolve_project(&project).await?.map(|p| p.id) else {
        user_error!("Project '{project}' is not found.");
    };
    let tracker_id = match tracker {
        Some(tracker) => match ctx.tracker.resolve_tracker(&tracker).await? {
            Some(t) => Some(t.id),
            None => user_error!("Tracker '{tracker}' is not found."),
        },
        None => None,
    };

    let issue = ctx
        .tracker
        .create_issue(&NewIssue {
            subject,
            project_id,
            tracker_id,
        })
        .await?;
    tracing::info!("created issue #{} in project {}", issue.id, project_id);
    Ok(format!("Issue created: {}", ctx.tracker.issue_url(issue.id)))
}

pub(super) async fn register_alias(
    ctx: &Context,
    name: &str,
    project: String,
    tracker: Option<String>,
) -> anyhow::Result<String> {
    let alias = Alias { project, tracker };
    let previous = aliases::register_alias(&*ctx.db, name, alias).await?;
    Ok(match previous {
        Some(_) => format!("Alias '{name}' updated."),
        None => format!("Alias '{name}' registered."),
    })
}
