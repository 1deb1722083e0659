use crate::db::Store;
use crate::errors::UserError;
use crate::redmine::IssueTracker;
use crate::zulip::Origin;
use crate::zulip::commands::ChatCommand;
use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;

mod create_issue;
mod users;
mod watch;

#[derive(Debug)]
pub enum HandlerError {
    Message(String),
    Other(anyhow::Error),
}

impl std::error::Error for HandlerError {}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HandlerError::Message(msg) => write!(f, "{}", msg),
            HandlerError::Other(_) => write!(f, "An internal error occurred."),
        }
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<UserError>() {
            Ok(UserError(msg)) => HandlerError::Message(msg),
            Err(err) => HandlerError::Other(err),
        }
    }
}

pub struct Context {
    pub tracker: Arc<dyn IssueTracker>,
    pub db: Arc<dyn Store>,
    /// Token Zulip sends with every outgoing-webhook request.
    pub webhook_token: SecretString,
}

/// Runs a chat command and returns the reply.
///
/// Failures never leave a half-applied change behind: each command does at
/// most one write, after all of its checks have passed.
pub async fn handle_command(ctx: &Context, origin: &Origin, command: ChatCommand) -> String {
    let res = match command {
        ChatCommand::CreateIssue {
            subject,
            project,
            tracker,
            alias,
        } => create_issue::create_issue(ctx, subject, project, tracker, alias).await,
        ChatCommand::Alias {
            name,
            project,
            tracker,
        } => create_issue::register_alias(ctx, &name, project, tracker).await,
        ChatCommand::Watch {
            project,
            tracker,
            assignees,
        } => watch::register_watch(ctx, origin, project, tracker, assignees).await,
        ChatCommand::Watches => watch::list_watches(ctx).await,
        ChatCommand::Unwatch { id } => watch::stop_watch(ctx, id).await,
        ChatCommand::Associate {
            external_id,
            chat_handle,
        } => users::associate(ctx, external_id, &chat_handle).await,
        ChatCommand::Absent { external_id } => users::mark_absent(ctx, external_id).await,
        ChatCommand::Present { external_id } => users::mark_present(ctx, external_id).await,
        ChatCommand::Absentees => users::list_absent(ctx).await,
    };
    match res.map_err(HandlerError::from) {
        Ok(reply) => reply,
        Err(HandlerError::Message(msg)) => msg,
        Err(HandlerError::Other(err)) => {
            tracing::error!("handling command failed: {:?}", err);
            HandlerError::Other(err).to_string()
        }
    }
}
