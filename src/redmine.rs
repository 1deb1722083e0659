//! Typed view of the Redmine REST API.
//!
//! The poller and the command handlers only talk to Redmine through the
//! [`IssueTracker`] trait, which [`RedmineClient`] implements over HTTP.

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod client;

pub use client::RedmineClient;

/// A reference to another record as embedded in Redmine responses, e.g.
/// `"tracker": {"id": 1, "name": "Bug"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdName {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    /// The URL-safe short name, e.g. `infra` for a project named "Infrastructure".
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tracker {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub subject: String,
    pub project: IdName,
    pub tracker: IdName,
    /// The current assignee, if any. Redmine omits the field when unassigned.
    #[serde(default)]
    pub assigned_to: Option<IdName>,
}

impl Issue {
    pub fn is_assigned(&self) -> bool {
        self.assigned_to.is_some()
    }
}

/// Request to create an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewIssue {
    pub subject: String,
    pub project_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker_id: Option<u64>,
}

#[async_trait::async_trait]
pub trait IssueTracker: Send + Sync {
    async fn projects(&self) -> Result<Vec<Project>>;

    async fn trackers(&self) -> Result<Vec<Tracker>>;

    /// Issues of `project` filed under `tracker`, newest (highest id) first.
    async fn issues(&self, project: &Project, tracker: &Tracker) -> Result<Vec<Issue>>;

    async fn update_assignee(&self, issue_id: u64, user_id: u64) -> Result<()>;

    async fn create_issue(&self, issue: &NewIssue) -> Result<Issue>;

    /// The browser URL of an issue.
    fn issue_url(&self, issue_id: u64) -> String;

    async fn resolve_project(&self, name: &str) -> Result<Option<Project>> {
        Ok(find_project(self.projects().await?, name))
    }

    async fn resolve_tracker(&self, name: &str) -> Result<Option<Tracker>> {
        Ok(find_tracker(self.trackers().await?, name))
    }
}

/// Finds a project by numeric id, name, or identifier, ignoring case.
pub fn find_project(projects: Vec<Project>, name: &str) -> Option<Project> {
    let name = name.trim().to_lowercase();
    projects.into_iter().find(|p| {
        p.id.to_string() == name || p.name.to_lowercase() == name || p.identifier.to_lowercase() == name
    })
}

/// Finds a tracker by numeric id or name, ignoring case.
pub fn find_tracker(trackers: Vec<Tracker>, name: &str) -> Option<Tracker> {
    let name = name.trim().to_lowercase();
    trackers
        .into_iter()
        .find(|t| t.id.to_string() == name || t.name.to_lowercase() == name)
}
