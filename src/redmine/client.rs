use crate::config::Config;
use crate::redmine::{Issue, IssueTracker, NewIssue, Project, Tracker};
use anyhow::Context;
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

const API_KEY_HEADER: &str = "X-Redmine-API-Key";
/// Redmine caps list pages at 100 entries unless configured otherwise.
const PROJECT_PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub struct RedmineClient {
    client: Client,
    base_url: String,
    /// Validated once in [`RedmineClient::new`], marked sensitive.
    api_key: HeaderValue,
    basic_auth: Option<(String, SecretString)>,
    /// Page size for issue listings.
    issue_limit: u32,
}

impl RedmineClient {
    /// Every request made by the returned client gives up after `timeout`.
    pub fn new(base_url: String, api_key: SecretString, timeout: Duration) -> anyhow::Result<Self> {
        let mut api_key = HeaderValue::from_str(api_key.expose_secret())
            .context("the Redmine API key is not a valid header value")?;
        api_key.set_sensitive(true);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(RedmineClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            basic_auth: None,
            issue_limit: 100,
        })
    }

    /// Reads `REDMINE_URL`, `REDMINE_API_KEY` and the optional
    /// `REDMINE_BASIC_AUTH_USER`/`REDMINE_BASIC_AUTH_PASSWORD` pair.
    pub fn new_from_env(config: &Config) -> anyhow::Result<Self> {
        let base_url = std::env::var("REDMINE_URL").context("REDMINE_URL is missing")?;
        let api_key: SecretString = std::env::var("REDMINE_API_KEY")
            .context("REDMINE_API_KEY is missing")?
            .into();
        let mut client = Self::new(base_url, api_key, config.request_timeout())?;
        client.set_issue_limit(config.issue_limit);
        if let (Ok(user), Ok(password)) = (
            std::env::var("REDMINE_BASIC_AUTH_USER"),
            std::env::var("REDMINE_BASIC_AUTH_PASSWORD"),
        ) {
            client = client.with_basic_auth(user, password.into());
        }
        Ok(client)
    }

    pub fn with_basic_auth(mut self, user: String, password: SecretString) -> Self {
        self.basic_auth = Some((user, password));
        self
    }

    pub fn set_issue_limit(&mut self, limit: u32) {
        self.issue_limit = limit;
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send_req(&self, req: RequestBuilder) -> anyhow::Result<Vec<u8>> {
        let req = req.build().context("building request")?;
        let req_dbg = format!("{} {}", req.method(), req.url());
        tracing::debug!("send_req {req_dbg}");

        let resp = self
            .client
            .execute(req)
            .await
            .with_context(|| format!("sending {req_dbg}"))?;
        let maybe_err = resp.error_for_status_ref().err();
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("failed to read response body {req_dbg}"))?;
        if let Some(e) = maybe_err {
            return Err(anyhow::Error::new(e))
                .with_context(|| format!("response: {}", String::from_utf8_lossy(&body)));
        }
        Ok(body.to_vec())
    }

    pub async fn json<T>(&self, req: RequestBuilder) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.send_req(req).await?;
        crate::deserialize_payload(&body).with_context(|| {
            format!(
                "Failed to deserialize value of type {}",
                std::any::type_name::<T>()
            )
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        tracing::trace!("get {:?}", path);
        self.client.get(self.url(path)).configure(self)
    }

    fn put(&self, path: &str) -> RequestBuilder {
        tracing::trace!("put {:?}", path);
        self.client.put(self.url(path)).configure(self)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        tracing::trace!("post {:?}", path);
        self.client.post(self.url(path)).configure(self)
    }
}

#[async_trait::async_trait]
impl IssueTracker for RedmineClient {
    async fn projects(&self) -> anyhow::Result<Vec<Project>> {
        #[derive(serde::Deserialize)]
        struct Projects {
            projects: Vec<Project>,
            #[serde(default)]
            total_count: usize,
        }
        let mut projects = Vec::new();
        loop {
            let req = self
                .get("projects.json")
                .query(&[("offset", projects.len()), ("limit", PROJECT_PAGE_SIZE)]);
            let page: Projects = self
                .json(req)
                .await
                .with_context(|| format!("listing projects from offset {}", projects.len()))?;
            let last = page.projects.is_empty()
                || projects.len() + page.projects.len() >= page.total_count;
            projects.extend(page.projects);
            if last {
                return Ok(projects);
            }
        }
    }

    async fn trackers(&self) -> anyhow::Result<Vec<Tracker>> {
        #[derive(serde::Deserialize)]
        struct Trackers {
            trackers: Vec<Tracker>,
        }
        let res: Trackers = self
            .json(self.get("trackers.json"))
            .await
            .context("listing trackers")?;
        Ok(res.trackers)
    }

    async fn issues(&self, project: &Project, tracker: &Tracker) -> anyhow::Result<Vec<Issue>> {
        #[derive(serde::Deserialize)]
        struct Issues {
            issues: Vec<Issue>,
        }
        let req = self.get("issues.json").query(&[
            ("project_id", project.id.to_string()),
            ("tracker_id", tracker.id.to_string()),
            // Closed issues too, so that an issue closed between two polls
            // does not shift what counts as already seen.
            ("status_id", "*".to_string()),
            ("sort", "id:desc".to_string()),
            ("limit", self.issue_limit.to_string()),
        ]);
        let res: Issues = self.json(req).await.with_context(|| {
            format!("listing issues of {} ({})", project.identifier, tracker.name)
        })?;
        Ok(res.issues)
    }

    async fn update_assignee(&self, issue_id: u64, user_id: u64) -> anyhow::Result<()> {
        #[derive(serde::Serialize)]
        struct Assignment {
            assigned_to_id: u64,
        }
        #[derive(serde::Serialize)]
        struct Update {
            issue: Assignment,
        }
        let body = Update {
            issue: Assignment {
                assigned_to_id: user_id,
            },
        };
        self.send_req(self.put(&format!("issues/{issue_id}.json")).json(&body))
            .await
            .with_context(|| format!("failed to assign issue {issue_id} to user {user_id}"))?;
        Ok(())
    }

    async fn create_issue(&self, issue: &NewIssue) -> anyhow::Result<Issue> {
        #[derive(serde::Serialize)]
        struct Create<'a> {
            issue: &'a NewIssue,
        }
        #[derive(serde::Deserialize)]
        struct Created {
            issue: Issue,
        }
        let res: Created = self
            .json(self.post("issues.json").json(&Create { issue }))
            .await
            .context("failed to create issue")?;
        Ok(res.issue)
    }

    fn issue_url(&self, issue_id: u64) -> String {
        self.url(&format!("issues/{issue_id}"))
    }
}

trait RequestSend: Sized {
    fn configure(self, r: &RedmineClient) -> Self;
}

impl RequestSend for RequestBuilder {
    fn configure(self, r: &RedmineClient) -> RequestBuilder {
        let req = self
            .header(USER_AGENT, "redmine-watchbot")
            .header(API_KEY_HEADER, r.api_key.clone());
        match &r.basic_auth {
            Some((user, password)) => req.basic_auth(user, Some(password.expose_secret())),
            None => req,
        }
    }
}
