//! GitHub commit status client

use std::fmt;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::{Deserialize, Serialize};
use tracing::debug;

use bundlewatch_core::{Severity, SinkError, StatusPush, StatusSink};

use crate::error::GitHubError;
use crate::Result;

/// Public GitHub REST endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";

/// GitHub API configuration
#[derive(Clone)]
pub struct GitHubConfig {
    /// REST API base (GitHub Enterprise: `https://host/api/v3`)
    pub api_url: String,
    /// Personal access token with `repo:status`
    pub token: String,
    pub user_agent: String,
}

impl GitHubConfig {
    pub fn new(token: &str) -> Self {
        GitHubConfig {
            api_url: DEFAULT_API_URL.to_string(),
            token: token.to_string(),
            user_agent: format!("bundlewatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Point at a different API base
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Body of `POST /repos/{owner}/{repo}/statuses/{sha}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatusBody {
    pub state: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    pub description: String,
    pub context: String,
}

impl From<&StatusPush> for CommitStatusBody {
    fn from(push: &StatusPush) -> Self {
        CommitStatusBody {
            state: push.severity,
            target_url: push.target_url.clone(),
            description: push.description.clone(),
            context: push.context.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthenticatedUser {
    login: String,
}

/// Authenticated client for the commit status API
#[derive(Debug, Clone)]
pub struct GitHubStatusClient {
    config: GitHubConfig,
    http: reqwest::Client,
}

impl GitHubStatusClient {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| GitHubError::ClientBuild(e.to_string()))?;

        Ok(GitHubStatusClient { config, http })
    }

    pub fn status_url(&self, owner: &str, repo: &str, sha: &str) -> String {
        format!(
            "{}/repos/{}/{}/statuses/{}",
            self.config.api_url, owner, repo, sha
        )
    }

    /// Build (without sending) the request that publishes `push`.
    pub fn status_request(&self, push: &StatusPush) -> Result<reqwest::Request> {
        let url = self.status_url(&push.owner, &push.repo_name, &push.commit_sha);
        let request = self
            .http
            .post(url)
            .bearer_auth(&self.config.token)
            .json(&CommitStatusBody::from(push))
            .build()?;
        Ok(request)
    }

    /// Resolve the login the token belongs to.
    ///
    /// Used at startup to fail fast on a bad token.
    pub async fn authenticated_login(&self) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/user", self.config.api_url))
            .bearer_auth(&self.config.token)
            .send()
            .await?;
        let response = check(response).await?;
        let user: AuthenticatedUser = response.json().await?;
        Ok(user.login)
    }

    /// Create or replace the status for `(sha, context)`.
    pub async fn create_status(&self, push: &StatusPush) -> Result<()> {
        let request = self.status_request(push)?;
        debug!(url = %request.url(), context = %push.context, "posting commit status");
        let response = self.http.execute(request).await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GitHubError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl StatusSink for GitHubStatusClient {
    async fn push(&self, status: &StatusPush) -> std::result::Result<(), SinkError> {
        self.create_status(status).await.map_err(SinkError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;

    fn push(target_url: Option<&str>) -> StatusPush {
        StatusPush {
            owner: "acme".to_string(),
            repo_name: "widget".to_string(),
            commit_sha: "abc123".to_string(),
            context: "widget-prod".to_string(),
            severity: Severity::Success,
            description: "Bundle deployment succeeded".to_string(),
            target_url: target_url.map(str::to_string),
        }
    }

    #[test]
    fn test_config_defaults_and_redaction() {
        let config =
            GitHubConfig::new("ghp_secret").with_api_url("https://ghe.example.com/api/v3/");
        assert_eq!(config.api_url, "https://ghe.example.com/api/v3");
        assert!(config.user_agent.starts_with("bundlewatch/"));
        assert!(!format!("{config:?}").contains("ghp_secret"));
        assert_eq!(GitHubConfig::new("t").api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_status_url() {
        let client = GitHubStatusClient::new(GitHubConfig::new("token")).unwrap();
        assert_eq!(
            client.status_url("acme", "widget", "abc123"),
            "https://api.github.com/repos/acme/widget/statuses/abc123"
        );
    }

    #[test]
    fn test_body_omits_missing_target_url() {
        let body = serde_json::to_value(CommitStatusBody::from(&push(None))).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "state": "success",
                "description": "Bundle deployment succeeded",
                "context": "widget-prod",
            })
        );
    }

    #[test]
    fn test_status_request_shape() {
        let client = GitHubStatusClient::new(GitHubConfig::new("token-123")).unwrap();
        let request = client
            .status_request(&push(Some("https://rancher.example.com/x")))
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://api.github.com/repos/acme/widget/statuses/abc123"
        );
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer token-123");

        let bytes = request.body().and_then(|b| b.as_bytes()).unwrap();
        let body: CommitStatusBody = serde_json::from_slice(bytes).unwrap();
        assert_eq!(body.state, Severity::Success);
        assert_eq!(
            body.target_url.as_deref(),
            Some("https://rancher.example.com/x")
        );
    }

    #[test]
    fn test_api_errors_map_to_rejected() {
        let err = GitHubError::Api {
            status: 422,
            body: "No commit found for SHA".to_string(),
        };
        assert!(matches!(
            SinkError::from(err),
            SinkError::Rejected { status: 422, .. }
        ));
    }

    #[tokio::test]
    async fn test_push_to_unreachable_api_fails_gracefully() {
        let config = GitHubConfig::new("token").with_api_url("http://127.0.0.1:1");
        let client = GitHubStatusClient::new(config).unwrap();

        let result = client.push(&push(None)).await;
        assert!(matches!(result, Err(SinkError::Http(_))));
    }
}
