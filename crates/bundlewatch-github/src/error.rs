//! Error types for bundlewatch-github

use bundlewatch_core::SinkError;
use thiserror::Error;

/// Errors talking to the GitHub REST API
#[derive(Error, Debug)]
pub enum GitHubError {
    /// HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// Request failed before a response was received
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success response
    #[error("GitHub API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body did not match the expected shape
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GitHubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GitHubError::Decode(err.to_string())
        } else {
            GitHubError::Http(err.to_string())
        }
    }
}

impl From<GitHubError> for SinkError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::Api { status, body } => SinkError::Rejected { status, body },
            other => SinkError::Http(other.to_string()),
        }
    }
}
