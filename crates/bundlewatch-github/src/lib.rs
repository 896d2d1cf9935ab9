//! Bundlewatch GitHub: commit status sink
//!
//! Publishes bundle deployment state as GitHub commit statuses through the
//! REST API (`POST /repos/{owner}/{repo}/statuses/{sha}`). A status is keyed
//! by its `context`, so re-posting simply replaces the previous one.

mod client;
mod error;

pub use client::{CommitStatusBody, GitHubConfig, GitHubStatusClient, DEFAULT_API_URL};
pub use error::GitHubError;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, GitHubError>;
