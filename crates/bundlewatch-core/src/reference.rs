//! Live table of git repositories tracked by Fleet, keyed by GitRepo name.
//!
//! The table is a pure fold over the reference events observed so far. It
//! is not authoritative: after a watch outage it is only as fresh as the
//! last event delivered.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ReferenceError;
use crate::resource::ResourceEvent;

/// JSON pointer of the repository URL inside a GitRepo body.
pub const REPO_URL_POINTER: &str = "/spec/repo";

/// `user@host:owner/repo.git`
const REPO_URL_PATTERN: &str = r"^[\w.\-]+@[\w.\-]+:([^/\s]+)/([^/\s]+)\.git$";

fn repo_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(REPO_URL_PATTERN).expect("repo url pattern is valid"))
}

/// Split an SSH-style git URL into `(owner, repo_name)`.
pub fn parse_repo_url(url: &str) -> Option<(String, String)> {
    let caps = repo_url_regex().captures(url.trim())?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// External repository coordinates for one group key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub key: String,
    pub owner: String,
    pub repo_name: String,
}

/// Effect of one applied reference event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableChange {
    Upserted(RepoRef),
    /// `None` when the key was already absent
    Removed(Option<RepoRef>),
}

#[derive(Debug, Default)]
pub struct ReferenceTable {
    refs: HashMap<String, RepoRef>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one reference event into the table.
    ///
    /// Created/modified events are applied whole or not at all; a rejected
    /// event leaves the table unchanged. Deleting an absent key is a no-op.
    pub fn apply(&mut self, event: &ResourceEvent) -> Result<TableChange, ReferenceError> {
        let snapshot = event.snapshot();
        let key = snapshot
            .name
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ReferenceError::MissingKey)?;

        match event {
            ResourceEvent::Created(_) | ResourceEvent::Modified(_) => {
                let url = snapshot
                    .str_at(REPO_URL_POINTER)
                    .ok_or_else(|| ReferenceError::MissingRepoUrl {
                        key: key.to_string(),
                    })?;
                let (owner, repo_name) =
                    parse_repo_url(url).ok_or_else(|| ReferenceError::UnparseableRepoUrl {
                        key: key.to_string(),
                        url: url.to_string(),
                    })?;
                let repo = RepoRef {
                    key: key.to_string(),
                    owner,
                    repo_name,
                };
                self.refs.insert(repo.key.clone(), repo.clone());
                Ok(TableChange::Upserted(repo))
            }
            ResourceEvent::Deleted(_) => Ok(TableChange::Removed(self.refs.remove(key))),
        }
    }

    pub fn lookup(&self, key: &str) -> Option<&RepoRef> {
        self.refs.get(key)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
