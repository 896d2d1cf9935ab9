//! Cluster resource snapshots and the lifecycle events carrying them.
//!
//! Watch backends translate their native objects into [`ResourceSnapshot`]
//! so the correlation layer never depends on a particular cluster client.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiVersionError;

/// Default API group/version of the Fleet custom resources.
pub const DEFAULT_API_VERSION: &str = "fleet.cattle.io/v1alpha1";

/// `<group>/<version>` pair addressing a custom resource API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersion {
    pub group: String,
    pub version: String,
}

impl ApiVersion {
    pub fn new(group: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
        }
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        // DEFAULT_API_VERSION is well-formed
        Self::new("fleet.cattle.io", "v1alpha1")
    }
}

impl FromStr for ApiVersion {
    type Err = ApiVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((group, version))
                if !group.is_empty() && !version.is_empty() && !version.contains('/') =>
            {
                Ok(Self::new(group, version))
            }
            _ => Err(ApiVersionError(s.to_string())),
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.version)
    }
}

/// Point-in-time view of one cluster resource.
///
/// `body` holds everything outside `metadata` (`spec`, `status`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub name: Option<String>,
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub resource_version: Option<String>,
    #[serde(default)]
    pub body: Value,
}

impl ResourceSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Look up a string field in `body` by JSON pointer (`/spec/repo`).
    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.body.pointer(pointer).and_then(Value::as_str)
    }

    /// Name for log lines; `<unnamed>` when metadata lacks one.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// Lifecycle event kind delivered by a watch stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Modified,
    Deleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Created => "created",
            EventKind::Modified => "modified",
            EventKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// One lifecycle event from a watched collection.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    Created(ResourceSnapshot),
    Modified(ResourceSnapshot),
    Deleted(ResourceSnapshot),
}

impl ResourceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ResourceEvent::Created(_) => EventKind::Created,
            ResourceEvent::Modified(_) => EventKind::Modified,
            ResourceEvent::Deleted(_) => EventKind::Deleted,
        }
    }

    pub fn snapshot(&self) -> &ResourceSnapshot {
        match self {
            ResourceEvent::Created(s) | ResourceEvent::Modified(s) | ResourceEvent::Deleted(s) => s,
        }
    }

    pub fn into_snapshot(self) -> ResourceSnapshot {
        match self {
            ResourceEvent::Created(s) | ResourceEvent::Modified(s) | ResourceEvent::Deleted(s) => s,
        }
    }
}
