//! In-memory fakes for the sink and collection traits (testing only)
//!
//! Provides `RecordingSink`, `StatusBoard`, `FailingSink` and
//! `ScriptedCollection`, satisfying the trait contracts without a cluster
//! or network.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::error::{SinkError, WatchError};
use crate::resource::ResourceEvent;
use crate::sink::{StatusPush, StatusSink};
use crate::translate::Severity;
use crate::watch::{EventStream, ResourceCollection};

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Records every push in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pushes: Mutex<Vec<StatusPush>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pushes(&self) -> Vec<StatusPush> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn push(&self, status: &StatusPush) -> Result<(), SinkError> {
        self.pushes.lock().unwrap().push(status.clone());
        Ok(())
    }
}

/// Models the external status API: one current status per
/// `(owner, repo, sha, context)`, last write wins.
#[derive(Debug, Default)]
pub struct StatusBoard {
    statuses: Mutex<HashMap<(String, String, String, String), (Severity, String)>>,
    writes: AtomicUsize,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        context: &str,
    ) -> Option<(Severity, String)> {
        let key = (
            owner.to_string(),
            repo.to_string(),
            sha.to_string(),
            context.to_string(),
        );
        self.statuses.lock().unwrap().get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.statuses.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSink for StatusBoard {
    async fn push(&self, status: &StatusPush) -> Result<(), SinkError> {
        let (owner, repo, sha, context) = status.key();
        let key = (
            owner.to_string(),
            repo.to_string(),
            sha.to_string(),
            context.to_string(),
        );
        self.statuses
            .lock()
            .unwrap()
            .insert(key, (status.severity, status.description.clone()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Rejects every push, counting attempts.
#[derive(Debug, Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSink for FailingSink {
    async fn push(&self, _status: &StatusPush) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Rejected {
            status: 502,
            body: "bad gateway".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedCollection
// ---------------------------------------------------------------------------

enum Script {
    Session(Vec<Result<ResourceEvent, WatchError>>),
    Refusal(WatchError),
}

/// Collection whose subscriptions replay a fixed script.
///
/// Each session yields its items and then stays open without further
/// events. Once the script is exhausted, new subscriptions stay silent.
pub struct ScriptedCollection {
    name: String,
    script: Mutex<VecDeque<Script>>,
    subscriptions: AtomicUsize,
}

impl ScriptedCollection {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            subscriptions: AtomicUsize::new(0),
        }
    }

    pub fn with_session(self, items: Vec<Result<ResourceEvent, WatchError>>) -> Self {
        self.script.lock().unwrap().push_back(Script::Session(items));
        self
    }

    /// Next subscribe call fails outright.
    pub fn with_refusal(self, err: WatchError) -> Self {
        self.script.lock().unwrap().push_back(Script::Refusal(err));
        self
    }

    /// Number of subscribe calls so far.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceCollection for ScriptedCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(&self) -> Result<EventStream, WatchError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Script::Session(items)) => Ok(stream::iter(items).chain(stream::pending()).boxed()),
            Some(Script::Refusal(err)) => Err(err),
            None => Ok(stream::pending().boxed()),
        }
    }
}
