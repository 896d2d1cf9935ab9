//! Outbound commit status pushes.
//!
//! - `StatusSink`: backend-agnostic idempotent upsert of one status
//! - `StatusDispatcher`: bounded queue + worker so the correlator never
//!   waits on the external API
//!
//! Failed pushes are logged and forgotten; nothing here retries.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::{DispatchError, SinkError};
use crate::obs;
use crate::translate::Severity;

/// One commit status to upsert.
///
/// `(owner, repo_name, commit_sha, context)` identifies the status on the
/// external side; pushing the same key again overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPush {
    pub owner: String,
    pub repo_name: String,
    pub commit_sha: String,
    /// BundleDeployment name
    pub context: String,
    pub severity: Severity,
    pub description: String,
    pub target_url: Option<String>,
}

impl StatusPush {
    pub fn key(&self) -> (&str, &str, &str, &str) {
        (&self.owner, &self.repo_name, &self.commit_sha, &self.context)
    }
}

/// External status API.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn push(&self, status: &StatusPush) -> Result<(), SinkError>;
}

#[async_trait]
impl<S: StatusSink + ?Sized> StatusSink for Arc<S> {
    async fn push(&self, status: &StatusPush) -> Result<(), SinkError> {
        (**self).push(status).await
    }
}

/// Dispatcher sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Pushes waiting for a worker slot
    pub queue_capacity: usize,
    /// Concurrent calls against the sink
    pub max_in_flight: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_in_flight: 4,
        }
    }
}

/// Handle to the outbound push queue.
///
/// The worker task exits once every handle is dropped and the queue has
/// drained, so awaiting the returned `JoinHandle` flushes pending pushes.
#[derive(Debug, Clone)]
pub struct StatusDispatcher {
    tx: mpsc::Sender<StatusPush>,
}

impl StatusDispatcher {
    pub fn spawn<S>(sink: S, config: DispatchConfig) -> (Self, JoinHandle<()>)
    where
        S: StatusSink + 'static,
    {
        let (tx, mut rx) = mpsc::channel(config.queue_capacity.max(1));
        let sink = Arc::new(sink);
        let max_in_flight = config.max_in_flight.max(1);

        let drain = async move {
            stream::poll_fn(move |cx| rx.poll_recv(cx))
                .for_each_concurrent(max_in_flight, |push| {
                    let sink = Arc::clone(&sink);
                    async move {
                        match sink.push(&push).await {
                            Ok(()) => obs::emit_status_pushed(&push),
                            Err(err) => obs::emit_status_push_failed(&push, &err),
                        }
                    }
                })
                .await;
        };
        let worker = tokio::spawn(drain.instrument(obs::dispatch_span()));

        (Self { tx }, worker)
    }

    /// Enqueue without waiting. A full queue rejects the newest push.
    ///
    /// Every outcome is logged here, so callers may ignore the result.
    pub fn submit(&self, push: StatusPush) -> Result<(), DispatchError> {
        match self.tx.try_reserve() {
            Ok(permit) => {
                obs::emit_status_queued(&push);
                permit.send(push);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(())) => {
                obs::emit_status_queue_full(&push);
                Err(DispatchError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                obs::emit_status_dispatcher_closed(&push);
                Err(DispatchError::Closed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FailingSink, RecordingSink};
    use tracing_test::traced_test;

    fn push(context: &str) -> StatusPush {
        StatusPush {
            owner: "acme".to_string(),
            repo_name: "widget".to_string(),
            commit_sha: "abc123".to_string(),
            context: context.to_string(),
            severity: Severity::Success,
            description: "Bundle deployment succeeded".to_string(),
            target_url: None,
        }
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_all_pushes() {
        let sink = Arc::new(RecordingSink::new());
        let (dispatcher, worker) = StatusDispatcher::spawn(sink.clone(), DispatchConfig::default());

        for i in 0..5 {
            dispatcher.submit(push(&format!("bd-{i}"))).unwrap();
        }
        drop(dispatcher);
        worker.await.unwrap();

        let mut contexts: Vec<_> = sink.pushes().into_iter().map(|p| p.context).collect();
        contexts.sort();
        assert_eq!(contexts, vec!["bd-0", "bd-1", "bd-2", "bd-3", "bd-4"]);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_newest() {
        let sink = Arc::new(RecordingSink::new());
        let config = DispatchConfig {
            queue_capacity: 2,
            max_in_flight: 1,
        };
        let (dispatcher, worker) = StatusDispatcher::spawn(sink.clone(), config);

        // current-thread runtime: the worker cannot drain until we yield
        assert!(dispatcher.submit(push("first")).is_ok());
        assert!(dispatcher.submit(push("second")).is_ok());
        assert_eq!(
            dispatcher.submit(push("third")),
            Err(DispatchError::QueueFull)
        );

        drop(dispatcher);
        worker.await.unwrap();
        let contexts: Vec<_> = sink.pushes().into_iter().map(|p| p.context).collect();
        assert_eq!(contexts, vec!["first", "second"]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_push_does_not_stop_worker() {
        let sink = Arc::new(FailingSink::new());
        let (dispatcher, worker) = StatusDispatcher::spawn(sink.clone(), DispatchConfig::default());

        dispatcher.submit(push("one")).unwrap();
        dispatcher.submit(push("two")).unwrap();
        drop(dispatcher);
        worker.await.unwrap();

        assert_eq!(sink.attempts(), 2);
        assert!(logs_contain("status.push_failed"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_stopped_worker_rejects_and_logs() {
        let sink = Arc::new(RecordingSink::new());
        let (dispatcher, worker) = StatusDispatcher::spawn(sink.clone(), DispatchConfig::default());
        worker.abort();
        assert!(worker.await.unwrap_err().is_cancelled());

        assert_eq!(dispatcher.submit(push("late")), Err(DispatchError::Closed));
        assert!(sink.pushes().is_empty());
        assert!(logs_contain("status.dispatcher_closed"));
        assert!(!logs_contain("status.queued"));
    }
}
