//! Resilient subscription to a watched cluster resource collection.
//!
//! A [`WatchChannel`] owns one long-lived subscription and forwards its
//! lifecycle events over a bounded channel to a single consumer. On any
//! transport failure the subscription is discarded, the failure is logged
//! and a fresh subscription is opened after a fixed delay. Events missed
//! during the outage are not replayed; a fresh subscription re-lists the
//! collection, so the consumer converges on current state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::error::WatchError;
use crate::obs;
use crate::resource::ResourceEvent;

/// Wait before resubscribing after a transport failure.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Events of one subscription. An `Err` item ends the subscription.
pub type EventStream = BoxStream<'static, Result<ResourceEvent, WatchError>>;

/// A named resource collection that can be subscribed to.
#[async_trait]
pub trait ResourceCollection: Send + Sync {
    /// Collection name used in logs (`gitrepos`, `bundledeployments`)
    fn name(&self) -> &str;

    /// Open a new subscription.
    async fn subscribe(&self) -> Result<EventStream, WatchError>;
}

#[async_trait]
impl<C: ResourceCollection + ?Sized> ResourceCollection for Arc<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn subscribe(&self) -> Result<EventStream, WatchError> {
        (**self).subscribe().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    pub reconnect_delay: Duration,
    /// Capacity of the channel to the consumer
    pub buffer: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            buffer: 128,
        }
    }
}

pub struct WatchChannel<C> {
    collection: C,
    config: WatchConfig,
}

impl<C: ResourceCollection + 'static> WatchChannel<C> {
    pub fn new(collection: C, config: WatchConfig) -> Self {
        Self { collection, config }
    }

    /// Start the watch task and return the consumer end.
    ///
    /// The task runs until the receiver is dropped.
    pub fn spawn(self) -> mpsc::Receiver<ResourceEvent> {
        let (tx, rx) = mpsc::channel(self.config.buffer.max(1));
        let span = obs::watch_span(self.collection.name());
        tokio::spawn(self.run(tx).instrument(span));
        rx
    }

    async fn run(self, tx: mpsc::Sender<ResourceEvent>) {
        let name = self.collection.name().to_string();
        let delay = self.config.reconnect_delay;

        loop {
            let failure = match self.collection.subscribe().await {
                Ok(mut events) => {
                    obs::emit_watch_subscribed(&name);
                    loop {
                        match events.next().await {
                            Some(Ok(event)) => {
                                if tx.send(event).await.is_err() {
                                    obs::emit_watch_closed(&name);
                                    return;
                                }
                            }
                            Some(Err(err)) => break err,
                            None => break WatchError::Transport("watch stream ended".to_string()),
                        }
                    }
                }
                Err(err) => err,
            };

            obs::emit_watch_failed(&name, &failure, delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = tx.closed() => {
                    obs::emit_watch_closed(&name);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedCollection;
    use crate::resource::ResourceSnapshot;
    use tokio::time::{timeout, Instant};

    fn created(name: &str) -> ResourceEvent {
        ResourceEvent::Created(ResourceSnapshot::new(name))
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_resubscribes_after_delay() {
        let source = Arc::new(
            ScriptedCollection::new("bundledeployments")
                .with_session(vec![
                    Ok(created("a")),
                    Err(WatchError::Transport("connection reset".to_string())),
                    Ok(created("lost")),
                ])
                .with_session(vec![Ok(created("b"))]),
        );
        let mut rx = WatchChannel::new(Arc::clone(&source), WatchConfig::default()).spawn();

        assert_eq!(rx.recv().await.unwrap(), created("a"));
        let failed_at = Instant::now();

        assert!(
            timeout(Duration::from_secs(9), rx.recv()).await.is_err(),
            "no events during the reconnect delay"
        );
        assert_eq!(rx.recv().await.unwrap(), created("b"));
        assert!(failed_at.elapsed() >= DEFAULT_RECONNECT_DELAY);
        assert_eq!(source.subscriptions(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_subscription_is_retried() {
        let source = Arc::new(
            ScriptedCollection::new("gitrepos")
                .with_refusal(WatchError::Server {
                    code: 403,
                    message: "forbidden".to_string(),
                })
                .with_refusal(WatchError::Transport("connection refused".to_string()))
                .with_session(vec![Ok(created("repoA"))]),
        );
        let config = WatchConfig {
            reconnect_delay: Duration::from_secs(3),
            buffer: 4,
        };
        let start = Instant::now();
        let mut rx = WatchChannel::new(Arc::clone(&source), config).spawn();

        assert_eq!(rx.recv().await.unwrap(), created("repoA"));
        assert!(start.elapsed() >= Duration::from_secs(6));
        assert_eq!(source.subscriptions(), 3);
    }

    #[tokio::test]
    async fn test_events_delivered_in_subscription_order() {
        let source = ScriptedCollection::new("gitrepos").with_session(vec![
            Ok(created("one")),
            Ok(ResourceEvent::Modified(ResourceSnapshot::new("one"))),
            Ok(ResourceEvent::Deleted(ResourceSnapshot::new("one"))),
        ]);
        let mut rx = WatchChannel::new(source, WatchConfig::default()).spawn();

        let kinds: Vec<_> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .iter()
        .map(ResourceEvent::kind)
        .collect();
        assert_eq!(
            kinds,
            vec![
                crate::resource::EventKind::Created,
                crate::resource::EventKind::Modified,
                crate::resource::EventKind::Deleted,
            ]
        );
    }
}
