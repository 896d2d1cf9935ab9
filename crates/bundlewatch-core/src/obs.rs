//! Structured log events for the watch → correlate → push pipeline.
//!
//! Log lines are the only operator-visible signal of this process, so every
//! drop, reconnect and push decision goes through one of these emitters.
//! Each carries an `event = "<domain>.<action>"` field for filtering.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::{ReferenceError, Rejection, SinkError, WatchError};
use crate::reference::RepoRef;
use crate::sink::StatusPush;

/// Span wrapping a watch task, tagged with the watched collection.
pub fn watch_span(collection: &str) -> tracing::Span {
    tracing::info_span!("bundlewatch.watch", collection = %collection)
}

/// Span wrapping the status dispatcher worker.
pub fn dispatch_span() -> tracing::Span {
    tracing::info_span!("bundlewatch.dispatch")
}

pub fn emit_watch_subscribed(collection: &str) {
    info!(event = "watch.subscribed", collection = %collection, "watching {collection}");
}

/// Transport failure; the channel resubscribes after `retry_in`.
pub fn emit_watch_failed(collection: &str, err: &WatchError, retry_in: Duration) {
    error!(
        event = "watch.failed",
        collection = %collection,
        error = %err,
        retry_in_secs = retry_in.as_secs(),
        "watch on {collection} failed, resubscribing",
    );
}

/// Consumer went away; the watch task stops.
pub fn emit_watch_closed(collection: &str) {
    info!(event = "watch.closed", collection = %collection);
}

pub fn emit_reference_upserted(repo: &RepoRef) {
    info!(
        event = "reference.upserted",
        key = %repo.key,
        owner = %repo.owner,
        repo = %repo.repo_name,
    );
}

pub fn emit_reference_removed(key: &str, existed: bool) {
    info!(event = "reference.removed", key = %key, existed = existed, "GitRepo {key} deleted");
}

pub fn emit_reference_rejected(err: &ReferenceError) {
    warn!(event = "reference.rejected", reason = %err);
}

pub fn emit_deployment_changed(name: &str) {
    debug!(event = "deployment.changed", resource = %name, "BundleDeployment {name} state changed");
}

/// Deployment event dropped without a push.
pub fn emit_deployment_dropped(name: &str, rejection: &Rejection) {
    warn!(
        event = "deployment.dropped",
        resource = %name,
        reason = %rejection,
        "dropping BundleDeployment {name}: {rejection}",
    );
}

pub fn emit_deployment_deleted(name: &str) {
    info!(event = "deployment.deleted", resource = %name, "BundleDeployment {name} deleted");
}

pub fn emit_status_queued(push: &StatusPush) {
    debug!(
        event = "status.queued",
        owner = %push.owner,
        repo = %push.repo_name,
        sha = %push.commit_sha,
        context = %push.context,
        severity = %push.severity,
    );
}

/// Outbound queue at capacity; the newest push is discarded.
pub fn emit_status_queue_full(push: &StatusPush) {
    warn!(
        event = "status.queue_full",
        repo = %format!("{}/{}", push.owner, push.repo_name),
        context = %push.context,
        "status queue full, dropping push for {}",
        push.context,
    );
}

/// Dispatcher worker is gone; the push is discarded.
pub fn emit_status_dispatcher_closed(push: &StatusPush) {
    error!(
        event = "status.dispatcher_closed",
        repo = %format!("{}/{}", push.owner, push.repo_name),
        context = %push.context,
        "status dispatcher stopped, dropping push for {}",
        push.context,
    );
}

pub fn emit_status_pushed(push: &StatusPush) {
    info!(
        event = "status.pushed",
        repo = %format!("{}/{}", push.owner, push.repo_name),
        sha = %push.commit_sha,
        context = %push.context,
        severity = %push.severity,
    );
}

pub fn emit_status_push_failed(push: &StatusPush, err: &SinkError) {
    error!(
        event = "status.push_failed",
        repo = %format!("{}/{}", push.owner, push.repo_name),
        sha = %push.commit_sha,
        context = %push.context,
        error = %err,
    );
}
