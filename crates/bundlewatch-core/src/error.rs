//! Error types for bundlewatch-core

use thiserror::Error;

/// Malformed `<group>/<version>` string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid API version {0:?}: expected <group>/<version>")]
pub struct ApiVersionError(pub String);

/// Transport-level failures of a watch subscription.
///
/// Every variant is recoverable: the watch channel logs it and resubscribes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    /// Connection could not be established or dropped mid-stream
    #[error("watch transport failed: {0}")]
    Transport(String),

    /// An event could not be decoded
    #[error("watch event could not be decoded: {0}")]
    Decode(String),

    /// The server terminated the watch with an error status
    #[error("watch terminated by server ({code}): {message}")]
    Server { code: u16, message: String },
}

/// Reasons a reference event is rejected without touching the table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// Reference resource has no `metadata.name`
    #[error("reference resource missing metadata")]
    MissingKey,

    /// Reference resource has no `spec.repo`
    #[error("reference {key} missing spec.repo")]
    MissingRepoUrl { key: String },

    /// `spec.repo` is not an SSH-style `host:owner/repo.git` URL
    #[error("reference {key} has unparseable repo url {url:?}")]
    UnparseableRepoUrl { key: String, url: String },
}

/// Reasons a deployment event is dropped before any status is pushed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Name, group-key label or commit label is absent
    #[error("missing metadata: {missing}")]
    MissingMetadata { missing: &'static str },

    /// No reference resource has been observed for the group key
    #[error("reference not found for {group_key}")]
    ReferenceNotFound { group_key: String },

    /// Neither the nested nor the flat status field is present
    #[error("missing status")]
    MissingStatus,

    /// State label has no entry in the translation table
    #[error("unknown state {raw_state}")]
    UnknownState { raw_state: String },
}

/// Failures pushing a status to the external API.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Request could not be sent or the response not read
    #[error("status API request failed: {0}")]
    Http(String),

    /// API answered with a non-success status code
    #[error("status API rejected push ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Failure to enqueue a status push.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Outbound queue is at capacity; the newest push is dropped
    #[error("outbound status queue is full")]
    QueueFull,

    /// Dispatcher worker has stopped
    #[error("status dispatcher is closed")]
    Closed,
}
