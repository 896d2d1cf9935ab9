//! Bundlewatch Core
//!
//! Mirrors Fleet bundle deployment state into commit statuses. Two watched
//! streams feed a single correlator:
//!
//! - GitRepo events maintain a [`ReferenceTable`] of repository coordinates
//! - BundleDeployment events are joined against it, translated by
//!   [`StateTranslator`] and handed to a [`StatusDispatcher`]
//!
//! Cluster and status API backends plug in through [`ResourceCollection`]
//! and [`StatusSink`]; in-memory fakes live in [`fakes`].

pub mod correlator;
pub mod error;
pub mod fakes;
pub mod obs;
pub mod reference;
pub mod resource;
pub mod sink;
pub mod status;
pub mod telemetry;
pub mod translate;
pub mod watch;

pub use correlator::{
    deep_link, Correlator, CorrelatorConfig, DeploymentEvent, COMMIT_LABEL, GROUP_KEY_LABEL,
};
pub use error::{ApiVersionError, DispatchError, ReferenceError, Rejection, SinkError, WatchError};
pub use reference::{parse_repo_url, ReferenceTable, RepoRef, TableChange};
pub use resource::{ApiVersion, EventKind, ResourceEvent, ResourceSnapshot, DEFAULT_API_VERSION};
pub use sink::{DispatchConfig, StatusDispatcher, StatusPush, StatusSink};
pub use status::StatusShape;
pub use telemetry::{default_directives, init_tracing};
pub use translate::{Severity, StateEntry, StateTranslator};
pub use watch::{
    EventStream, ResourceCollection, WatchChannel, WatchConfig, DEFAULT_RECONNECT_DELAY,
};
