//! Joins the deployment stream against the reference table and turns each
//! resolvable state change into a commit status push.
//!
//! Every deployment event is evaluated on its own against the table as it
//! stands: there is no per-resource history, no retry queue and no ordering
//! across the two streams. A deployment seen before its GitRepo is dropped
//! as `reference not found`.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::Rejection;
use crate::obs;
use crate::reference::{ReferenceTable, TableChange};
use crate::resource::{ApiVersion, ResourceEvent, ResourceSnapshot};
use crate::sink::{StatusDispatcher, StatusPush};
use crate::status::StatusShape;
use crate::translate::StateTranslator;

/// Label linking a BundleDeployment to its GitRepo.
pub const GROUP_KEY_LABEL: &str = "fleet.cattle.io/repo-name";
/// Label carrying the deployed commit.
pub const COMMIT_LABEL: &str = "fleet.cattle.io/commit";

/// A deployment state change with everything needed to report it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentEvent {
    pub group_key: String,
    pub resource_name: String,
    pub namespace: String,
    pub commit_sha: String,
    pub raw_state: String,
}

#[derive(Debug, Clone, Default)]
pub struct CorrelatorConfig {
    pub api: ApiVersion,
    /// Base of the human-facing deep link put in `target_url`
    pub explorer_url: Option<String>,
}

/// `<base>/<group>.bundledeployment/<namespace>/<name>`
pub fn deep_link(base: &str, group: &str, namespace: &str, name: &str) -> String {
    format!(
        "{}/{}.bundledeployment/{}/{}",
        base.trim_end_matches('/'),
        group,
        namespace,
        name
    )
}

pub struct Correlator {
    references: ReferenceTable,
    translator: StateTranslator,
    config: CorrelatorConfig,
    dispatcher: StatusDispatcher,
}

impl Correlator {
    pub fn new(
        translator: StateTranslator,
        config: CorrelatorConfig,
        dispatcher: StatusDispatcher,
    ) -> Self {
        Self {
            references: ReferenceTable::new(),
            translator,
            config,
            dispatcher,
        }
    }

    pub fn references(&self) -> &ReferenceTable {
        &self.references
    }

    /// Consume both streams until they close.
    ///
    /// Each event is handled to completion before the next is taken; the two
    /// streams are interleaved in whatever order they become ready.
    pub async fn run(
        mut self,
        mut references: mpsc::Receiver<ResourceEvent>,
        mut deployments: mpsc::Receiver<ResourceEvent>,
    ) {
        let mut references_open = true;
        let mut deployments_open = true;

        while references_open || deployments_open {
            tokio::select! {
                event = references.recv(), if references_open => match event {
                    Some(event) => self.on_reference_event(event),
                    None => {
                        warn!(event = "watch.ended", stream = "references");
                        references_open = false;
                    }
                },
                event = deployments.recv(), if deployments_open => match event {
                    Some(event) => self.on_deployment_event(event),
                    None => {
                        warn!(event = "watch.ended", stream = "deployments");
                        deployments_open = false;
                    }
                },
            }
        }
    }

    pub fn on_reference_event(&mut self, event: ResourceEvent) {
        match self.references.apply(&event) {
            Ok(TableChange::Upserted(repo)) => obs::emit_reference_upserted(&repo),
            Ok(TableChange::Removed(prev)) => {
                obs::emit_reference_removed(event.snapshot().display_name(), prev.is_some())
            }
            Err(err) => obs::emit_reference_rejected(&err),
        }
    }

    pub fn on_deployment_event(&mut self, event: ResourceEvent) {
        let snapshot = match event {
            ResourceEvent::Deleted(snapshot) => {
                obs::emit_deployment_deleted(snapshot.display_name());
                return;
            }
            ResourceEvent::Created(snapshot) | ResourceEvent::Modified(snapshot) => snapshot,
        };

        obs::emit_deployment_changed(snapshot.display_name());
        match self.correlate(&snapshot) {
            Ok(push) => {
                // queued, full and closed are all logged by the dispatcher
                let _ = self.dispatcher.submit(push);
            }
            Err(rejection) => obs::emit_deployment_dropped(snapshot.display_name(), &rejection),
        }
    }

    /// Resolve a deployment snapshot into a status push, or say why not.
    pub fn correlate(&self, snapshot: &ResourceSnapshot) -> Result<StatusPush, Rejection> {
        let resource_name = present(snapshot.name.as_deref(), "metadata.name")?;
        let group_key = present(snapshot.label(GROUP_KEY_LABEL), GROUP_KEY_LABEL)?;
        let commit_sha = present(snapshot.label(COMMIT_LABEL), COMMIT_LABEL)?;

        let repo = self
            .references
            .lookup(group_key)
            .ok_or_else(|| Rejection::ReferenceNotFound {
                group_key: group_key.to_string(),
            })?;

        let raw_state = StatusShape::detect(&snapshot.body)
            .raw_state()
            .ok_or(Rejection::MissingStatus)?;

        let event = DeploymentEvent {
            group_key: group_key.to_string(),
            resource_name: resource_name.to_string(),
            namespace: snapshot.namespace.clone().unwrap_or_default(),
            commit_sha: commit_sha.to_string(),
            raw_state: raw_state.to_string(),
        };

        let entry = self
            .translator
            .translate(&event.raw_state)
            .ok_or_else(|| Rejection::UnknownState {
                raw_state: event.raw_state.clone(),
            })?;

        let target_url = self.config.explorer_url.as_deref().map(|base| {
            deep_link(
                base,
                &self.config.api.group,
                &event.namespace,
                &event.resource_name,
            )
        });

        Ok(StatusPush {
            owner: repo.owner.clone(),
            repo_name: repo.repo_name.clone(),
            commit_sha: event.commit_sha,
            context: event.resource_name,
            severity: entry.severity,
            description: entry.description.to_string(),
            target_url,
        })
    }
}

/// Empty metadata values count as missing.
fn present<'a>(value: Option<&'a str>, missing: &'static str) -> Result<&'a str, Rejection> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(Rejection::MissingMetadata { missing })
}
