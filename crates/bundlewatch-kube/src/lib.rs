//! Bundlewatch Kube: Fleet custom resources as watchable collections
//!
//! [`KubeCollection`] implements [`ResourceCollection`] over a cluster-wide
//! dynamic custom resource API. A subscription lists the collection first,
//! delivering every existing object as `Created`, then follows a watch from
//! the list's resource version.
//!
//! Orderly watch timeouts are re-opened transparently from the last seen
//! resource version. Anything else (failed request, error event, decode
//! failure) ends the subscription with a [`WatchError`] and is left to the
//! watch channel's reconnect policy. So does a server that keeps closing
//! fresh watches at once without sending anything.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use kube::api::{Api, ApiResource, DynamicObject, ListParams, WatchParams};
use kube::core::{GroupVersionKind, WatchEvent};
use kube::Client;
use tracing::debug;

use bundlewatch_core::{
    ApiVersion, EventStream, ResourceCollection, ResourceEvent, ResourceSnapshot, WatchError,
};

/// Server-side watch timeout; the watch is re-opened when it elapses.
pub const WATCH_TIMEOUT_SECS: u32 = 290;

/// A window closing sooner than this with nothing in it counts as refused.
const MIN_WINDOW: Duration = Duration::from_secs(1);
/// Refused windows in a row before the subscription fails.
const MAX_REFUSED_WINDOWS: u32 = 3;

/// Kind and plural of a custom resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionKind {
    pub kind: &'static str,
    pub plural: &'static str,
}

/// Fleet GitRepo resources (reference stream)
pub const GIT_REPOS: CollectionKind = CollectionKind {
    kind: "GitRepo",
    plural: "gitrepos",
};

/// Fleet BundleDeployment resources (deployment stream)
pub const BUNDLE_DEPLOYMENTS: CollectionKind = CollectionKind {
    kind: "BundleDeployment",
    plural: "bundledeployments",
};

/// Build the dynamic API resource for a collection under `api`.
pub fn api_resource(api: &ApiVersion, collection: CollectionKind) -> ApiResource {
    let gvk = GroupVersionKind::gvk(&api.group, &api.version, collection.kind);
    ApiResource::from_gvk_with_plural(&gvk, collection.plural)
}

/// Convert a dynamic object into a backend-neutral snapshot.
pub fn to_snapshot(obj: DynamicObject) -> ResourceSnapshot {
    let DynamicObject { metadata, data, .. } = obj;
    ResourceSnapshot {
        name: metadata.name,
        namespace: metadata.namespace,
        labels: metadata.labels.unwrap_or_default(),
        resource_version: metadata.resource_version,
        body: data,
    }
}

/// Map client errors onto the watch error taxonomy.
pub fn to_watch_error(err: kube::Error) -> WatchError {
    match err {
        kube::Error::Api(resp) => WatchError::Server {
            code: resp.code,
            message: resp.message,
        },
        kube::Error::SerdeError(e) => WatchError::Decode(e.to_string()),
        other => WatchError::Transport(other.to_string()),
    }
}

/// A cluster-wide custom resource collection.
#[derive(Clone)]
pub struct KubeCollection {
    api: Api<DynamicObject>,
    name: String,
}

impl KubeCollection {
    pub fn new(client: Client, api: &ApiVersion, collection: CollectionKind) -> Self {
        let resource = api_resource(api, collection);
        Self {
            api: Api::all_with(client, &resource),
            name: collection.plural.to_string(),
        }
    }
}

type RawWatch = BoxStream<'static, kube::Result<WatchEvent<DynamicObject>>>;

/// State carried between items of the follow-up watch.
struct Follow {
    api: Api<DynamicObject>,
    params: WatchParams,
    resource_version: String,
    watch: Option<RawWatch>,
    opened_at: Instant,
    window_items: usize,
    refused_windows: u32,
    failed: bool,
}

impl Follow {
    fn new(api: Api<DynamicObject>, resource_version: String) -> Self {
        Follow {
            api,
            params: WatchParams::default().timeout(WATCH_TIMEOUT_SECS),
            resource_version,
            watch: None,
            opened_at: Instant::now(),
            window_items: 0,
            refused_windows: 0,
            failed: false,
        }
    }

    fn emit(
        mut self,
        wrap: fn(ResourceSnapshot) -> ResourceEvent,
        obj: DynamicObject,
    ) -> Option<(Result<ResourceEvent, WatchError>, Follow)> {
        if let Some(rv) = obj.metadata.resource_version.clone() {
            self.resource_version = rv;
        }
        Some((Ok(wrap(to_snapshot(obj))), self))
    }

    fn fail(mut self, err: WatchError) -> Option<(Result<ResourceEvent, WatchError>, Follow)> {
        self.failed = true;
        self.watch = None;
        Some((Err(err), self))
    }

    /// Book-keeping for a window the server closed; `Err` once the server
    /// has refused too many windows in a row.
    fn window_closed(&mut self) -> Result<(), WatchError> {
        self.watch = None;
        if self.window_items > 0 || self.opened_at.elapsed() >= MIN_WINDOW {
            self.refused_windows = 0;
            return Ok(());
        }
        self.refused_windows += 1;
        if self.refused_windows >= MAX_REFUSED_WINDOWS {
            return Err(WatchError::Transport(format!(
                "watch closed without events {} times in a row",
                self.refused_windows
            )));
        }
        Ok(())
    }

    async fn next(mut self) -> Option<(Result<ResourceEvent, WatchError>, Follow)> {
        if self.failed {
            return None;
        }
        loop {
            if self.watch.is_none() {
                match self.api.watch(&self.params, &self.resource_version).await {
                    Ok(events) => self.watch = Some(events.boxed()),
                    Err(err) => return self.fail(to_watch_error(err)),
                }
                self.opened_at = Instant::now();
                self.window_items = 0;
            }
            let item = match self.watch.as_mut() {
                Some(events) => events.next().await,
                None => continue,
            };
            if item.is_some() {
                self.window_items += 1;
            }

            match item {
                Some(Ok(WatchEvent::Added(obj))) => return self.emit(ResourceEvent::Created, obj),
                Some(Ok(WatchEvent::Modified(obj))) => {
                    return self.emit(ResourceEvent::Modified, obj)
                }
                Some(Ok(WatchEvent::Deleted(obj))) => return self.emit(ResourceEvent::Deleted, obj),
                Some(Ok(WatchEvent::Bookmark(bookmark))) => {
                    self.resource_version = bookmark.metadata.resource_version;
                }
                Some(Ok(WatchEvent::Error(resp))) => {
                    return self.fail(WatchError::Server {
                        code: resp.code,
                        message: resp.message,
                    })
                }
                Some(Err(err)) => return self.fail(to_watch_error(err)),
                None => {
                    if let Err(err) = self.window_closed() {
                        return self.fail(err);
                    }
                    debug!(
                        resource_version = %self.resource_version,
                        "watch window closed, re-opening"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl ResourceCollection for KubeCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(&self) -> Result<EventStream, WatchError> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .map_err(to_watch_error)?;
        let resource_version = list.metadata.resource_version.clone().unwrap_or_default();
        debug!(
            collection = %self.name,
            items = list.items.len(),
            resource_version = %resource_version,
            "listed collection"
        );

        let initial = stream::iter(
            list.items
                .into_iter()
                .map(|obj| Ok(ResourceEvent::Created(to_snapshot(obj)))),
        );
        let follow = Follow::new(self.api.clone(), resource_version);
        let watched = stream::unfold(follow, Follow::next);

        Ok(initial.chain(watched).boxed())
    }
}
