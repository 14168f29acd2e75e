use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use kube::runtime::watcher::Event;
#[cfg(feature = "mock")]
use mockall::automock;

use super::*;

pub type ObjStream = Pin<Box<dyn Stream<Item = anyhow::Result<Event<DynamicObject>>> + Send>>;

// ClusterAccess is the seam between the readiness engine and the apiserver.  Everything the engine
// needs from the cluster (watches, child listings, events and logs) goes through here, so that the
// engine can be driven entirely by a fake in tests.  Objects handed back must carry their TypeMeta.
#[cfg_attr(feature = "mock", automock)]
#[async_trait]
pub trait ClusterAccess: Send + Sync {
    fn watch(&self, kind: ResourceKind, namespace: &str) -> ObjStream;

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &metav1::LabelSelector,
    ) -> anyhow::Result<Vec<DynamicObject>>;

    async fn events_for(&self, identity: &ResourceIdentity) -> anyhow::Result<Vec<corev1::Event>>;

    async fn container_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        previous: bool,
    ) -> anyhow::Result<String>;
}
