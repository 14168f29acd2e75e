use async_trait::async_trait;
use futures::{
    StreamExt,
    TryStreamExt,
};
use kube::api::{
    ListParams,
    LogParams,
};
use kube::runtime::WatchStreamExt;
use kube::runtime::watcher::{
    self,
    watcher,
};
use tracing::*;

use super::*;

// ClusterAccess backed by a real apiserver.  All the kinds we care about are built in, so unlike a
// general-purpose dynamic client there's no discovery step: the ApiResource for each kind is known
// statically.
#[derive(Clone)]
pub struct KubeClusterAccess {
    client: kube::Client,
}

impl KubeClusterAccess {
    pub fn new(client: kube::Client) -> KubeClusterAccess {
        KubeClusterAccess { client }
    }

    fn dyn_api(&self, kind: ResourceKind, namespace: &str) -> kube::Api<DynamicObject> {
        kube::Api::namespaced_with(self.client.clone(), namespace, &kind.api_resource())
    }
}

#[async_trait]
impl ClusterAccess for KubeClusterAccess {
    fn watch(&self, kind: ResourceKind, namespace: &str) -> ObjStream {
        debug!("opening watch for {kind} in {namespace}");

        // List responses don't include apiVersion/kind on the individual items, so we stamp them
        // back on here; everything downstream relies on being able to recover the kind
        let types = kind.type_meta();
        watcher(self.dyn_api(kind, namespace), watcher::Config::default())
            .default_backoff()
            .modify(move |obj| obj.types = Some(types.clone()))
            .map_err(anyhow::Error::from)
            .boxed()
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &metav1::LabelSelector,
    ) -> anyhow::Result<Vec<DynamicObject>> {
        let lp = ListParams::default().labels(&selector_query(selector)?);
        let types = kind.type_meta();
        let objs = self.dyn_api(kind, namespace).list(&lp).await?;
        Ok(objs
            .items
            .into_iter()
            .map(|mut obj| {
                obj.types = Some(types.clone());
                obj
            })
            .collect())
    }

    async fn events_for(&self, identity: &ResourceIdentity) -> anyhow::Result<Vec<corev1::Event>> {
        let api: kube::Api<corev1::Event> = kube::Api::namespaced(self.client.clone(), &identity.namespace);
        let lp = ListParams::default().fields(&involved_object_query(identity));
        Ok(api.list(&lp).await?.items)
    }

    async fn container_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        previous: bool,
    ) -> anyhow::Result<String> {
        let api: kube::Api<corev1::Pod> = kube::Api::namespaced(self.client.clone(), namespace);
        let lp = LogParams {
            container: Some(container.into()),
            previous,
            pretty: true,
            timestamps: true,
            ..Default::default()
        };
        Ok(api.logs(pod, &lp).await?)
    }
}
