use std::collections::{
    BTreeMap,
    HashMap,
    HashSet,
};
use std::sync::{
    Arc,
    Mutex,
};

use anyhow::anyhow;
use async_trait::async_trait;
use futures::{
    StreamExt,
    stream,
};
use kr_core::k8s::{
    ClusterAccess,
    ObjStream,
};
use kr_core::prelude::*;
use kube::runtime::watcher::Event;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::objs::into_dynamic;

#[derive(Clone, Debug)]
enum Update {
    Applied(DynamicObject),
    Deleted(DynamicObject),
}

type LogKey = (String, String, String, bool);

// An in-memory cluster implementing ClusterAccess.  Watches replay the current objects as an
// initial list and then follow apply/delete calls made through this struct; every watch call is
// recorded so tests can check how many subscriptions were actually opened.
pub struct FakeCluster {
    objects: Mutex<BTreeMap<(ResourceKind, String), BTreeMap<String, DynamicObject>>>,
    events: Mutex<Vec<corev1::Event>>,
    logs: Mutex<HashMap<LogKey, String>>,
    failing_watches: Mutex<HashSet<ResourceKind>>,
    failing_events: Mutex<bool>,
    watch_calls: Mutex<Vec<(ResourceKind, String)>>,
    updates: broadcast::Sender<Update>,
}

impl FakeCluster {
    pub fn new() -> Arc<FakeCluster> {
        let (updates, _) = broadcast::channel(64);
        Arc::new(FakeCluster {
            objects: Mutex::new(BTreeMap::new()),
            events: Mutex::new(vec![]),
            logs: Mutex::new(HashMap::new()),
            failing_watches: Mutex::new(HashSet::new()),
            failing_events: Mutex::new(false),
            watch_calls: Mutex::new(vec![]),
            updates,
        })
    }

    pub fn apply<K: Serialize>(&self, obj: &K) -> DynamicObject {
        let obj = into_dynamic(obj);
        let kind = ResourceKind::of(&obj).unwrap();
        let ns = obj.namespace().unwrap();
        self.objects
            .lock()
            .unwrap()
            .entry((kind, ns))
            .or_default()
            .insert(obj.name_any(), obj.clone());
        let _ = self.updates.send(Update::Applied(obj.clone()));
        obj
    }

    pub fn delete<K: Serialize>(&self, obj: &K) {
        let obj = into_dynamic(obj);
        let kind = ResourceKind::of(&obj).unwrap();
        let ns = obj.namespace().unwrap();
        if let Some(objs) = self.objects.lock().unwrap().get_mut(&(kind, ns)) {
            objs.remove(&obj.name_any());
        }
        let _ = self.updates.send(Update::Deleted(obj));
    }

    pub fn add_event(&self, event: corev1::Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn add_logs(&self, ns: &str, pod: &str, container: &str, previous: bool, text: &str) {
        self.logs
            .lock()
            .unwrap()
            .insert((ns.into(), pod.into(), container.into(), previous), text.into());
    }

    pub fn fail_watches_for(&self, kind: ResourceKind) {
        self.failing_watches.lock().unwrap().insert(kind);
    }

    pub fn fail_events(&self) {
        *self.failing_events.lock().unwrap() = true;
    }

    pub fn watch_calls(&self) -> Vec<(ResourceKind, String)> {
        self.watch_calls.lock().unwrap().clone()
    }

    pub fn watch_count(&self, kind: ResourceKind, ns: &str) -> usize {
        self.watch_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, n)| *k == kind && n == ns)
            .count()
    }
}

#[async_trait]
impl ClusterAccess for FakeCluster {
    fn watch(&self, kind: ResourceKind, namespace: &str) -> ObjStream {
        self.watch_calls.lock().unwrap().push((kind, namespace.into()));
        if self.failing_watches.lock().unwrap().contains(&kind) {
            return stream::once(async { Err::<Event<DynamicObject>, _>(anyhow!("connection refused")) }).boxed();
        }

        // Subscribe before taking the snapshot so nothing applied in between gets lost
        let rx = self.updates.subscribe();
        let current: Vec<_> = self
            .objects
            .lock()
            .unwrap()
            .get(&(kind, namespace.to_string()))
            .map(|objs| objs.values().cloned().collect())
            .unwrap_or_default();

        let initial = std::iter::once(Event::Init)
            .chain(current.into_iter().map(Event::InitApply))
            .chain(std::iter::once(Event::InitDone))
            .map(Ok);

        let ns = namespace.to_string();
        let updates = stream::unfold(rx, move |mut rx| {
            let ns = ns.clone();
            async move {
                loop {
                    let update = match rx.recv().await {
                        Ok(update) => update,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return None,
                    };
                    let (evt, obj) = match update {
                        Update::Applied(obj) => (Event::Apply(obj.clone()), obj),
                        Update::Deleted(obj) => (Event::Delete(obj.clone()), obj),
                    };
                    if ResourceKind::of(&obj).ok() == Some(kind) && obj.namespace().as_deref() == Some(ns.as_str()) {
                        return Some((Ok(evt), rx));
                    }
                }
            }
        });

        stream::iter(initial).chain(updates).boxed()
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &metav1::LabelSelector,
    ) -> anyhow::Result<Vec<DynamicObject>> {
        let objs = self.objects.lock().unwrap();
        let mut matched = vec![];
        for obj in objs.get(&(kind, namespace.to_string())).into_iter().flat_map(|o| o.values()) {
            if obj.matches(selector)? {
                matched.push(obj.clone());
            }
        }
        Ok(matched)
    }

    async fn events_for(&self, identity: &ResourceIdentity) -> anyhow::Result<Vec<corev1::Event>> {
        if *self.failing_events.lock().unwrap() {
            return Err(anyhow!("events api unavailable"));
        }
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| match &identity.uid {
                Some(uid) => e.involved_object.uid.as_ref() == Some(uid),
                None => {
                    e.involved_object.kind.as_deref() == Some(identity.kind.as_str())
                        && e.involved_object.name.as_ref() == Some(&identity.name)
                },
            })
            .cloned()
            .collect())
    }

    async fn container_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        previous: bool,
    ) -> anyhow::Result<String> {
        self.logs
            .lock()
            .unwrap()
            .get(&(namespace.into(), pod.into(), container.into(), previous))
            .cloned()
            .ok_or_else(|| anyhow!("container \"{container}\" in pod \"{pod}\" has no logs (previous={previous})"))
    }
}
