use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use kr_core::k8s::readiness::*;
use kr_core::k8s::{
    ClusterAccess,
    ObjStream,
};
use kr_core::prelude::*;

use crate::errors::WaiterError;

pub type ReadinessFn = fn(&DynamicObject) -> bool;
pub type SelectorFn = fn(&DynamicObject) -> Option<metav1::LabelSelector>;

// Which kind of children a composite resource has, and how to find candidate children for one
// instance of it.  Candidates still have to be confirmed by owner reference.
#[derive(Clone, Copy)]
pub struct ChildDescriptor {
    pub kind: ResourceKind,
    pub selector: SelectorFn,
}

#[derive(Clone, Copy)]
pub struct KindEntry {
    pub kind: ResourceKind,
    pub readiness: ReadinessFn,
    pub children: Option<ChildDescriptor>,
}

impl fmt::Debug for KindEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KindEntry")
            .field("kind", &self.kind)
            .field("children", &self.children.map(|c| c.kind))
            .finish()
    }
}

/// The list/watch accessor for one resource kind; this is what a resource set needs in order to
/// open watch subscriptions, and it's what turns an exclusion-only placeholder into a live set.
#[derive(Clone)]
pub struct KindAccessor {
    kind: ResourceKind,
    access: Arc<dyn ClusterAccess>,
}

impl KindAccessor {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn watch(&self, namespace: &str) -> ObjStream {
        self.access.watch(self.kind, namespace)
    }
}

/// Per-kind readiness and parent/child rules, plus the cluster access used to watch and query
/// resources.  Registries are plain values handed to each waiter; nothing here is global.
#[derive(Clone)]
pub struct KindRegistry {
    access: Arc<dyn ClusterAccess>,
    entries: BTreeMap<ResourceKind, KindEntry>,
}

impl KindRegistry {
    pub fn empty(access: Arc<dyn ClusterAccess>) -> KindRegistry {
        KindRegistry { access, entries: BTreeMap::new() }
    }

    pub fn standard(access: Arc<dyn ClusterAccess>) -> KindRegistry {
        KindRegistry::empty(access)
            .with_entry(KindEntry {
                kind: ResourceKind::Deployment,
                readiness: |obj| ready_as(obj, deployment_ready),
                children: Some(ChildDescriptor {
                    kind: ResourceKind::ReplicaSet,
                    selector: |obj| selector_as(obj, deployment_selector),
                }),
            })
            .with_entry(KindEntry {
                kind: ResourceKind::ReplicaSet,
                readiness: |obj| ready_as(obj, replicaset_ready),
                children: Some(ChildDescriptor {
                    kind: ResourceKind::Pod,
                    selector: |obj| selector_as(obj, replicaset_selector),
                }),
            })
            .with_entry(KindEntry {
                kind: ResourceKind::StatefulSet,
                readiness: |obj| ready_as(obj, statefulset_ready),
                children: Some(ChildDescriptor {
                    kind: ResourceKind::Pod,
                    selector: |obj| selector_as(obj, statefulset_selector),
                }),
            })
            .with_entry(KindEntry {
                kind: ResourceKind::DaemonSet,
                readiness: |obj| ready_as(obj, daemonset_ready),
                children: Some(ChildDescriptor {
                    kind: ResourceKind::Pod,
                    selector: |obj| selector_as(obj, daemonset_selector),
                }),
            })
            .with_entry(KindEntry {
                kind: ResourceKind::Job,
                readiness: |obj| ready_as(obj, job_ready),
                children: Some(ChildDescriptor {
                    kind: ResourceKind::Pod,
                    selector: |obj| selector_as(obj, job_selector),
                }),
            })
            .with_entry(KindEntry {
                kind: ResourceKind::Pod,
                readiness: |obj| ready_as(obj, pod_ready),
                children: None,
            })
    }

    pub fn with_entry(mut self, entry: KindEntry) -> KindRegistry {
        self.entries.insert(entry.kind, entry);
        self
    }

    pub fn entry(&self, kind: ResourceKind) -> anyhow::Result<&KindEntry> {
        self.entries.get(&kind).ok_or_else(|| WaiterError::unregistered_kind(&kind))
    }

    pub fn accessor(&self, kind: ResourceKind) -> anyhow::Result<KindAccessor> {
        self.entry(kind)?;
        Ok(KindAccessor { kind, access: self.access.clone() })
    }

    pub fn access(&self) -> &Arc<dyn ClusterAccess> {
        &self.access
    }

    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.entries.keys().copied()
    }
}
