use std::fmt;
use std::str::FromStr;

use kube::api::{
    ApiResource,
    TypeMeta,
};
use serde::{
    Deserialize,
    Serialize,
};

use super::*;

// The closed set of kinds that we know how to wait on.  Ordering is meaningful: it's the order
// that resource sets are iterated in, and thus the order that non-ready resources show up in a
// failure report (parents before the things they own).
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum ResourceKind {
    Deployment,
    ReplicaSet,
    StatefulSet,
    DaemonSet,
    Job,
    Pod,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Deployment,
        ResourceKind::ReplicaSet,
        ResourceKind::StatefulSet,
        ResourceKind::DaemonSet,
        ResourceKind::Job,
        ResourceKind::Pod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "Deployment",
            ResourceKind::ReplicaSet => "ReplicaSet",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::DaemonSet => "DaemonSet",
            ResourceKind::Job => "Job",
            ResourceKind::Pod => "Pod",
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        match self {
            ResourceKind::Deployment => ApiResource::erase::<appsv1::Deployment>(&()),
            ResourceKind::ReplicaSet => ApiResource::erase::<appsv1::ReplicaSet>(&()),
            ResourceKind::StatefulSet => ApiResource::erase::<appsv1::StatefulSet>(&()),
            ResourceKind::DaemonSet => ApiResource::erase::<appsv1::DaemonSet>(&()),
            ResourceKind::Job => ApiResource::erase::<batchv1::Job>(&()),
            ResourceKind::Pod => ApiResource::erase::<corev1::Pod>(&()),
        }
    }

    pub fn type_meta(&self) -> TypeMeta {
        let ar = self.api_resource();
        TypeMeta { api_version: ar.api_version, kind: ar.kind }
    }

    // Both halves have to match; a "Deployment" from some other api group is not something we know
    // how to classify.
    pub fn from_type(api_version: &str, kind: &str) -> Option<ResourceKind> {
        ResourceKind::ALL.into_iter().find(|k| {
            let ar = k.api_resource();
            ar.api_version == api_version && ar.kind == kind
        })
    }

    pub fn of(obj: &DynamicObject) -> anyhow::Result<ResourceKind> {
        let Some(types) = obj.types.as_ref() else {
            bail!(KubernetesError::missing_type_meta(&obj.namespaced_name()));
        };
        ResourceKind::from_type(&types.api_version, &types.kind)
            .ok_or_else(|| KubernetesError::unsupported_kind(&format!("{}.{}", types.api_version, types.kind)))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Parsing is lenient so that command-line users can type `deploy` or `sts` like they would with
// kubectl; serde uses the exact kind names.
impl FromStr for ResourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deployment" | "deployments" | "deploy" => Ok(ResourceKind::Deployment),
            "replicaset" | "replicasets" | "rs" => Ok(ResourceKind::ReplicaSet),
            "statefulset" | "statefulsets" | "sts" => Ok(ResourceKind::StatefulSet),
            "daemonset" | "daemonsets" | "ds" => Ok(ResourceKind::DaemonSet),
            "job" | "jobs" => Ok(ResourceKind::Job),
            "pod" | "pods" | "po" => Ok(ResourceKind::Pod),
            _ => Err(KubernetesError::unsupported_kind(s)),
        }
    }
}
