mod access;
mod identity;
mod kind;
mod kube_access;
mod matcher;
mod owners;
mod pod_ext;
pub mod readiness;
mod util;

pub use access::*;
pub use identity::ResourceIdentity;
pub use kind::ResourceKind;
pub use kube_access::KubeClusterAccess;
pub use matcher::{
    MatchRule,
    ResourceMatcher,
};
pub use owners::*;
pub use pod_ext::{
    LogStream,
    PodExt,
};
pub use util::*;

use crate::errors::*;
use crate::prelude::*;

err_impl! {KubernetesError,
    #[error("field not found in struct: {0}")]
    FieldNotFound(String),

    #[error("malformed label selector: {0:?}")]
    MalformedLabelSelector(metav1::LabelSelectorRequirement),

    #[error("object has no type information: {0}")]
    MissingTypeMeta(String),

    #[error("unsupported resource kind: {0}")]
    UnsupportedKind(String),
}

pub trait KubeResourceExt {
    fn namespaced_name(&self) -> String;
    fn matches(&self, sel: &metav1::LabelSelector) -> anyhow::Result<bool>;
}

#[cfg(test)]
pub mod tests;
