use std::fmt;

use kube::Resource;

use super::*;

// Everything we need to find a resource again (or to tell a human where to look for it).  The uid
// is what the events api keys on; it's optional only because identities can be built for objects
// the apiserver hasn't handed back to us.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ResourceIdentity {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub uid: Option<String>,
}

impl ResourceIdentity {
    pub fn new(kind: ResourceKind, namespace: &str, name: &str) -> ResourceIdentity {
        ResourceIdentity {
            kind,
            namespace: namespace.into(),
            name: name.into(),
            uid: None,
        }
    }

    pub fn of(kind: ResourceKind, obj: &impl Resource) -> ResourceIdentity {
        ResourceIdentity {
            kind,
            namespace: obj.namespace().unwrap_or_default(),
            name: obj.name_any(),
            uid: obj.uid(),
        }
    }

    pub fn namespaced_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}
