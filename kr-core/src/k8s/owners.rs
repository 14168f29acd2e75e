use kube::Resource;

use super::*;

// Selector overlap between sibling workloads is common (two deployments both selecting app=web,
// say), so a label match is only a candidate; the owner reference is what actually ties a child to
// its parent.  Parents we haven't seen a uid for own nothing.
pub fn owned_by(child: &impl Resource, parent: &impl Resource) -> bool {
    let Some(parent_uid) = parent.meta().uid.as_deref() else {
        return false;
    };
    child.owner_references().iter().any(|rf| rf.uid == parent_uid)
}
