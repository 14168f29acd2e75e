use std::collections::BTreeMap;
use std::sync::Arc;

use kr_core::errors::*;
use kr_core::prelude::*;
use tracing::*;

use crate::errors::WaiterError;
use crate::registry::KindAccessor;
use crate::subscription::WatchSubscription;

struct NamespaceEntry {
    subscription: Arc<WatchSubscription>,
    inclusions: Vec<ResourceMatcher>,
}

/// All of the watch subscriptions for one resource kind, along with the matchers that decide
/// which of the watched objects are in scope.
///
/// Inclusions are bound to a namespace, and there is at most one subscription per namespace no
/// matter how many inclusions point at it.  Exclusions apply across every namespace of the kind.
pub struct MatchableResources {
    accessor: KindAccessor,
    namespaces: BTreeMap<String, NamespaceEntry>,
    exclusions: Vec<ResourceMatcher>,
}

impl MatchableResources {
    pub fn new(accessor: KindAccessor) -> MatchableResources {
        MatchableResources {
            accessor,
            namespaces: BTreeMap::new(),
            exclusions: vec![],
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.accessor.kind()
    }

    pub fn add_matcher(&mut self, matcher: ResourceMatcher) -> EmptyResult {
        let Some(ns) = matcher.namespace() else {
            bail!(WaiterError::unscoped_inclusion(&format!("{} {matcher}", self.kind())));
        };

        let accessor = &self.accessor;
        let entry = self.namespaces.entry(ns.into()).or_insert_with(|| {
            debug!("creating watch subscription for {} in {ns}", accessor.kind());
            NamespaceEntry {
                subscription: Arc::new(WatchSubscription::new(accessor.clone(), ns)),
                inclusions: vec![],
            }
        });
        entry.inclusions.push(matcher);
        Ok(())
    }

    pub fn exclude(&mut self, matcher: ResourceMatcher) {
        self.exclusions.push(matcher);
    }

    pub fn subscriptions(&self) -> Vec<Arc<WatchSubscription>> {
        self.namespaces.values().map(|e| e.subscription.clone()).collect()
    }

    // Iteration order is namespace, then name, so that repeated evaluations list things the same way
    pub fn matching_resources(&self) -> Vec<DynamicObject> {
        self.namespaces
            .values()
            .flat_map(|entry| {
                entry.subscription.objects().into_iter().filter(|obj| {
                    !self.exclusions.iter().any(|m| m.test(obj)) && entry.inclusions.iter().any(|m| m.test(obj))
                })
            })
            .collect()
    }

    pub fn close(&self) {
        for entry in self.namespaces.values() {
            entry.subscription.close();
        }
    }
}

/// A resource set is either a placeholder that only knows about exclusions (nothing has been
/// included for its kind yet, so there's nothing to watch), or a live set of subscriptions.
pub enum ResourceSet {
    Placeholder {
        kind: ResourceKind,
        exclusions: Vec<ResourceMatcher>,
    },
    Active(MatchableResources),
}

impl ResourceSet {
    pub fn placeholder(kind: ResourceKind) -> ResourceSet {
        ResourceSet::Placeholder { kind, exclusions: vec![] }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSet::Placeholder { kind, .. } => *kind,
            ResourceSet::Active(res) => res.kind(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ResourceSet::Active(_))
    }

    pub fn exclude(&mut self, matcher: ResourceMatcher) {
        match self {
            ResourceSet::Placeholder { exclusions, .. } => exclusions.push(matcher),
            ResourceSet::Active(res) => res.exclude(matcher),
        }
    }

    // Upgrading an already-active set is a no-op.
    pub fn upgrade(self, accessor: KindAccessor) -> ResourceSet {
        match self {
            ResourceSet::Placeholder { kind, exclusions } => {
                debug!("upgrading {kind} placeholder with {} exclusion(s)", exclusions.len());
                let mut res = MatchableResources::new(accessor);
                for m in exclusions {
                    res.exclude(m);
                }
                ResourceSet::Active(res)
            },
            active @ ResourceSet::Active(_) => active,
        }
    }

    pub fn add_matcher(&mut self, matcher: ResourceMatcher) -> EmptyResult {
        match self {
            ResourceSet::Placeholder { kind, .. } => {
                bail!("cannot include {kind} resources before the resource set has a watch accessor")
            },
            ResourceSet::Active(res) => res.add_matcher(matcher),
        }
    }

    pub fn subscriptions(&self) -> Vec<Arc<WatchSubscription>> {
        match self {
            ResourceSet::Placeholder { .. } => vec![],
            ResourceSet::Active(res) => res.subscriptions(),
        }
    }

    pub fn matching_resources(&self) -> Vec<DynamicObject> {
        match self {
            ResourceSet::Placeholder { .. } => vec![],
            ResourceSet::Active(res) => res.matching_resources(),
        }
    }

    pub fn close(&self) {
        if let ResourceSet::Active(res) = self {
            res.close();
        }
    }
}
