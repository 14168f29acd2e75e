use async_recursion::async_recursion;
use kr_core::k8s::{
    PodExt,
    owned_by,
};
use kr_core::prelude::*;

use crate::diagnostics::{
    LogLine,
    ResourceDiagnostics,
    ResourceEvent,
    Trail,
    parse_log_lines,
};
use crate::registry::{
    KindEntry,
    KindRegistry,
};

/// A snapshot of one matched resource, together with the rules for its kind.
///
/// These are rebuilt from the subscription caches on every poll and hold no state of their own;
/// events, children and logs are queried fresh from the cluster each time they're asked for.
pub struct AwaitableResource {
    identity: ResourceIdentity,
    obj: DynamicObject,
    entry: KindEntry,
    registry: KindRegistry,
}

impl AwaitableResource {
    pub fn new(obj: DynamicObject, registry: &KindRegistry) -> anyhow::Result<AwaitableResource> {
        let kind = ResourceKind::of(&obj)?;
        let entry = *registry.entry(kind)?;
        Ok(AwaitableResource {
            identity: ResourceIdentity::of(kind, &obj),
            obj,
            entry,
            registry: registry.clone(),
        })
    }

    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    pub fn object(&self) -> &DynamicObject {
        &self.obj
    }

    // Readiness only ever looks at this resource's own status; children are for diagnostics.
    pub fn is_ready(&self) -> bool {
        (self.entry.readiness)(&self.obj)
    }

    pub async fn children(&self) -> anyhow::Result<Vec<AwaitableResource>> {
        let Some(child) = self.entry.children else {
            return Ok(vec![]);
        };
        let Some(selector) = (child.selector)(&self.obj) else {
            return Ok(vec![]);
        };

        let candidates = self
            .registry
            .access()
            .list(child.kind, &self.identity.namespace, &selector)
            .await?;

        candidates
            .into_iter()
            .filter(|c| owned_by(c, &self.obj))
            .map(|c| AwaitableResource::new(c, &self.registry))
            .collect()
    }

    #[async_recursion]
    pub async fn events(&self) -> Trail<ResourceEvent> {
        let mut trail = Trail::default();
        match self.registry.access().events_for(&self.identity).await {
            Ok(events) => {
                let mut events: Vec<_> = events.iter().map(|e| ResourceEvent::new(&self.identity, e)).collect();
                events.sort_by_key(|e| e.first_seen);
                trail.items = events;
            },
            Err(err) => trail.warn(format!("could not read events for {}: {err:#}", self.identity)),
        }

        for child in self.children_or_warn(&mut trail).await {
            trail.append(child.events().await);
        }
        trail
    }

    #[async_recursion]
    pub async fn logs(&self) -> Trail<LogLine> {
        if self.identity.kind == ResourceKind::Pod {
            return self.pod_logs().await;
        }

        let mut trail = Trail::default();
        for child in self.children_or_warn(&mut trail).await {
            trail.append(child.logs().await);
        }
        trail
    }

    pub async fn diagnostics(&self) -> ResourceDiagnostics {
        let events = self.events().await;
        let logs = self.logs().await;
        ResourceDiagnostics {
            identity: self.identity.clone(),
            events: events.items,
            logs: logs.items,
            warnings: events.warnings.into_iter().chain(logs.warnings).collect(),
        }
    }

    async fn children_or_warn<T>(&self, trail: &mut Trail<T>) -> Vec<AwaitableResource> {
        match self.children().await {
            Ok(children) => children,
            Err(err) => {
                trail.warn(format!("could not list children of {}: {err:#}", self.identity));
                vec![]
            },
        }
    }

    async fn pod_logs(&self) -> Trail<LogLine> {
        let mut trail = Trail::default();
        let pod = match self.obj.clone().try_parse::<corev1::Pod>() {
            Ok(pod) => pod,
            Err(err) => {
                trail.warn(format!("could not parse {} as a pod: {err}", self.identity));
                return trail;
            },
        };

        for stream in pod.log_streams() {
            let res = self
                .registry
                .access()
                .container_logs(&self.identity.namespace, &self.identity.name, &stream.container, stream.previous)
                .await;
            match res {
                Ok(text) => trail.items.extend(parse_log_lines(&self.identity, &stream, &text)),
                Err(err) => {
                    let instance = if stream.previous { "previous" } else { "current" };
                    trail.warn(format!(
                        "could not read {instance} logs for container {} of {}: {err:#}",
                        stream.container, self.identity
                    ))
                },
            }
        }
        trail
    }
}
