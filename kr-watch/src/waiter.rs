use std::collections::BTreeMap;
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
};
use std::time::Duration;

use futures::future::try_join_all;
use kr_core::errors::*;
use kr_core::prelude::*;
use tokio::sync::watch;
use tokio::time::{
    Instant,
    sleep_until,
    timeout_at,
};
use tracing::*;

use crate::awaitable::AwaitableResource;
use crate::config::WaitConfig;
use crate::diagnostics::WaitReport;
use crate::errors::WaiterError;
use crate::install::{
    InstallResult,
    inclusions_from_install,
};
use crate::registry::KindRegistry;
use crate::resource_set::ResourceSet;
use crate::subscription::WatchSubscription;

/// The wait ran out of time; `report` describes the resources that were not ready at the last
/// completed evaluation.
#[derive(Debug, Error)]
#[error(
    "timed out after {} waiting for {} resource(s) to become ready ({evaluations} checks)",
    humantime::format_duration(*.timeout),
    .report.resources.len()
)]
pub struct WaitTimeout {
    pub timeout: Duration,
    pub evaluations: usize,
    pub report: WaitReport,
}

/// The waiter was closed while a wait was in progress.
#[derive(Debug, Error)]
#[error(
    "waiter closed while waiting for {} resource(s) to become ready ({evaluations} checks)",
    .report.resources.len()
)]
pub struct WaitCancelled {
    pub evaluations: usize,
    pub report: WaitReport,
}

/// Waits for a configurable set of resources to become ready.
///
/// Resources are declared with [`ReadinessWaiter::include`] and [`ReadinessWaiter::exclude`];
/// nothing talks to the cluster until the first call to [`ReadinessWaiter::resources`] (or one of
/// the waits built on it), which starts every watch subscription and waits for all of them to
/// sync.  [`ReadinessWaiter::close`] releases the subscriptions; it can be called from another
/// task while a wait is in flight, and dropping the waiter closes it as well.
pub struct ReadinessWaiter {
    registry: KindRegistry,
    sets: Mutex<BTreeMap<ResourceKind, ResourceSet>>,
    closed: watch::Sender<bool>,
}

impl ReadinessWaiter {
    pub fn new(registry: KindRegistry) -> ReadinessWaiter {
        let (closed, _) = watch::channel(false);
        ReadinessWaiter { registry, sets: Mutex::new(BTreeMap::new()), closed }
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    pub fn include(&self, kind: ResourceKind, matcher: ResourceMatcher) -> EmptyResult {
        self.ensure_open("include")?;
        let accessor = self.registry.accessor(kind)?;
        if matcher.namespace().is_none() {
            bail!(WaiterError::unscoped_inclusion(&format!("{kind} {matcher}")));
        }

        debug!("including {kind} resources: {matcher}");
        let mut sets = self.lock_sets();
        let set = sets.remove(&kind).unwrap_or_else(|| ResourceSet::placeholder(kind));
        let mut set = set.upgrade(accessor);
        let res = set.add_matcher(matcher);
        sets.insert(kind, set);
        res
    }

    pub fn exclude(&self, kind: ResourceKind, matcher: ResourceMatcher) -> EmptyResult {
        self.ensure_open("exclude")?;
        self.registry.entry(kind)?;

        debug!("excluding {kind} resources: {matcher}");
        self.lock_sets()
            .entry(kind)
            .or_insert_with(|| ResourceSet::placeholder(kind))
            .exclude(matcher);
        Ok(())
    }

    pub fn include_install(&self, install: &InstallResult) -> EmptyResult {
        info!(
            "including resources from release {} (revision {}) in {}",
            install.release_name, install.revision, install.namespace
        );
        for (kind, matcher) in inclusions_from_install(install, &self.registry)? {
            self.include(kind, matcher)?;
        }
        Ok(())
    }

    /// Start every subscription (if they aren't running already), wait for all of them to sync,
    /// and return the resources that are currently matched.  The result reflects the caches at the
    /// time of the call and is never reused.
    pub async fn resources(&self) -> anyhow::Result<Vec<AwaitableResource>> {
        self.ensure_open("list resources")?;

        let subscriptions: Vec<Arc<WatchSubscription>> =
            self.lock_sets().values().flat_map(|s| s.subscriptions()).collect();

        let mut closed_rx = self.closed.subscribe();
        tokio::select! {
            res = try_join_all(subscriptions.iter().map(|s| s.start())) => { res?; },
            _ = closed_rx.wait_for(|closed| *closed) => {
                bail!(WaiterError::waiter_closed("closed while starting subscriptions"));
            },
        }

        // Checked again because close() can land between the subscriptions syncing and here
        self.ensure_open("list resources")?;
        let objs: Vec<DynamicObject> = self.lock_sets().values().flat_map(|s| s.matching_resources()).collect();
        objs.into_iter().map(|obj| AwaitableResource::new(obj, &self.registry)).collect()
    }

    pub async fn non_ready_resources(&self) -> anyhow::Result<Vec<AwaitableResource>> {
        Ok(self.resources().await?.into_iter().filter(|r| !r.is_ready()).collect())
    }

    /// Poll until nothing is left that isn't ready, or until the timeout runs out.
    ///
    /// On timeout this fails with a [`WaitTimeout`], and if the waiter is closed underneath it,
    /// with a [`WaitCancelled`]; both carry a report built from the last evaluation that actually
    /// completed.  Any other error (e.g., a subscription that couldn't start) is returned as-is.
    pub async fn wait_until_ready(&self, config: &WaitConfig) -> EmptyResult {
        let deadline = Instant::now() + config.timeout;
        let mut closed_rx = self.closed.subscribe();
        let mut evaluations = 0;
        let mut last_non_ready = vec![];

        info!(
            "waiting up to {} for resources to become ready",
            humantime::format_duration(config.timeout)
        );
        loop {
            match timeout_at(deadline, self.non_ready_resources()).await {
                Ok(Ok(non_ready)) => {
                    evaluations += 1;
                    info!("readiness check {evaluations}: {} resource(s) not ready", non_ready.len());
                    if non_ready.is_empty() {
                        return Ok(());
                    }
                    for res in &non_ready {
                        debug!("  {} is not ready", res.identity());
                    }
                    last_non_ready = non_ready;
                },
                Ok(Err(_)) if self.is_closed() => {
                    evaluations += 1;
                    info!("readiness check {evaluations}: waiter closed, treating resources as not ready");
                    let report = build_report(&last_non_ready).await;
                    return Err(WaitCancelled { evaluations, report }.into());
                },
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    debug!("readiness check interrupted by the deadline");
                    break;
                },
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }

            // A close() during the sleep is picked up by the next check
            tokio::select! {
                _ = sleep_until((now + config.poll_interval).min(deadline)) => (),
                _ = closed_rx.wait_for(|closed| *closed) => (),
            }
        }

        warn!("timed out waiting for {} resource(s) to become ready", last_non_ready.len());
        let report = build_report(&last_non_ready).await;
        Err(WaitTimeout { timeout: config.timeout, evaluations, report }.into())
    }

    pub fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }

        if let Ok(sets) = self.sets.lock() {
            for set in sets.values() {
                set.close();
            }
        }
        info!("readiness waiter closed");
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn ensure_open(&self, op: &str) -> EmptyResult {
        if self.is_closed() {
            bail!(WaiterError::waiter_closed(&format!("cannot {op}")));
        }
        Ok(())
    }

    fn lock_sets(&self) -> MutexGuard<'_, BTreeMap<ResourceKind, ResourceSet>> {
        self.sets.lock().expect("resource set mutex poisoned")
    }
}

impl Drop for ReadinessWaiter {
    fn drop(&mut self) {
        self.close();
    }
}

async fn build_report(non_ready: &[AwaitableResource]) -> WaitReport {
    let mut report = WaitReport::default();
    for res in non_ready {
        report.resources.push(res.diagnostics().await);
    }
    report
}
