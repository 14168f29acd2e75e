use std::collections::BTreeMap;
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
};

use futures::StreamExt;
use kr_core::errors::*;
use kr_core::k8s::ObjStream;
use kr_core::prelude::*;
use kube::runtime::watcher::Event;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::*;

use crate::errors::WaiterError;
use crate::registry::KindAccessor;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubscriptionState {
    Created,
    Starting,
    Synced,
    Closed,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum SyncStatus {
    Pending,
    Synced,
    Failed(String),
}

// The local copy of everything the watch has told us about, keyed by name (a subscription only
// ever covers one namespace).  A relist replaces the cache wholesale once it completes, so readers
// never see a half-populated list after the first sync.
#[derive(Default)]
pub(crate) struct ObjCache {
    objs: BTreeMap<String, DynamicObject>,
    init_buffer: Option<BTreeMap<String, DynamicObject>>,
}

impl ObjCache {
    // Returns true when the event completes an initial (re)list
    pub(crate) fn handle_event(&mut self, evt: Event<DynamicObject>) -> bool {
        match evt {
            Event::Init => {
                self.init_buffer = Some(BTreeMap::new());
                false
            },
            Event::InitApply(obj) => {
                match self.init_buffer.as_mut() {
                    Some(buf) => buf.insert(obj.name_any(), obj),
                    None => self.objs.insert(obj.name_any(), obj),
                };
                false
            },
            Event::InitDone => {
                if let Some(buf) = self.init_buffer.take() {
                    self.objs = buf;
                }
                true
            },
            Event::Apply(obj) => {
                self.objs.insert(obj.name_any(), obj);
                false
            },
            Event::Delete(obj) => {
                self.objs.remove(&obj.name_any());
                false
            },
        }
    }

    pub(crate) fn objects(&self) -> Vec<DynamicObject> {
        self.objs.values().cloned().collect()
    }

    fn clear(&mut self) {
        self.objs.clear();
        self.init_buffer = None;
    }
}

struct Lifecycle {
    state: SubscriptionState,
    task: Option<JoinHandle<()>>,
    sync_rx: Option<watch::Receiver<SyncStatus>>,
}

/// One live watch for a single (kind, namespace) pair, shared by every inclusion matcher that
/// targets that pair.
///
/// The watch runs in its own background task, which is spawned by the first call to
/// [`WatchSubscription::start`]; every call to `start` (first or not) resolves once the local
/// cache has completed its initial list.  A watch that fails before that point stays failed: the
/// error is handed back from every subsequent `start`, and it is up to the caller to build a new
/// subscription if it wants to try again.
pub struct WatchSubscription {
    accessor: KindAccessor,
    namespace: String,
    cache: Arc<Mutex<ObjCache>>,
    lifecycle: Mutex<Lifecycle>,
}

impl WatchSubscription {
    pub fn new(accessor: KindAccessor, namespace: &str) -> WatchSubscription {
        WatchSubscription {
            accessor,
            namespace: namespace.into(),
            cache: Arc::new(Mutex::new(ObjCache::default())),
            lifecycle: Mutex::new(Lifecycle {
                state: SubscriptionState::Created,
                task: None,
                sync_rx: None,
            }),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.accessor.kind()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn state(&self) -> SubscriptionState {
        let lifecycle = self.lock_lifecycle();
        match (&lifecycle.state, &lifecycle.sync_rx) {
            (SubscriptionState::Starting, Some(rx)) if *rx.borrow() == SyncStatus::Synced => SubscriptionState::Synced,
            (state, _) => *state,
        }
    }

    pub async fn start(&self) -> EmptyResult {
        let mut sync_rx = {
            let mut lifecycle = self.lock_lifecycle();
            match lifecycle.state {
                SubscriptionState::Closed => bail!(WaiterError::subscription_closed(&self.describe())),
                SubscriptionState::Created => {
                    debug!("starting watch subscription for {}", self.describe());
                    let (sync_tx, sync_rx) = watch::channel(SyncStatus::Pending);
                    let stream = self.accessor.watch(&self.namespace);
                    let task = run_watch(stream, self.cache.clone(), sync_tx, self.describe());
                    lifecycle.task = Some(tokio::spawn(task));
                    lifecycle.sync_rx = Some(sync_rx);
                    lifecycle.state = SubscriptionState::Starting;
                },
                SubscriptionState::Starting | SubscriptionState::Synced => (),
            }

            match lifecycle.sync_rx.clone() {
                Some(rx) => rx,
                None => bail!(WaiterError::subscription_closed(&self.describe())),
            }
        };

        // If the task goes away before reporting anything, the subscription was closed under us
        let status = match sync_rx.wait_for(|s| *s != SyncStatus::Pending).await {
            Ok(status) => (*status).clone(),
            Err(_) => bail!(WaiterError::subscription_closed(&self.describe())),
        };

        match status {
            SyncStatus::Failed(msg) => {
                bail!(WaiterError::subscription_failed(&format!("{}: {msg}", self.describe())))
            },
            _ => {
                let mut lifecycle = self.lock_lifecycle();
                if lifecycle.state == SubscriptionState::Starting {
                    lifecycle.state = SubscriptionState::Synced;
                }
                Ok(())
            },
        }
    }

    // Only meaningful once `start` has resolved; before that the cache may be empty or partial.
    pub fn objects(&self) -> Vec<DynamicObject> {
        if self.lock_lifecycle().state == SubscriptionState::Closed {
            return vec![];
        }
        self.cache.lock().expect("subscription cache mutex poisoned").objects()
    }

    pub fn close(&self) {
        let Ok(mut lifecycle) = self.lifecycle.lock() else {
            return;
        };
        if lifecycle.state == SubscriptionState::Closed {
            return;
        }

        if let Some(task) = lifecycle.task.take() {
            task.abort();
        }
        lifecycle.sync_rx = None;
        lifecycle.state = SubscriptionState::Closed;

        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
        debug!("closed watch subscription for {}", self.describe());
    }

    fn describe(&self) -> String {
        format!("{} in {}", self.accessor.kind(), self.namespace)
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().expect("subscription lifecycle mutex poisoned")
    }
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        if let Ok(lifecycle) = self.lifecycle.get_mut()
            && let Some(task) = lifecycle.task.take()
        {
            task.abort();
        }
    }
}

async fn run_watch(
    mut stream: ObjStream,
    cache: Arc<Mutex<ObjCache>>,
    sync_tx: watch::Sender<SyncStatus>,
    desc: String,
) {
    let mut synced = false;
    while let Some(res) = stream.next().await {
        match res {
            Ok(evt) => {
                let done = cache.lock().expect("subscription cache mutex poisoned").handle_event(evt);
                if done && !synced {
                    debug!("watch subscription for {desc} synced");
                    synced = true;
                    sync_tx.send_replace(SyncStatus::Synced);
                }
            },
            Err(err) if !synced => {
                error!("watch subscription for {desc} failed before syncing: {err:#}");
                sync_tx.send_replace(SyncStatus::Failed(format!("{err:#}")));
                return;
            },
            // The stream itself backs off and resumes
            Err(err) => warn!("watch subscription for {desc} received error: {err:#}"),
        }
    }

    if !synced {
        sync_tx.send_replace(SyncStatus::Failed("watch stream ended before syncing".into()));
    }
    debug!("watch stream for {desc} ended");
}
