mod waiter_test;

use std::sync::Arc;
use std::time::Duration;

use kr_core::k8s::ClusterAccess;
use kr_core::macros::*;
use kr_core::prelude::*;
use kr_testutils::*;
use rstest::*;

use super::*;

#[fixture]
fn cluster() -> Arc<FakeCluster> {
    FakeCluster::new()
}

fn registry_for(cluster: &Arc<FakeCluster>) -> KindRegistry {
    let access: Arc<dyn ClusterAccess> = cluster.clone();
    KindRegistry::standard(access)
}

fn waiter_for(cluster: &Arc<FakeCluster>) -> ReadinessWaiter {
    ReadinessWaiter::new(registry_for(cluster))
}

fn names_of(resources: &[AwaitableResource]) -> Vec<String> {
    resources.iter().map(|r| r.identity().namespaced_name()).collect()
}

fn names_of_objs(objs: &[DynamicObject]) -> Vec<String> {
    objs.iter().map(|o| o.namespaced_name()).collect()
}

// Give the subscription tasks a chance to drain whatever the fake cluster just broadcast
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
