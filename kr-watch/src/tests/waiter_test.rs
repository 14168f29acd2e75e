use assertables::*;
use futures::{
    StreamExt,
    stream,
};
use kr_core::k8s::MockClusterAccess;
use kube::runtime::watcher::Event;
use tracing_test::traced_test;

use super::*;

fn wait_config(timeout_secs: u64, interval_secs: u64) -> WaitConfig {
    WaitConfig {
        timeout: Duration::from_secs(timeout_secs),
        poll_interval: Duration::from_secs(interval_secs),
    }
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_named_matcher_respects_namespace(cluster: Arc<FakeCluster>) {
    cluster.apply(&build_deployment("default", "svc-a", 1, 1));
    cluster.apply(&build_deployment(TEST_OTHER_NAMESPACE, "svc-a", 1, 1));

    let waiter = waiter_for(&cluster);
    waiter
        .include(ResourceKind::Deployment, ResourceMatcher::named(["svc-a"]).in_namespace("default"))
        .unwrap();

    let resources = waiter.resources().await.unwrap();
    assert_eq!(names_of(&resources), vec!["default/svc-a"]);
    assert_eq!(cluster.watch_calls(), vec![(ResourceKind::Deployment, "default".to_string())]);
}

#[rstest]
#[case::exclude_first(true)]
#[case::exclude_last(false)]
#[tokio::test(start_paused = true)]
async fn test_exclusion_order_independent(cluster: Arc<FakeCluster>, #[case] exclude_first: bool) {
    cluster.apply(&build_pod(TEST_NAMESPACE, "broken", app_labels("web"), false));
    cluster.apply(&build_pod(TEST_NAMESPACE, "ok", app_labels("web"), true));

    let waiter = waiter_for(&cluster);
    let web = ResourceMatcher::labelled(kreq!("app" = "web")).in_namespace(TEST_NAMESPACE);
    let include = || waiter.include(ResourceKind::Pod, web.clone());
    let exclude = || waiter.exclude(ResourceKind::Pod, ResourceMatcher::named(["broken"]));

    if exclude_first {
        exclude().unwrap();
        include().unwrap();
    } else {
        include().unwrap();
        exclude().unwrap();
    }

    assert_eq!(names_of(&waiter.resources().await.unwrap()), vec!["test-namespace/ok"]);
    assert!(waiter.non_ready_resources().await.unwrap().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_overlapping_matchers_share_one_watch(cluster: Arc<FakeCluster>) {
    cluster.apply(&test_pod(TEST_POD));

    let waiter = waiter_for(&cluster);
    waiter
        .include(ResourceKind::Pod, ResourceMatcher::named([TEST_POD]).in_namespace(TEST_NAMESPACE))
        .unwrap();
    waiter
        .include(ResourceKind::Pod, ResourceMatcher::labelled(kreq!()).in_namespace(TEST_NAMESPACE))
        .unwrap();

    // Matched by both inclusions, but only reported once
    assert_eq!(names_of(&waiter.resources().await.unwrap()), vec!["test-namespace/the-pod"]);
    waiter.resources().await.unwrap();
    assert_eq!(cluster.watch_count(ResourceKind::Pod, TEST_NAMESPACE), 1);
}

#[rstest]
#[tokio::test]
async fn test_overlapping_matchers_mock_access() {
    let mut access = MockClusterAccess::new();
    access.expect_watch().times(1).returning(|_, _| {
        stream::iter(vec![Ok::<_, anyhow::Error>(Event::<DynamicObject>::Init), Ok(Event::InitDone)])
            .chain(stream::pending())
            .boxed()
    });

    let waiter = ReadinessWaiter::new(KindRegistry::standard(Arc::new(access)));
    for name in ["a", "b", "c"] {
        waiter
            .include(ResourceKind::Job, ResourceMatcher::named([name]).in_namespace(TEST_NAMESPACE))
            .unwrap();
    }

    assert!(waiter.resources().await.unwrap().is_empty());
    waiter.close();
}

#[rstest]
fn test_configuration_errors(cluster: Arc<FakeCluster>) {
    let access: Arc<dyn ClusterAccess> = cluster.clone();
    let registry = KindRegistry::empty(access).with_entry(KindEntry {
        kind: ResourceKind::Pod,
        readiness: |_| true,
        children: None,
    });
    let waiter = ReadinessWaiter::new(registry);

    let err = waiter
        .include(ResourceKind::Deployment, ResourceMatcher::everything().in_namespace(TEST_NAMESPACE))
        .unwrap_err();
    assert_contains!(format!("{err}"), "no registry entry for resource kind Deployment");
    assert_err!(waiter.exclude(ResourceKind::Deployment, ResourceMatcher::named(["x"])));

    let err = waiter.include(ResourceKind::Pod, ResourceMatcher::everything()).unwrap_err();
    assert_contains!(format!("{err}"), "not bound to a namespace");

    // A failed call doesn't poison later ones
    assert_ok!(waiter.include(ResourceKind::Pod, ResourceMatcher::everything().in_namespace(TEST_NAMESPACE)));
}

#[rstest]
#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_timeout_reports_last_evaluation(cluster: Arc<FakeCluster>) {
    let depl = build_deployment(TEST_NAMESPACE, TEST_DEPLOYMENT, 3, 1);
    cluster.apply(&depl);

    let waiter = waiter_for(&cluster);
    waiter
        .include(ResourceKind::Deployment, ResourceMatcher::everything().in_namespace(TEST_NAMESPACE))
        .unwrap();

    let err = waiter.wait_until_ready(&wait_config(3, 1)).await.unwrap_err();
    let timeout = err.downcast_ref::<WaitTimeout>().unwrap();

    assert_ge!(timeout.evaluations, 3);
    assert_eq!(timeout.timeout, Duration::from_secs(3));
    assert_eq!(
        timeout.report.identities(),
        vec![&ResourceIdentity::of(ResourceKind::Deployment, &depl)]
    );
    assert!(logs_contain("readiness check 3: 1 resource(s) not ready"));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_becomes_ready_mid_wait(cluster: Arc<FakeCluster>) {
    cluster.apply(&build_job(TEST_NAMESPACE, TEST_JOB, false));

    let waiter = waiter_for(&cluster);
    waiter
        .include(ResourceKind::Job, ResourceMatcher::named([TEST_JOB]).in_namespace(TEST_NAMESPACE))
        .unwrap();

    let c = cluster.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        c.apply(&build_job(TEST_NAMESPACE, TEST_JOB, true));
    });

    let start = tokio::time::Instant::now();
    waiter.wait_until_ready(&wait_config(10, 1)).await.unwrap();
    assert_ge!(start.elapsed(), Duration::from_millis(2500));
    assert_lt!(start.elapsed(), Duration::from_secs(4));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_readiness_ignores_children(cluster: Arc<FakeCluster>) {
    let depl = build_deployment(TEST_NAMESPACE, TEST_DEPLOYMENT, 1, 1);
    let rs = build_replicaset(TEST_NAMESPACE, TEST_REPLICASET, &depl, 1, 0);
    let pod = build_owned_pod(TEST_NAMESPACE, TEST_POD, &rs, app_labels(TEST_DEPLOYMENT), false);
    cluster.apply(&depl);
    cluster.apply(&rs);
    cluster.apply(&pod);

    let waiter = waiter_for(&cluster);
    waiter
        .include(ResourceKind::Deployment, ResourceMatcher::everything().in_namespace(TEST_NAMESPACE))
        .unwrap();
    assert!(waiter.non_ready_resources().await.unwrap().is_empty());

    // ...and the other way around: a not-ready parent is not ready even if its children are
    cluster.apply(&build_deployment(TEST_NAMESPACE, TEST_DEPLOYMENT, 2, 1));
    cluster.apply(&build_owned_pod(TEST_NAMESPACE, TEST_POD, &rs, app_labels(TEST_DEPLOYMENT), true));
    settle().await;
    assert_eq!(names_of(&waiter.non_ready_resources().await.unwrap()), vec!["test-namespace/the-deployment"]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_close_during_wait(cluster: Arc<FakeCluster>) {
    let job = build_job(TEST_NAMESPACE, TEST_JOB, false);
    cluster.apply(&job);

    let waiter = Arc::new(waiter_for(&cluster));
    waiter
        .include(ResourceKind::Job, ResourceMatcher::everything().in_namespace(TEST_NAMESPACE))
        .unwrap();

    let w = waiter.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        w.close();
    });

    let err = waiter.wait_until_ready(&wait_config(60, 1)).await.unwrap_err();
    let cancelled = err.downcast_ref::<WaitCancelled>().unwrap();
    assert_eq!(cancelled.evaluations, 3);
    assert_eq!(cancelled.report.identities(), vec![&ResourceIdentity::of(ResourceKind::Job, &job)]);
    assert!(waiter.is_closed());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_close_then_resources_fails(cluster: Arc<FakeCluster>) {
    cluster.apply(&test_pod(TEST_POD));
    let waiter = waiter_for(&cluster);
    waiter
        .include(ResourceKind::Pod, ResourceMatcher::everything().in_namespace(TEST_NAMESPACE))
        .unwrap();
    assert_eq!(waiter.resources().await.unwrap().len(), 1);

    waiter.close();
    waiter.close();

    let err = waiter.resources().await.err().unwrap();
    assert_contains!(format!("{err}"), "closed");
    assert_err!(waiter.include(ResourceKind::Pod, ResourceMatcher::everything().in_namespace(TEST_NAMESPACE)));
    assert_err!(waiter.exclude(ResourceKind::Pod, ResourceMatcher::everything()));
}

#[rstest]
fn test_close_without_wait(cluster: Arc<FakeCluster>) {
    let waiter = waiter_for(&cluster);
    waiter
        .include(ResourceKind::Pod, ResourceMatcher::everything().in_namespace(TEST_NAMESPACE))
        .unwrap();
    waiter.close();
    assert!(waiter.is_closed());
    assert!(cluster.watch_calls().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_start_failure_propagates(cluster: Arc<FakeCluster>) {
    cluster.fail_watches_for(ResourceKind::StatefulSet);
    cluster.apply(&test_pod(TEST_POD));

    let waiter = waiter_for(&cluster);
    waiter
        .include(ResourceKind::Pod, ResourceMatcher::everything().in_namespace(TEST_NAMESPACE))
        .unwrap();
    waiter
        .include(ResourceKind::StatefulSet, ResourceMatcher::everything().in_namespace(TEST_NAMESPACE))
        .unwrap();

    let err = waiter.resources().await.err().unwrap();
    assert_contains!(format!("{err}"), "StatefulSet in test-namespace");

    let err = waiter.wait_until_ready(&wait_config(3, 1)).await.unwrap_err();
    assert!(err.downcast_ref::<WaitTimeout>().is_none());
    assert_contains!(format!("{err}"), "connection refused");

    // No retry happens behind the caller's back
    assert_eq!(cluster.watch_count(ResourceKind::StatefulSet, TEST_NAMESPACE), 1);
    waiter.close();
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_timeout_report_carries_diagnostics(cluster: Arc<FakeCluster>) {
    let job = build_job(TEST_NAMESPACE, TEST_JOB, false);
    let mut pod = build_owned_pod(TEST_NAMESPACE, TEST_POD, &job, app_labels(TEST_JOB), false);
    add_container_status(&mut pod, TEST_CONTAINER, true, false);
    cluster.apply(&job);
    cluster.apply(&pod);
    cluster.add_event(build_event(&job, "e1", "Normal", "SuccessfulCreate", "created pod", 1, TEST_TS_1, TEST_TS_1));
    cluster.add_event(build_event(&pod, "e2", "Warning", "BackOff", "back-off", 4, TEST_TS_2, TEST_TS_3));
    cluster.add_logs(TEST_NAMESPACE, TEST_POD, TEST_CONTAINER, false, &format!("{TEST_TS_2} migrating\n"));

    let waiter = waiter_for(&cluster);
    waiter
        .include(ResourceKind::Job, ResourceMatcher::named([TEST_JOB]).in_namespace(TEST_NAMESPACE))
        .unwrap();

    let err = waiter.wait_until_ready(&wait_config(2, 1)).await.unwrap_err();
    let report = &err.downcast_ref::<WaitTimeout>().unwrap().report;
    let rendered = format!("{report}");

    assert_eq!(report.resources.len(), 1);
    let diag = &report.resources[0];
    assert_eq!(
        diag.events.iter().map(|e| e.reason.as_str()).collect::<Vec<_>>(),
        vec!["SuccessfulCreate", "BackOff"]
    );
    assert_eq!(diag.logs.len(), 1);
    assert_contains!(rendered, "Job test-namespace/the-job is not ready");
    assert_contains!(rendered, "(x4 between 2024-03-01T10:00:05Z and 2024-03-01T10:00:10Z)");
    assert_contains!(rendered, "[Pod test-namespace/the-pod app] 2024-03-01T10:00:05Z migrating");
}
