use futures::StreamExt;
use httpmock::Method::GET;
use kube::runtime::watcher::Event;
use serde_json::json;

use super::*;

#[rstest]
#[tokio::test]
async fn test_list_by_selector(test_deployment: appsv1::Deployment) {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    let rs = build_replicaset(TEST_NAMESPACE, TEST_REPLICASET, &test_deployment, 3, 3);
    let mut item = serde_json::to_value(&rs).unwrap();
    item.as_object_mut().unwrap().remove("kind");

    fake_apiserver
        .handle(move |when, then| {
            when.method(GET)
                .path(format!("/apis/apps/v1/namespaces/{TEST_NAMESPACE}/replicasets"))
                .query_param("labelSelector", format!("app={TEST_DEPLOYMENT}"));
            then.json_body(list_response("apps/v1", "ReplicaSetList", vec![item.clone()]));
        })
        .build();

    let access = KubeClusterAccess::new(client);
    let sel = readiness::deployment_selector(&test_deployment).unwrap();
    let objs = access.list(ResourceKind::ReplicaSet, TEST_NAMESPACE, &sel).await.unwrap();

    fake_apiserver.assert();
    assert_eq!(objs.len(), 1);
    assert_eq!(objs[0].name_any(), TEST_REPLICASET);
    assert_eq!(ResourceKind::of(&objs[0]).unwrap(), ResourceKind::ReplicaSet);
}

#[rstest]
#[tokio::test]
async fn test_events_for(test_deployment: appsv1::Deployment) {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    let event =
        build_event(&test_deployment, "evt1", "Warning", "FailedCreate", "quota exceeded", 2, TEST_TS_1, TEST_TS_2);
    let body = list_response("v1", "EventList", vec![serde_json::to_value(&event).unwrap()]);

    fake_apiserver
        .handle(move |when, then| {
            when.method(GET)
                .path(format!("/api/v1/namespaces/{TEST_NAMESPACE}/events"))
                .query_param("fieldSelector", format!("involvedObject.uid={}", uid_for(TEST_DEPLOYMENT)));
            then.json_body(body.clone());
        })
        .build();

    let access = KubeClusterAccess::new(client);
    let events = access
        .events_for(&ResourceIdentity::of(ResourceKind::Deployment, &test_deployment))
        .await
        .unwrap();

    fake_apiserver.assert();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason.as_deref(), Some("FailedCreate"));
}

#[rstest]
#[tokio::test]
async fn test_container_logs() {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    fake_apiserver
        .handle(|when, then| {
            when.method(GET)
                .path(format!("/api/v1/namespaces/{TEST_NAMESPACE}/pods/{TEST_POD}/log"))
                .query_param("container", TEST_CONTAINER)
                .query_param("previous", "true")
                .query_param("timestamps", "true");
            then.body(format!("{TEST_TS_1} starting up\n"));
        })
        .build();

    let access = KubeClusterAccess::new(client);
    let logs = access.container_logs(TEST_NAMESPACE, TEST_POD, TEST_CONTAINER, true).await.unwrap();

    fake_apiserver.assert();
    assert_eq!(logs, format!("{TEST_TS_1} starting up\n"));
}

#[rstest]
#[tokio::test]
async fn test_container_logs_not_found() {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    fake_apiserver
        .handle_not_found(format!("/api/v1/namespaces/{TEST_NAMESPACE}/pods/{TEST_POD}/log"))
        .build();

    let access = KubeClusterAccess::new(client);
    assert!(access.container_logs(TEST_NAMESPACE, TEST_POD, TEST_CONTAINER, false).await.is_err());
}

#[rstest]
#[tokio::test]
async fn test_watch_stamps_types(test_pod: corev1::Pod) {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    let mut item = serde_json::to_value(&test_pod).unwrap();
    item.as_object_mut().unwrap().remove("apiVersion");
    item.as_object_mut().unwrap().remove("kind");
    let body = json!({
        "kind": "PodList",
        "apiVersion": "v1",
        "metadata": {"resourceVersion": "1"},
        "items": [item],
    });

    fake_apiserver
        .handle(move |when, then| {
            when.method(GET).path(format!("/api/v1/namespaces/{TEST_NAMESPACE}/pods"));
            then.json_body(body.clone());
        })
        .build();

    let access = KubeClusterAccess::new(client);
    let events: Vec<_> = access.watch(ResourceKind::Pod, TEST_NAMESPACE).take(3).collect().await;

    assert!(matches!(events[0], Ok(Event::Init)));
    let Ok(Event::InitApply(obj)) = &events[1] else {
        panic!("expected InitApply, got {:?}", events[1]);
    };
    assert_eq!(obj.name_any(), TEST_POD);
    assert_eq!(ResourceKind::of(obj).unwrap(), ResourceKind::Pod);
    assert!(matches!(events[2], Ok(Event::InitDone)));
}
