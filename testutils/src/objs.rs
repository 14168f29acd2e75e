use std::collections::BTreeMap;

use kr_core::prelude::*;
use kube::Resource;
use rstest::fixture;
use serde::Serialize;

use crate::constants::*;

pub fn uid_for(name: &str) -> String {
    format!("{name}-uid")
}

pub fn app_labels(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), app.to_string())])
}

pub fn build_meta(ns: &str, name: &str, labels: BTreeMap<String, String>) -> metav1::ObjectMeta {
    metav1::ObjectMeta {
        namespace: Some(ns.into()),
        name: Some(name.into()),
        uid: Some(uid_for(name)),
        labels: Some(labels),
        ..Default::default()
    }
}

pub fn owner_ref_to<K: Resource<DynamicType = ()>>(owner: &K) -> metav1::OwnerReference {
    metav1::OwnerReference {
        api_version: K::api_version(&()).into(),
        kind: K::kind(&()).into(),
        name: owner.meta().name.clone().unwrap(),
        uid: owner.meta().uid.clone().unwrap(),
        controller: Some(true),
        ..Default::default()
    }
}

// Round-trip through JSON so that the result carries apiVersion/kind, just like the objects the
// real ClusterAccess hands back.
pub fn into_dynamic<K: Serialize>(obj: &K) -> DynamicObject {
    serde_json::from_value(serde_json::to_value(obj).unwrap()).unwrap()
}

fn app_selector(app: &str) -> metav1::LabelSelector {
    metav1::LabelSelector { match_labels: Some(app_labels(app)), ..Default::default() }
}

pub fn build_deployment(ns: &str, name: &str, replicas: i32, ready: i32) -> appsv1::Deployment {
    appsv1::Deployment {
        metadata: build_meta(ns, name, app_labels(name)),
        spec: Some(appsv1::DeploymentSpec {
            replicas: Some(replicas),
            selector: app_selector(name),
            ..Default::default()
        }),
        status: Some(appsv1::DeploymentStatus {
            replicas: Some(replicas),
            ready_replicas: Some(ready),
            updated_replicas: Some(ready),
            available_replicas: Some(ready),
            ..Default::default()
        }),
    }
}

pub fn build_replicaset(
    ns: &str,
    name: &str,
    owner: &appsv1::Deployment,
    replicas: i32,
    ready: i32,
) -> appsv1::ReplicaSet {
    let app = owner.meta().name.clone().unwrap();
    let mut meta = build_meta(ns, name, app_labels(&app));
    meta.owner_references = Some(vec![owner_ref_to(owner)]);
    appsv1::ReplicaSet {
        metadata: meta,
        spec: Some(appsv1::ReplicaSetSpec {
            replicas: Some(replicas),
            selector: app_selector(&app),
            ..Default::default()
        }),
        status: Some(appsv1::ReplicaSetStatus {
            replicas,
            ready_replicas: Some(ready),
            ..Default::default()
        }),
    }
}

pub fn build_statefulset(ns: &str, name: &str, replicas: i32, ready: i32) -> appsv1::StatefulSet {
    appsv1::StatefulSet {
        metadata: build_meta(ns, name, app_labels(name)),
        spec: Some(appsv1::StatefulSetSpec {
            replicas: Some(replicas),
            selector: app_selector(name),
            ..Default::default()
        }),
        status: Some(appsv1::StatefulSetStatus {
            replicas,
            ready_replicas: Some(ready),
            updated_replicas: Some(replicas),
            ..Default::default()
        }),
    }
}

pub fn build_daemonset(ns: &str, name: &str, desired: i32, ready: i32) -> appsv1::DaemonSet {
    appsv1::DaemonSet {
        metadata: build_meta(ns, name, app_labels(name)),
        spec: Some(appsv1::DaemonSetSpec { selector: app_selector(name), ..Default::default() }),
        status: Some(appsv1::DaemonSetStatus {
            desired_number_scheduled: desired,
            number_ready: ready,
            number_unavailable: Some(desired - ready),
            updated_number_scheduled: Some(desired),
            ..Default::default()
        }),
    }
}

pub fn build_job(ns: &str, name: &str, complete: bool) -> batchv1::Job {
    let conditions = complete.then(|| {
        vec![batchv1::JobCondition {
            type_: JOB_COMPLETE_CONDITION.into(),
            status: CONDITION_TRUE.into(),
            ..Default::default()
        }]
    });
    batchv1::Job {
        metadata: build_meta(ns, name, app_labels(name)),
        spec: Some(batchv1::JobSpec {
            selector: Some(app_selector(name)),
            ..Default::default()
        }),
        status: Some(batchv1::JobStatus { conditions, ..Default::default() }),
    }
}

pub fn build_pod(ns: &str, name: &str, labels: BTreeMap<String, String>, ready: bool) -> corev1::Pod {
    corev1::Pod {
        metadata: build_meta(ns, name, labels),
        spec: Some(corev1::PodSpec {
            containers: vec![corev1::Container { name: TEST_CONTAINER.into(), ..Default::default() }],
            ..Default::default()
        }),
        status: Some(corev1::PodStatus {
            phase: Some("Running".into()),
            conditions: Some(vec![corev1::PodCondition {
                type_: POD_READY_CONDITION.into(),
                status: if ready { "True".into() } else { "False".into() },
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}

pub fn build_owned_pod<K: Resource<DynamicType = ()>>(
    ns: &str,
    name: &str,
    owner: &K,
    labels: BTreeMap<String, String>,
    ready: bool,
) -> corev1::Pod {
    let mut pod = build_pod(ns, name, labels, ready);
    pod.metadata.owner_references = Some(vec![owner_ref_to(owner)]);
    pod
}

// Record a container status on the pod; `restarted` adds a terminated last state, which is what
// makes the previous-instance log stream available.
pub fn add_container_status(pod: &mut corev1::Pod, container: &str, running: bool, restarted: bool) {
    let state = if running {
        corev1::ContainerState {
            running: Some(corev1::ContainerStateRunning::default()),
            ..Default::default()
        }
    } else {
        corev1::ContainerState {
            waiting: Some(corev1::ContainerStateWaiting {
                reason: Some("CrashLoopBackOff".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    };
    let last_state = restarted.then(|| corev1::ContainerState {
        terminated: Some(corev1::ContainerStateTerminated { exit_code: 1, ..Default::default() }),
        ..Default::default()
    });

    let status = corev1::ContainerStatus {
        name: container.into(),
        state: Some(state),
        last_state,
        restart_count: if restarted { 1 } else { 0 },
        ready: running,
        ..Default::default()
    };
    pod.status
        .get_or_insert_with(Default::default)
        .container_statuses
        .get_or_insert_with(Vec::new)
        .push(status);
}

pub fn build_event<K: Resource<DynamicType = ()>>(
    involved: &K,
    name: &str,
    type_: &str,
    reason: &str,
    message: &str,
    count: i32,
    first: &str,
    last: &str,
) -> corev1::Event {
    let meta = involved.meta();
    corev1::Event {
        metadata: metav1::ObjectMeta {
            namespace: meta.namespace.clone(),
            name: Some(name.into()),
            ..Default::default()
        },
        involved_object: corev1::ObjectReference {
            api_version: Some(K::api_version(&()).into()),
            kind: Some(K::kind(&()).into()),
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
            uid: meta.uid.clone(),
            ..Default::default()
        },
        type_: Some(type_.into()),
        reason: Some(reason.into()),
        message: Some(message.into()),
        count: Some(count),
        first_timestamp: Some(metav1::Time(first.parse().unwrap())),
        last_timestamp: Some(metav1::Time(last.parse().unwrap())),
        ..Default::default()
    }
}

#[fixture]
pub fn test_deployment(#[default(TEST_DEPLOYMENT)] name: &str) -> appsv1::Deployment {
    build_deployment(TEST_NAMESPACE, name, 3, 3)
}

#[fixture]
pub fn test_pod(#[default(TEST_POD)] name: &str) -> corev1::Pod {
    build_pod(TEST_NAMESPACE, name, app_labels(TEST_DEPLOYMENT), true)
}

#[fixture]
pub fn test_job(#[default(TEST_JOB)] name: &str) -> batchv1::Job {
    build_job(TEST_NAMESPACE, name, true)
}
