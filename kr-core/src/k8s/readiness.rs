//! Per-kind readiness rules.
//!
//! Every rule is conservative: a missing status means "not ready", never a panic or an error.
//! Counters *inside* a status that is present are read as zero when absent, because the apiserver
//! omits zero-valued counters (a deployment scaled to zero reports no `readyReplicas` at all, and a
//! statefulset that has just started rolling reports no `updatedReplicas`).  Controllers with a
//! rollout also have to have observed the current generation.
use kube::Resource;
use serde::de::DeserializeOwned;
use tracing::*;

use super::*;

// Apply a typed readiness rule to a dynamic object; anything that doesn't parse as the expected
// type is not ready.
pub fn ready_as<K>(obj: &DynamicObject, is_ready: fn(&K) -> bool) -> bool
where
    K: Resource + DeserializeOwned,
{
    match obj.clone().try_parse::<K>() {
        Ok(typed) => is_ready(&typed),
        Err(err) => {
            debug!("could not parse {} for readiness check: {err}", obj.namespaced_name());
            false
        },
    }
}

pub fn selector_as<K>(
    obj: &DynamicObject,
    selector: fn(&K) -> Option<metav1::LabelSelector>,
) -> Option<metav1::LabelSelector>
where
    K: Resource + DeserializeOwned,
{
    obj.clone().try_parse::<K>().ok().as_ref().and_then(selector)
}

pub fn deployment_ready(depl: &appsv1::Deployment) -> bool {
    let Some(status) = depl.status.as_ref() else {
        return false;
    };
    if !observed_current(&depl.metadata, status.observed_generation) {
        return false;
    }

    let desired = depl.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    status.ready_replicas.unwrap_or(0) == desired
        && status.updated_replicas.unwrap_or(0) == desired
        && status.available_replicas.unwrap_or(0) == desired
}

pub fn replicaset_ready(rs: &appsv1::ReplicaSet) -> bool {
    let Some(status) = rs.status.as_ref() else {
        return false;
    };
    let desired = rs.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    status.ready_replicas.unwrap_or(0) == desired
}

pub fn statefulset_ready(sts: &appsv1::StatefulSet) -> bool {
    let Some(status) = sts.status.as_ref() else {
        return false;
    };
    if !observed_current(&sts.metadata, status.observed_generation) {
        return false;
    }

    let desired = sts.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    status.ready_replicas.unwrap_or(0) == desired && status.updated_replicas.unwrap_or(0) == desired
}

pub fn daemonset_ready(ds: &appsv1::DaemonSet) -> bool {
    let Some(status) = ds.status.as_ref() else {
        return false;
    };
    if !observed_current(&ds.metadata, status.observed_generation) {
        return false;
    }

    let desired = status.desired_number_scheduled;
    status.number_ready == desired
        && status.updated_number_scheduled.unwrap_or(0) == desired
        && status.number_unavailable.unwrap_or(0) == 0
}

pub fn job_ready(job: &batchv1::Job) -> bool {
    job.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conds| conds.iter().any(|c| c.type_ == JOB_COMPLETE_CONDITION && c.status == CONDITION_TRUE))
}

// Pods that ran to completion (e.g., the pods of a finished job) will never report Ready again,
// but they're done converging.
pub fn pod_ready(pod: &corev1::Pod) -> bool {
    let succeeded = pod
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|p| p == POD_SUCCEEDED_PHASE);
    succeeded || pod.condition_is_true(POD_READY_CONDITION)
}

pub fn deployment_selector(depl: &appsv1::Deployment) -> Option<metav1::LabelSelector> {
    depl.spec.as_ref().map(|s| s.selector.clone())
}

pub fn replicaset_selector(rs: &appsv1::ReplicaSet) -> Option<metav1::LabelSelector> {
    rs.spec.as_ref().map(|s| s.selector.clone())
}

pub fn statefulset_selector(sts: &appsv1::StatefulSet) -> Option<metav1::LabelSelector> {
    sts.spec.as_ref().map(|s| s.selector.clone())
}

pub fn daemonset_selector(ds: &appsv1::DaemonSet) -> Option<metav1::LabelSelector> {
    ds.spec.as_ref().map(|s| s.selector.clone())
}

pub fn job_selector(job: &batchv1::Job) -> Option<metav1::LabelSelector> {
    job.spec.as_ref().and_then(|s| s.selector.clone())
}

// A status that predates the latest spec change says nothing about the new spec
fn observed_current(meta: &metav1::ObjectMeta, observed_generation: Option<i64>) -> bool {
    match (meta.generation, observed_generation) {
        (Some(generation), Some(observed)) => observed >= generation,
        _ => true,
    }
}
