use super::*;

#[rstest]
fn test_owned_by(test_deployment: appsv1::Deployment) {
    let rs = build_replicaset(TEST_NAMESPACE, TEST_REPLICASET, &test_deployment, 3, 3);
    assert!(owned_by(&rs, &test_deployment));
}

#[rstest]
fn test_not_owned_by_sibling_with_same_labels(test_deployment: appsv1::Deployment) {
    // Same selector, different uid
    let sibling = build_deployment(TEST_NAMESPACE, "sibling", 1, 1);
    let rs = build_replicaset(TEST_NAMESPACE, TEST_REPLICASET, &sibling, 1, 1);
    assert!(!owned_by(&rs, &test_deployment));
}

#[rstest]
fn test_parent_without_uid_owns_nothing(mut test_deployment: appsv1::Deployment) {
    let rs = build_replicaset(TEST_NAMESPACE, TEST_REPLICASET, &test_deployment, 3, 3);
    test_deployment.metadata.uid = None;
    assert!(!owned_by(&rs, &test_deployment));
}
