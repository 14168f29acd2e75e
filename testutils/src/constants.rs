pub const TEST_NAMESPACE: &str = "test-namespace";
pub const TEST_OTHER_NAMESPACE: &str = "kube-system";
pub const TEST_DEPLOYMENT: &str = "the-deployment";
pub const TEST_REPLICASET: &str = "the-deployment-5d8f9c";
pub const TEST_STATEFULSET: &str = "the-statefulset";
pub const TEST_DAEMONSET: &str = "the-daemonset";
pub const TEST_JOB: &str = "the-job";
pub const TEST_POD: &str = "the-pod";
pub const TEST_CONTAINER: &str = "app";
pub const TEST_INIT_CONTAINER: &str = "init";

pub const TEST_TS_1: &str = "2024-03-01T10:00:00Z";
pub const TEST_TS_2: &str = "2024-03-01T10:00:05Z";
pub const TEST_TS_3: &str = "2024-03-01T10:00:10Z";
