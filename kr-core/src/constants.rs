// Well-known condition types and values
pub const CONDITION_TRUE: &str = "True";
pub const JOB_COMPLETE_CONDITION: &str = "Complete";
pub const POD_READY_CONDITION: &str = "Ready";
pub const POD_SUCCEEDED_PHASE: &str = "Succeeded";

// Field selectors for the events api
pub const INVOLVED_OBJECT_UID_FIELD: &str = "involvedObject.uid";
pub const INVOLVED_OBJECT_KIND_FIELD: &str = "involvedObject.kind";
pub const INVOLVED_OBJECT_NAME_FIELD: &str = "involvedObject.name";

// Defaults
pub const DEFAULT_WAIT_TIMEOUT_SECONDS: u64 = 300;
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 2;
