#![cfg_attr(coverage, feature(coverage_attribute))]
mod awaitable;
mod config;
mod diagnostics;
mod errors;
mod install;
mod registry;
mod resource_set;
mod subscription;
mod waiter;

pub use crate::awaitable::AwaitableResource;
pub use crate::config::{
    MatcherConfig,
    WaitConfig,
    WaiterConfig,
};
pub use crate::diagnostics::{
    LogLine,
    ResourceDiagnostics,
    ResourceEvent,
    Trail,
    WaitReport,
    parse_log_lines,
};
pub use crate::install::{
    InstallResult,
    inclusions_from_install,
};
pub use crate::registry::{
    ChildDescriptor,
    KindAccessor,
    KindEntry,
    KindRegistry,
};
pub use crate::resource_set::{
    MatchableResources,
    ResourceSet,
};
pub use crate::subscription::{
    SubscriptionState,
    WatchSubscription,
};
pub use crate::waiter::{
    ReadinessWaiter,
    WaitCancelled,
    WaitTimeout,
};

#[cfg(test)]
mod tests;
