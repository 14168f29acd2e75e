use kr_core::errors::*;
use kr_core::prelude::*;

err_impl! {WaiterError,
    #[error("inclusion matcher is not bound to a namespace: {0}")]
    UnscopedInclusion(String),

    #[error("no registry entry for resource kind {0}")]
    UnregisteredKind(ResourceKind),

    #[error("watch subscription closed: {0}")]
    SubscriptionClosed(String),

    #[error("watch subscription failed to start: {0}")]
    SubscriptionFailed(String),

    #[error("readiness waiter has been closed: {0}")]
    WaiterClosed(String),
}
