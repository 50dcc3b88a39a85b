use crate::crd::MyAppResource;
use crate::owner::TypeRegistry;
use crate::state::StateAccess;
use k8s_openapi::api::apps::v1::Deployment;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a reconciliation pass depends on.
///
/// Constructed once at start-up and shared read-only between passes.
pub struct Context<S> {
    state: S,
    registry: TypeRegistry,
    request_timeout: Duration,
}

impl<S: StateAccess> Context<S> {
    pub fn new(state: S) -> Self {
        Self {
            state,
            registry: default_registry(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Upper bound on each individual control-plane call.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Kinds this controller owns or is owned by.
pub fn default_registry() -> TypeRegistry {
    TypeRegistry::new()
        .register::<MyAppResource>()
        .register::<Deployment>()
}
