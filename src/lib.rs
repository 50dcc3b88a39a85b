pub mod builder;
pub mod config;
pub mod context;
pub mod crd;
pub mod engine;
pub mod error;
pub mod operator;
pub mod owner;
pub mod quantity;
pub mod state;
pub mod types;

pub use config::OperatorConfig;
pub use context::Context;
pub use crd::{MyAppResource, MyAppResourceSpec, MyAppResourceStatus};
pub use engine::{Outcome, ReconcileEngine};
pub use error::{Error, ReconcileError, Result};
pub use operator::Operator;
pub use owner::{LinkError, ResourceIdentity, TypeRegistry};
pub use quantity::{Quantity, ValidationError};
pub use state::{KubeStateAccess, ObjectKey, StateAccess, StateError};

pub mod prelude {
    pub use crate::builder::{build, build_workload, Topology};
    pub use crate::context::Context;
    pub use crate::crd::{
        ImageSettings, MyAppResource, MyAppResourceSpec, RedisSettings, ResourceSettings,
        UiSettings,
    };
    pub use crate::engine::{Outcome, ReconcileEngine};
    pub use crate::error::{Error, ReconcileError};
    pub use crate::state::{ObjectKey, StateAccess, StateError};

    pub use std::sync::Arc;
    pub use std::time::Duration;
}
