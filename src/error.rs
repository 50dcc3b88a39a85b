use crate::owner::LinkError;
use crate::quantity::ValidationError;
use crate::state::{ObjectKey, StateError};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Control-plane call made during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetApp,
    GetDeployment,
    CreateDeployment,
    UpdateDeployment,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Operation::GetApp => "get MyAppResource",
            Operation::GetDeployment => "get Deployment",
            Operation::CreateDeployment => "create Deployment",
            Operation::UpdateDeployment => "update Deployment",
        })
    }
}

/// Terminal failure of a reconciliation pass.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("failed to fetch {kind} {key}: {source}")]
    FetchFailed {
        kind: &'static str,
        key: ObjectKey,
        #[source]
        source: StateError,
    },

    #[error("failed to build deployment spec: {0}")]
    BuildFailed(#[from] ValidationError),

    #[error("failed to set controller reference: {0}")]
    LinkFailed(#[from] LinkError),

    #[error("failed to create deployment {key}: {source}")]
    CreateFailed {
        key: ObjectKey,
        #[source]
        source: StateError,
    },

    #[error("failed to update deployment {key}: {source}")]
    UpdateFailed {
        key: ObjectKey,
        #[source]
        source: StateError,
    },

    #[error("{operation} for {key} cancelled after {timeout:?}")]
    Cancelled {
        operation: Operation,
        key: ObjectKey,
        timeout: Duration,
    },
}

impl ReconcileError {
    /// Whether another pass with the same spec can succeed.
    ///
    /// Build and link failures only clear once the custom resource changes.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ReconcileError::BuildFailed(_) | ReconcileError::LinkFailed(_)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileError::UpdateFailed { source, .. } if source.is_conflict())
    }
}
