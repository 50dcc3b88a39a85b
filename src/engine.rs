//! One reconciliation pass: fetch, build, link, then create or overwrite.

use crate::builder;
use crate::context::Context;
use crate::error::{Operation, ReconcileError};
use crate::owner::ResourceIdentity;
use crate::state::{ObjectKey, StateAccess, StateError};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info};

/// How a successful pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The custom resource no longer exists; nothing was written.
    Skipped,
    Created,
    Updated,
}

/// Drives passes for any number of keys; holds no per-pass state.
pub struct ReconcileEngine<S> {
    ctx: Arc<Context<S>>,
}

impl<S> Clone for ReconcileEngine<S> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl<S: StateAccess> ReconcileEngine<S> {
    pub fn new(ctx: Context<S>) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &Context<S> {
        &self.ctx
    }

    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Outcome, ReconcileError> {
        let state = self.ctx.state();

        let app = match self.bounded(Operation::GetApp, key, state.get_app(key)).await? {
            Ok(Some(app)) => app,
            Ok(None) => {
                debug!("MyAppResource {} not found, skipping", key);
                return Ok(Outcome::Skipped);
            }
            Err(source) => {
                error!("Failed to fetch MyAppResource {}: {}", key, source);
                return Err(ReconcileError::FetchFailed {
                    kind: "MyAppResource",
                    key: key.clone(),
                    source,
                });
            }
        };

        info!("Reconciling {}", key);

        let mut desired = builder::build(&app).map_err(|e| {
            error!("Failed to create Deployment spec for {}: {}", key, e);
            ReconcileError::from(e)
        })?;

        self.ctx
            .registry()
            .link(&ResourceIdentity::of(&app), &mut desired)
            .map_err(|e| {
                error!("Failed to set controller reference on Deployment {}: {}", key, e);
                ReconcileError::from(e)
            })?;

        let existing = self
            .bounded(Operation::GetDeployment, key, state.get_deployment(key))
            .await?
            .map_err(|source| {
                error!("Failed to check for existing Deployment {}: {}", key, source);
                ReconcileError::FetchFailed {
                    kind: "Deployment",
                    key: key.clone(),
                    source,
                }
            })?;

        match existing {
            None => {
                info!("Creating Deployment {}", key);
                match self
                    .bounded(Operation::CreateDeployment, key, state.create_deployment(&desired))
                    .await?
                {
                    Ok(()) => info!("Deployment {} created", key),
                    Err(StateError::AlreadyExists(_)) => {
                        debug!("Deployment {} created concurrently by another writer", key);
                    }
                    Err(source) => {
                        error!("Failed to create Deployment {}: {}", key, source);
                        return Err(ReconcileError::CreateFailed {
                            key: key.clone(),
                            source,
                        });
                    }
                }
                Ok(Outcome::Created)
            }
            Some(live) => {
                info!("Updating Deployment {}", key);
                desired.metadata.resource_version = live.metadata.resource_version;
                self.bounded(Operation::UpdateDeployment, key, state.update_deployment(&desired))
                    .await?
                    .map_err(|source| {
                        error!("Failed to update Deployment {}: {}", key, source);
                        ReconcileError::UpdateFailed {
                            key: key.clone(),
                            source,
                        }
                    })?;
                info!("Deployment {} updated", key);
                Ok(Outcome::Updated)
            }
        }
    }

    /// Runs `call` under the request timeout, dropping it if the timeout elapses.
    async fn bounded<T, F>(
        &self,
        operation: Operation,
        key: &ObjectKey,
        call: F,
    ) -> Result<Result<T, StateError>, ReconcileError>
    where
        F: Future<Output = Result<T, StateError>>,
    {
        let timeout = self.ctx.request_timeout();
        tokio::time::timeout(timeout, call).await.map_err(|_| {
            error!("{} for {} timed out after {:?}", operation, key, timeout);
            ReconcileError::Cancelled {
                operation,
                key: key.clone(),
                timeout,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{MyAppResource, MyAppResourceSpec, ResourceSettings};
    use crate::state::MockStateAccess;
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn key() -> ObjectKey {
        ObjectKey::new("default", "demo")
    }

    fn app() -> MyAppResource {
        let mut app = MyAppResource::new(
            "demo",
            MyAppResourceSpec {
                replica_count: 1,
                resources: ResourceSettings {
                    memory_request: "32Mi".into(),
                    memory_limit: "64Mi".into(),
                    cpu_request: "100m".into(),
                    cpu_limit: "200m".into(),
                },
                ..Default::default()
            },
        );
        app.metadata.namespace = Some("default".into());
        app.metadata.uid = Some("uid-1".into());
        app
    }

    fn live() -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some("demo".into()),
                namespace: Some("default".into()),
                resource_version: Some("42".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn engine(mock: MockStateAccess) -> ReconcileEngine<MockStateAccess> {
        ReconcileEngine::new(Context::new(mock))
    }

    #[tokio::test]
    async fn missing_resource_is_skipped_without_writes() {
        let mut mock = MockStateAccess::new();
        mock.expect_get_app().times(1).returning(|_| Ok(None));
        mock.expect_get_deployment().never();
        mock.expect_create_deployment().never();
        mock.expect_update_deployment().never();

        assert_eq!(engine(mock).reconcile(&key()).await.unwrap(), Outcome::Skipped);
    }

    #[tokio::test]
    async fn fetch_error_is_reported() {
        let mut mock = MockStateAccess::new();
        mock.expect_get_app()
            .returning(|_| Err(StateError::Invalid("boom".into())));
        mock.expect_get_deployment().never();

        let err = engine(mock).reconcile(&key()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::FetchFailed { kind: "MyAppResource", .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn invalid_quantity_stops_before_any_cluster_call() {
        let mut bad = app();
        bad.spec.resources.cpu_limit = "notaquantity".into();

        let mut mock = MockStateAccess::new();
        mock.expect_get_app()
            .returning(move |_| Ok(Some(bad.clone())));
        mock.expect_get_deployment().never();
        mock.expect_create_deployment().never();
        mock.expect_update_deployment().never();

        let err = engine(mock).reconcile(&key()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::BuildFailed(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn owner_without_uid_fails_linking() {
        let mut orphan = app();
        orphan.metadata.uid = None;

        let mut mock = MockStateAccess::new();
        mock.expect_get_app()
            .returning(move |_| Ok(Some(orphan.clone())));
        mock.expect_get_deployment().never();

        let err = engine(mock).reconcile(&key()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::LinkFailed(_)));
    }

    #[tokio::test]
    async fn absent_deployment_is_created_with_owner() {
        let mut mock = MockStateAccess::new();
        mock.expect_get_app().returning(|_| Ok(Some(app())));
        mock.expect_get_deployment().returning(|_| Ok(None));
        mock.expect_create_deployment()
            .withf(|d| {
                d.metadata.name.as_deref() == Some("demo")
                    && d.metadata
                        .owner_references
                        .as_ref()
                        .is_some_and(|refs| refs.len() == 1 && refs[0].uid == "uid-1")
            })
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_update_deployment().never();

        assert_eq!(engine(mock).reconcile(&key()).await.unwrap(), Outcome::Created);
    }

    #[tokio::test]
    async fn create_race_counts_as_created() {
        let mut mock = MockStateAccess::new();
        mock.expect_get_app().returning(|_| Ok(Some(app())));
        mock.expect_get_deployment().returning(|_| Ok(None));
        mock.expect_create_deployment()
            .returning(|_| Err(StateError::AlreadyExists(key())));

        assert_eq!(engine(mock).reconcile(&key()).await.unwrap(), Outcome::Created);
    }

    #[tokio::test]
    async fn other_create_errors_are_reported() {
        let mut mock = MockStateAccess::new();
        mock.expect_get_app().returning(|_| Ok(Some(app())));
        mock.expect_get_deployment().returning(|_| Ok(None));
        mock.expect_create_deployment()
            .returning(|_| Err(StateError::Invalid("rejected".into())));

        let err = engine(mock).reconcile(&key()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::CreateFailed { .. }));
    }

    #[tokio::test]
    async fn existing_deployment_is_overwritten_at_observed_version() {
        let mut mock = MockStateAccess::new();
        mock.expect_get_app().returning(|_| Ok(Some(app())));
        mock.expect_get_deployment().returning(|_| Ok(Some(live())));
        mock.expect_create_deployment().never();
        mock.expect_update_deployment()
            .withf(|d| {
                d.metadata.resource_version.as_deref() == Some("42")
                    && d.spec.as_ref().and_then(|s| s.replicas) == Some(1)
            })
            .times(1)
            .returning(|_| Ok(()));

        assert_eq!(engine(mock).reconcile(&key()).await.unwrap(), Outcome::Updated);
    }

    #[tokio::test]
    async fn update_conflict_is_a_retryable_failure() {
        let mut mock = MockStateAccess::new();
        mock.expect_get_app().returning(|_| Ok(Some(app())));
        mock.expect_get_deployment().returning(|_| Ok(Some(live())));
        mock.expect_update_deployment()
            .returning(|_| Err(StateError::Conflict(key())));

        let err = engine(mock).reconcile(&key()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::UpdateFailed { .. }));
        assert!(err.is_conflict());
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn existence_check_error_is_a_fetch_failure() {
        let mut mock = MockStateAccess::new();
        mock.expect_get_app().returning(|_| Ok(Some(app())));
        mock.expect_get_deployment()
            .returning(|_| Err(StateError::Invalid("unavailable".into())));
        mock.expect_create_deployment().never();
        mock.expect_update_deployment().never();

        let err = engine(mock).reconcile(&key()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::FetchFailed { kind: "Deployment", .. }));
    }
}
