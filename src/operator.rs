use crate::config::OperatorConfig;
use crate::context::Context;
use crate::crd::MyAppResource;
use crate::engine::{Outcome, ReconcileEngine};
use crate::error::{Error, ReconcileError, Result};
use crate::state::{KubeStateAccess, ObjectKey};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Client, Resource, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Watches `MyAppResource` objects and their Deployments and runs a pass per change.
///
/// Event delivery, caching, per-key serialization and back-off come from the
/// kube runtime [`Controller`]; each pass is delegated to [`ReconcileEngine`].
pub struct Operator {
    config: OperatorConfig,
}

impl Operator {
    pub fn new(config: OperatorConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        let client = Client::try_default().await.map_err(Error::Kube)?;
        self.run_with_client(client).await
    }

    pub async fn run_with_client(self, client: Client) -> Result<()> {
        let (apps, deployments): (Api<MyAppResource>, Api<Deployment>) =
            match &self.config.watch_namespace {
                Some(ns) => (
                    Api::namespaced(client.clone(), ns),
                    Api::namespaced(client.clone(), ns),
                ),
                None => (Api::all(client.clone()), Api::all(client.clone())),
            };

        info!(
            "Starting operator for {}/{} in {}",
            MyAppResource::group(&()),
            MyAppResource::kind(&()),
            self.config.watch_namespace.as_deref().unwrap_or("all namespaces")
        );

        let state = KubeStateAccess::new(client, self.config.field_manager.clone());
        let engine = ReconcileEngine::new(
            Context::new(state).with_request_timeout(self.config.request_timeout),
        );

        let controller_ctx = Arc::new(ControllerContext {
            engine,
            requeue_after: self.config.requeue_after,
            error_requeue: self.config.error_requeue,
        });

        Controller::new(apps, WatcherConfig::default())
            .owns(deployments, WatcherConfig::default())
            .shutdown_on_signal()
            .run(reconcile, error_policy, controller_ctx)
            .for_each(|result| async move {
                match result {
                    Ok((resource, action)) => {
                        info!("Reconciled {} - {:?}", resource.name, action);
                    }
                    Err(e) => {
                        warn!("Reconciliation error: {:?}", e);
                    }
                }
            })
            .await;

        info!("Operator stopped");
        Ok(())
    }
}

struct ControllerContext {
    engine: ReconcileEngine<KubeStateAccess>,
    requeue_after: Duration,
    error_requeue: Duration,
}

async fn reconcile(
    resource: Arc<MyAppResource>,
    ctx: Arc<ControllerContext>,
) -> std::result::Result<Action, ReconcileError> {
    let key = ObjectKey::of(resource.as_ref());
    match ctx.engine.reconcile(&key).await? {
        Outcome::Skipped => Ok(Action::await_change()),
        Outcome::Created | Outcome::Updated => Ok(Action::requeue(ctx.requeue_after)),
    }
}

fn error_policy(
    resource: Arc<MyAppResource>,
    error: &ReconcileError,
    ctx: Arc<ControllerContext>,
) -> Action {
    error!("Error reconciling {}: {}", resource.name_any(), error);
    retry_action(error, ctx.error_requeue)
}

/// Retryable failures back off; the rest need an edit to the resource, which
/// triggers its own pass.
fn retry_action(error: &ReconcileError, error_requeue: Duration) -> Action {
    if error.is_retryable() {
        Action::requeue(error_requeue)
    } else {
        Action::await_change()
    }
}
