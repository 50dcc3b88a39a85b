//! Access to the control plane's object store.

use crate::crd::MyAppResource;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, PostParams};
use kube::{Client, Resource, ResourceExt};
use std::fmt;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Namespaced name shared by a custom resource and the workload generated for it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn of<K: Resource>(obj: &K) -> Self {
        Self::new(obj.namespace().unwrap_or_default(), obj.name_any())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("{0} already exists")]
    AlreadyExists(ObjectKey),

    #[error("{0} was modified concurrently")]
    Conflict(ObjectKey),

    #[error("invalid object: {0}")]
    Invalid(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl StateError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StateError::Conflict(_))
    }
}

/// The get/create/update operations a reconciliation pass needs.
///
/// `get_*` return `Ok(None)` when the object does not exist.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StateAccess: Send + Sync {
    async fn get_app(&self, key: &ObjectKey) -> Result<Option<MyAppResource>, StateError>;

    async fn get_deployment(&self, key: &ObjectKey) -> Result<Option<Deployment>, StateError>;

    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), StateError>;

    /// Replaces the stored object wholesale.
    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), StateError>;
}

/// [`StateAccess`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStateAccess {
    client: Client,
    field_manager: String,
}

impl KubeStateAccess {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn key_of(deployment: &Deployment) -> Result<ObjectKey, StateError> {
    let name = deployment
        .metadata
        .name
        .clone()
        .ok_or_else(|| StateError::Invalid("deployment has no name".to_string()))?;
    let namespace = deployment
        .metadata
        .namespace
        .clone()
        .ok_or_else(|| StateError::Invalid(format!("deployment {name} has no namespace")))?;
    Ok(ObjectKey::new(namespace, name))
}

fn is_status(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(e) if e.code == code)
}

#[async_trait]
impl StateAccess for KubeStateAccess {
    async fn get_app(&self, key: &ObjectKey) -> Result<Option<MyAppResource>, StateError> {
        let api: Api<MyAppResource> = Api::namespaced(self.client.clone(), &key.namespace);
        Ok(api.get_opt(&key.name).await?)
    }

    async fn get_deployment(&self, key: &ObjectKey) -> Result<Option<Deployment>, StateError> {
        Ok(self.deployments(&key.namespace).get_opt(&key.name).await?)
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), StateError> {
        let key = key_of(deployment)?;
        match self
            .deployments(&key.namespace)
            .create(&self.post_params(), deployment)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_status(&e, 409) => Err(StateError::AlreadyExists(key)),
            Err(e) => Err(StateError::Kube(e)),
        }
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), StateError> {
        let key = key_of(deployment)?;
        match self
            .deployments(&key.namespace)
            .replace(&key.name, &self.post_params(), deployment)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_status(&e, 409) => Err(StateError::Conflict(key)),
            Err(e) => Err(StateError::Kube(e)),
        }
    }
}
