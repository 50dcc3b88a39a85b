//! Translates a [`MyAppResourceSpec`] into the Deployment that should exist for it.
//!
//! Building is pure: the same spec always yields the same Deployment, and any
//! invalid resource quantity aborts the build before anything is assembled.

use crate::crd::{MyAppResource, MyAppResourceSpec, ResourceSettings, UiSettings};
use crate::quantity::{self, Quantity, ResourceField, ValidationError};
use crate::types::{ChildResource, Container, Deployment, Labels, Resources, Volume};
use k8s_openapi::api::apps::v1 as apps;
use kube::ResourceExt;
use tracing::debug;

pub const APP_LABEL_KEY: &str = "app";
pub const APP_LABEL_VALUE: &str = "myappresource";

pub const APP_CONTAINER: &str = "podinfo";
pub const APP_PORT: i32 = 9898;
pub const CACHE_CONTAINER: &str = "redis";
pub const CACHE_IMAGE: &str = "redis:latest";
pub const CACHE_PORT: i32 = 6379;

pub const CONF_VOLUME: &str = "conf";
pub const DATA_VOLUME: &str = "data";

/// Resolved by the kubelet from the `POD_IP` variable declared before it.
pub const CACHE_SERVER_ADDRESS: &str = "tcp://$(POD_IP):6379";

/// The four validated quantities of `spec.resources`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceQuotas {
    pub memory_request: Quantity,
    pub memory_limit: Quantity,
    pub cpu_request: Quantity,
    pub cpu_limit: Quantity,
}

impl ResourceQuotas {
    /// Validates every field, stopping at the first malformed one.
    pub fn parse(settings: &ResourceSettings) -> Result<Self, ValidationError> {
        Ok(Self {
            memory_request: quantity::parse(ResourceField::MemoryRequest, &settings.memory_request)?,
            memory_limit: quantity::parse(ResourceField::MemoryLimit, &settings.memory_limit)?,
            cpu_request: quantity::parse(ResourceField::CpuRequest, &settings.cpu_request)?,
            cpu_limit: quantity::parse(ResourceField::CpuLimit, &settings.cpu_limit)?,
        })
    }

    pub fn requirements(&self) -> Resources {
        Resources::new()
            .memory(self.memory_request.clone(), self.memory_limit.clone())
            .cpu(self.cpu_request.clone(), self.cpu_limit.clone())
    }
}

/// Container layout of the pod template.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// podinfo alone.
    CacheDisabled,
    /// redis first, then podinfo wired to it over the pod IP.
    CacheEnabled,
}

impl Topology {
    pub fn for_spec(spec: &MyAppResourceSpec) -> Self {
        if spec.redis.enabled {
            Topology::CacheEnabled
        } else {
            Topology::CacheDisabled
        }
    }

    fn containers(self, image: String, ui: &UiSettings, quotas: &ResourceQuotas) -> Vec<Container> {
        match self {
            Topology::CacheDisabled => vec![app_container(image, quotas)
                .env("PODINFO_UI_COLOR", &ui.color)
                .env("PODINFO_UI_MESSAGE", &ui.message)],
            Topology::CacheEnabled => vec![
                cache_container(quotas),
                app_container(image, quotas)
                    .env_from_field("POD_IP", "status.podIP")
                    .env("PODINFO_UI_COLOR", &ui.color)
                    .env("PODINFO_UI_MESSAGE", &ui.message)
                    .env("PODINFO_CACHE_SERVER", CACHE_SERVER_ADDRESS),
            ],
        }
    }
}

fn app_container(image: String, quotas: &ResourceQuotas) -> Container {
    Container::new(APP_CONTAINER, image)
        .command(vec!["./podinfo", "--port=9898"])
        .tcp_port("http", APP_PORT)
        .resources(quotas.requirements())
}

fn cache_container(quotas: &ResourceQuotas) -> Container {
    Container::new(CACHE_CONTAINER, CACHE_IMAGE)
        .command(vec!["redis-server"])
        .tcp_port("client", CACHE_PORT)
        .resources(quotas.requirements())
        .volume_mount(CONF_VOLUME, "/conf")
        .volume_mount(DATA_VOLUME, "/data")
}

pub fn workload_labels() -> Labels {
    Labels::new().insert(APP_LABEL_KEY, APP_LABEL_VALUE)
}

/// Builds the workload for `spec`, named and placed like its owner.
pub fn build_workload(
    name: &str,
    namespace: &str,
    spec: &MyAppResourceSpec,
) -> Result<apps::Deployment, ValidationError> {
    let quotas = ResourceQuotas::parse(&spec.resources)?;
    let topology = Topology::for_spec(spec);
    debug!("Building Deployment {}/{} ({:?})", namespace, name, topology);

    let deployment = Deployment::new(name)
        .replicas(spec.replica_count)
        .pod_labels(workload_labels())
        .restart_always()
        .containers(topology.containers(spec.image.reference(), &spec.ui, &quotas))
        .volume(Volume::empty_dir(CONF_VOLUME))
        .volume(Volume::empty_dir(DATA_VOLUME));

    Ok(deployment.into_k8s(namespace))
}

pub fn build(app: &MyAppResource) -> Result<apps::Deployment, ValidationError> {
    build_workload(
        &app.name_any(),
        &app.namespace().unwrap_or_default(),
        &app.spec,
    )
}
