use super::{Container, Labels, Volume};
use crate::types::ChildResource;
use k8s_openapi::api::apps::v1 as apps;
use k8s_openapi::api::core::v1 as core;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

/// Deployment whose selector is always derived from its pod template labels,
/// so the two can never disagree.
#[derive(Clone, Debug, PartialEq)]
pub struct Deployment {
    pub name: String,
    pub replicas: i32,
    pub pod_labels: Labels,
    pub containers: Vec<Container>,
    pub volumes: Vec<Volume>,
    pub restart_policy: Option<String>,
}

impl Deployment {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            pod_labels: Labels::new().insert("app", &name),
            name,
            replicas: 1,
            containers: Vec::new(),
            volumes: Vec::new(),
            restart_policy: None,
        }
    }

    pub fn replicas(mut self, n: i32) -> Self {
        self.replicas = n;
        self
    }

    pub fn pod_labels(mut self, labels: Labels) -> Self {
        self.pod_labels = labels;
        self
    }

    pub fn containers(mut self, containers: impl IntoIterator<Item = Container>) -> Self {
        self.containers.extend(containers);
        self
    }

    pub fn volume(mut self, volume: Volume) -> Self {
        self.volumes.push(volume);
        self
    }

    pub fn restart_always(mut self) -> Self {
        self.restart_policy = Some("Always".to_string());
        self
    }
}

impl ChildResource for Deployment {
    type K8sType = apps::Deployment;

    fn into_k8s(self, namespace: &str) -> Self::K8sType {
        let labels = self.pod_labels.into_inner();
        apps::Deployment {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: Some(apps::DeploymentSpec {
                replicas: Some(self.replicas),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    match_expressions: None,
                },
                template: core::PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(core::PodSpec {
                        containers: self.containers.into_iter().map(|c| c.into_k8s()).collect(),
                        volumes: if self.volumes.is_empty() {
                            None
                        } else {
                            Some(self.volumes.into_iter().map(|v| v.into_k8s()).collect())
                        },
                        restart_policy: self.restart_policy,
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}
