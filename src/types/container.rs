use crate::quantity::Quantity;
use k8s_openapi::api::core::v1 as k8s;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub struct Container {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub ports: Vec<ContainerPort>,
    pub env: Vec<EnvVar>,
    pub resources: Option<Resources>,
    pub volume_mounts: Vec<VolumeMount>,
}

impl Container {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command: Vec::new(),
            ports: Vec::new(),
            env: Vec::new(),
            resources: None,
            volume_mounts: Vec::new(),
        }
    }

    pub fn command(mut self, cmd: Vec<impl Into<String>>) -> Self {
        self.command = cmd.into_iter().map(Into::into).collect();
        self
    }

    /// Exposes a named TCP port.
    pub fn tcp_port(mut self, name: impl Into<String>, port: i32) -> Self {
        self.ports.push(ContainerPort {
            container_port: port,
            name: Some(name.into()),
            protocol: Some("TCP".to_string()),
        });
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvVar::Value {
            name: key.into(),
            value: value.into(),
        });
        self
    }

    /// Sources the variable from a field of the hosting pod, e.g. `status.podIP`.
    pub fn env_from_field(
        mut self,
        name: impl Into<String>,
        field_path: impl Into<String>,
    ) -> Self {
        self.env.push(EnvVar::FieldRef {
            name: name.into(),
            field_path: field_path.into(),
        });
        self
    }

    pub fn resources(mut self, resources: Resources) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn volume_mount(
        mut self,
        name: impl Into<String>,
        mount_path: impl Into<String>,
    ) -> Self {
        self.volume_mounts.push(VolumeMount {
            name: name.into(),
            mount_path: mount_path.into(),
        });
        self
    }

    pub fn into_k8s(self) -> k8s::Container {
        k8s::Container {
            name: self.name,
            image: Some(self.image),
            command: if self.command.is_empty() {
                None
            } else {
                Some(self.command)
            },
            ports: if self.ports.is_empty() {
                None
            } else {
                Some(self.ports.into_iter().map(|p| p.into_k8s()).collect())
            },
            env: if self.env.is_empty() {
                None
            } else {
                Some(self.env.into_iter().map(|e| e.into_k8s()).collect())
            },
            resources: self.resources.map(|r| r.into_k8s()),
            volume_mounts: if self.volume_mounts.is_empty() {
                None
            } else {
                Some(
                    self.volume_mounts
                        .into_iter()
                        .map(|v| v.into_k8s())
                        .collect(),
                )
            },
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContainerPort {
    pub container_port: i32,
    pub name: Option<String>,
    pub protocol: Option<String>,
}

impl ContainerPort {
    pub fn into_k8s(self) -> k8s::ContainerPort {
        k8s::ContainerPort {
            container_port: self.container_port,
            name: self.name,
            protocol: self.protocol,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EnvVar {
    Value { name: String, value: String },
    FieldRef { name: String, field_path: String },
}

impl EnvVar {
    pub fn into_k8s(self) -> k8s::EnvVar {
        match self {
            EnvVar::Value { name, value } => k8s::EnvVar {
                name,
                value: Some(value),
                value_from: None,
            },
            EnvVar::FieldRef { name, field_path } => k8s::EnvVar {
                name,
                value: None,
                value_from: Some(k8s::EnvVarSource {
                    field_ref: Some(k8s::ObjectFieldSelector {
                        field_path,
                        api_version: None,
                    }),
                    ..Default::default()
                }),
            },
        }
    }
}

/// Requests and limits keyed by resource name (`cpu`, `memory`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resources {
    pub requests: BTreeMap<String, Quantity>,
    pub limits: BTreeMap<String, Quantity>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cpu_request(mut self, cpu: Quantity) -> Self {
        self.requests.insert("cpu".to_string(), cpu);
        self
    }

    pub fn cpu_limit(mut self, cpu: Quantity) -> Self {
        self.limits.insert("cpu".to_string(), cpu);
        self
    }

    pub fn memory_request(mut self, memory: Quantity) -> Self {
        self.requests.insert("memory".to_string(), memory);
        self
    }

    pub fn memory_limit(mut self, memory: Quantity) -> Self {
        self.limits.insert("memory".to_string(), memory);
        self
    }

    pub fn cpu(self, request: Quantity, limit: Quantity) -> Self {
        self.cpu_request(request).cpu_limit(limit)
    }

    pub fn memory(self, request: Quantity, limit: Quantity) -> Self {
        self.memory_request(request).memory_limit(limit)
    }

    pub fn into_k8s(self) -> k8s::ResourceRequirements {
        let lower = |list: BTreeMap<String, Quantity>| {
            if list.is_empty() {
                None
            } else {
                Some(list.into_iter().map(|(k, v)| (k, v.to_k8s())).collect())
            }
        };

        k8s::ResourceRequirements {
            requests: lower(self.requests),
            limits: lower(self.limits),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
}

impl VolumeMount {
    pub fn into_k8s(self) -> k8s::VolumeMount {
        k8s::VolumeMount {
            name: self.name,
            mount_path: self.mount_path,
            ..Default::default()
        }
    }
}
