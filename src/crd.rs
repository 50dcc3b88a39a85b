use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired state of a podinfo application, optionally with a redis cache sidecar.
#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, Default, JsonSchema, PartialEq)]
#[kube(
    group = "my.api.group",
    version = "v1alpha1",
    kind = "MyAppResource",
    namespaced,
    status = "MyAppResourceStatus",
    shortname = "myapp"
)]
#[serde(rename_all = "camelCase")]
pub struct MyAppResourceSpec {
    #[serde(default)]
    pub replica_count: i32,
    #[serde(default)]
    pub resources: ResourceSettings,
    #[serde(default)]
    pub image: ImageSettings,
    #[serde(default)]
    pub ui: UiSettings,
    #[serde(default)]
    pub redis: RedisSettings,
}

/// Raw quantity strings; validated by [`crate::quantity::parse`] when the workload is built.
#[derive(Serialize, Deserialize, Debug, Clone, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSettings {
    #[serde(default)]
    pub memory_request: String,
    #[serde(default)]
    pub memory_limit: String,
    #[serde(default)]
    pub cpu_request: String,
    #[serde(default)]
    pub cpu_limit: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageSettings {
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub tag: String,
}

impl ImageSettings {
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UiSettings {
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RedisSettings {
    #[serde(default)]
    pub enabled: bool,
}

/// Present so the status subresource is registered; the controller never writes it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, JsonSchema, PartialEq)]
pub struct MyAppResourceStatus {}
