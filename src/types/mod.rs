pub mod container;
pub mod metadata;
pub mod volume;
pub mod workloads;

pub use container::*;
pub use metadata::*;
pub use volume::*;
pub use workloads::*;

/// A builder that lowers into a namespaced Kubernetes object.
pub trait ChildResource: Send + Sync {
    type K8sType: kube::Resource<DynamicType = ()>
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>;

    fn into_k8s(self, namespace: &str) -> Self::K8sType;
}
