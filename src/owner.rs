//! Controller owner references from generated workloads back to their custom resource.
//!
//! Linking only records the relationship in object metadata. Deleting the
//! workload when its owner goes away is done by the cluster's garbage collector.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("kind {kind} ({api_version}) is not registered in the type registry")]
    UnregisteredKind { api_version: String, kind: String },

    #[error("owner {kind}/{name} has no uid")]
    MissingUid { kind: String, name: String },

    #[error("cross-namespace owner references are disallowed: owner in {owner_namespace:?}, object in {object_namespace:?}")]
    CrossNamespace {
        owner_namespace: String,
        object_namespace: String,
    },

    #[error("object is already controlled by {kind}/{name}")]
    AlreadyOwned { kind: String, name: String },
}

/// Identity of an owning object, as recorded in an owner reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentity {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub uid: Option<String>,
}

impl ResourceIdentity {
    pub fn of<K>(obj: &K) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        Self {
            api_version: K::api_version(&()).to_string(),
            kind: K::kind(&()).to_string(),
            name: obj.name_any(),
            namespace: obj.namespace(),
            uid: obj.uid(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct TypeKey {
    api_version: String,
    kind: String,
}

/// The set of kinds this controller knows how to reference.
///
/// Built once at start-up and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    kinds: BTreeSet<TypeKey>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<K>(mut self) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        self.kinds.insert(TypeKey {
            api_version: K::api_version(&()).to_string(),
            kind: K::kind(&()).to_string(),
        });
        self
    }

    pub fn contains(&self, api_version: &str, kind: &str) -> bool {
        self.kinds.contains(&TypeKey {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
        })
    }

    /// Makes `owner` the single controller of `target`.
    ///
    /// A reference already pointing at the same owner is replaced, so linking
    /// twice leaves the object unchanged. Only the fresh object is touched.
    pub fn link<K>(&self, owner: &ResourceIdentity, target: &mut K) -> Result<(), LinkError>
    where
        K: Resource,
    {
        if !self.contains(&owner.api_version, &owner.kind) {
            return Err(LinkError::UnregisteredKind {
                api_version: owner.api_version.clone(),
                kind: owner.kind.clone(),
            });
        }

        let uid = owner.uid.clone().ok_or_else(|| LinkError::MissingUid {
            kind: owner.kind.clone(),
            name: owner.name.clone(),
        })?;

        let meta = target.meta_mut();
        check_namespace(owner, meta)?;

        let references = meta.owner_references.get_or_insert_with(Vec::new);
        if let Some(existing) = references
            .iter()
            .find(|r| r.controller == Some(true) && r.uid != uid)
        {
            return Err(LinkError::AlreadyOwned {
                kind: existing.kind.clone(),
                name: existing.name.clone(),
            });
        }

        references.retain(|r| r.uid != uid);
        references.push(OwnerReference {
            api_version: owner.api_version.clone(),
            kind: owner.kind.clone(),
            name: owner.name.clone(),
            uid,
            controller: Some(true),
            block_owner_deletion: Some(true),
        });

        Ok(())
    }
}

fn check_namespace(owner: &ResourceIdentity, meta: &ObjectMeta) -> Result<(), LinkError> {
    match (&owner.namespace, &meta.namespace) {
        (Some(owner_ns), object_ns) if object_ns.as_deref() != Some(owner_ns.as_str()) => {
            Err(LinkError::CrossNamespace {
                owner_namespace: owner_ns.clone(),
                object_namespace: object_ns.clone().unwrap_or_default(),
            })
        }
        _ => Ok(()),
    }
}

/// Returns the controller reference of `obj`, if any.
pub fn controller_of<K: Resource>(obj: &K) -> Option<&OwnerReference> {
    obj.meta()
        .owner_references
        .as_ref()?
        .iter()
        .find(|r| r.controller == Some(true))
}
