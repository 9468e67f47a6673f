//! # Control-Plane Store
//!
//! The engine's view of the desired-state store: record CRUD, a change
//! stream, and a secret store with owner-scoped cascading deletion.
//!
//! - `k8s`: backed by the Kubernetes API server
//! - `memory`: in-process store with an explicit ownership table
//! - `ownership`: the owner uid → children index used by the in-process store

pub mod k8s;
pub mod memory;
pub mod ownership;

pub use k8s::{KubeRecords, KubeSecrets};
pub use memory::{MemoryCluster, MemoryRecords, MemorySecrets};
pub use ownership::{ChildRef, OwnershipIndex};

use async_trait::async_trait;
use futures::stream::BoxStream;
use k8s_openapi::api::core::v1::Secret;
use kube::Resource;
use std::fmt;
use thiserror::Error;

/// Namespace (if any) plus name of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn of<K: Resource>(obj: &K) -> Self {
        Self {
            namespace: obj.meta().namespace.clone(),
            name: obj.meta().name.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("conflicting write to {0}")]
    Conflict(String),
    #[error("store API error: {0}")]
    Api(String),
    #[error("watch failed: {0}")]
    Watch(String),
}

/// Records of one kind
#[async_trait]
pub trait RecordStore<K>: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>;

    async fn list(&self) -> Result<Vec<K>, StoreError>;

    /// Fails with [`StoreError::AlreadyExists`] if the name is taken
    async fn create(&self, record: &K) -> Result<K, StoreError>;

    async fn set_annotation(
        &self,
        key: &ObjectKey,
        annotation: &str,
        value: &str,
    ) -> Result<(), StoreError>;

    async fn add_finalizer(&self, key: &ObjectKey, finalizer: &str) -> Result<(), StoreError>;

    async fn remove_finalizer(&self, key: &ObjectKey, finalizer: &str) -> Result<(), StoreError>;

    /// Merge-patch the status subresource
    async fn patch_status(
        &self,
        key: &ObjectKey,
        status: serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Request deletion; a missing record is not an error
    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError>;

    /// Every write to a record of this kind, including deletions
    ///
    /// A removed record arrives as its last copy with a deletion timestamp
    /// and no finalizers.
    fn watch(&self) -> BoxStream<'static, Result<K, StoreError>>;
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError>;

    /// Fails with [`StoreError::AlreadyExists`] if the secret exists
    async fn create(&self, secret: &Secret) -> Result<(), StoreError>;

    /// Create or replace
    async fn apply(&self, secret: &Secret) -> Result<(), StoreError>;

    /// A missing secret is not an error
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

/// Current time as a Kubernetes `Time`
pub(crate) fn now_time() -> Option<k8s_openapi::apimachinery::pkg::apis::meta::v1::Time> {
    serde_json::from_value(serde_json::Value::String(chrono::Utc::now().to_rfc3339())).ok()
}
