//! # Kubernetes Store
//!
//! `RecordStore` and `SecretStore` backed by the API server. Cascading
//! deletion is left to the Kubernetes garbage collector via owner references.

use super::{now_time, ObjectKey, RecordStore, SecretStore, StoreError};
use crate::constants::{DEFAULT_NAMESPACE, FIELD_MANAGER};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use kube_runtime::watcher;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use std::fmt::Debug;
use tracing::debug;

/// Deleted objects may arrive without a deletion timestamp
fn mark_removed<K: Resource>(mut record: K) -> K {
    let meta = record.meta_mut();
    if meta.deletion_timestamp.is_none() {
        meta.deletion_timestamp = now_time();
    }
    meta.finalizers = None;
    record
}

fn map_kube_error(what: &str, error: kube::Error) -> StoreError {
    match error {
        kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound(what.to_string()),
        kube::Error::Api(api_err) if api_err.code == 409 && api_err.reason == "AlreadyExists" => {
            StoreError::AlreadyExists(what.to_string())
        }
        kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict(what.to_string()),
        other => StoreError::Api(other.to_string()),
    }
}

/// Records of kind `K` in the API server
pub struct KubeRecords<K> {
    client: Client,
    api_for: fn(&Client, &ObjectKey) -> Api<K>,
}

impl<K> std::fmt::Debug for KubeRecords<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeRecords").finish_non_exhaustive()
    }
}

impl<K> KubeRecords<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    pub fn namespaced(client: Client) -> Self {
        Self {
            client,
            api_for: |client, key| {
                Api::namespaced(
                    client.clone(),
                    key.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE),
                )
            },
        }
    }
}

impl<K> KubeRecords<K>
where
    K: Resource<Scope = ClusterResourceScope, DynamicType = ()>,
{
    pub fn cluster(client: Client) -> Self {
        Self {
            client,
            api_for: |client, _| Api::all(client.clone()),
        }
    }
}

impl<K> KubeRecords<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn api(&self, key: &ObjectKey) -> Api<K> {
        (self.api_for)(&self.client, key)
    }

    async fn patch_finalizers(
        &self,
        key: &ObjectKey,
        edit: impl FnOnce(&mut Vec<String>) -> bool + Send,
    ) -> Result<(), StoreError> {
        let api = self.api(key);
        let what = key.to_string();
        let current = api
            .get(&key.name)
            .await
            .map_err(|e| map_kube_error(&what, e))?;
        let mut finalizers = current.meta().finalizers.clone().unwrap_or_default();
        if !edit(&mut finalizers) {
            return Ok(());
        }
        // resourceVersion turns a concurrent edit into a 409 instead of a lost update
        let patch = json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": current.meta().resource_version,
            }
        });
        api.patch(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_error(&what, e))?;
        Ok(())
    }
}

#[async_trait]
impl<K> RecordStore<K> for KubeRecords<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        self.api(key)
            .get_opt(&key.name)
            .await
            .map_err(|e| map_kube_error(&key.to_string(), e))
    }

    async fn list(&self) -> Result<Vec<K>, StoreError> {
        let api: Api<K> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| map_kube_error(&K::kind(&()), e))?;
        Ok(list.items)
    }

    async fn create(&self, record: &K) -> Result<K, StoreError> {
        let key = ObjectKey::of(record);
        self.api(&key)
            .create(&PostParams::default(), record)
            .await
            .map_err(|e| map_kube_error(&key.to_string(), e))
    }

    async fn set_annotation(
        &self,
        key: &ObjectKey,
        annotation: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let patch = json!({ "metadata": { "annotations": { annotation: value } } });
        self.api(key)
            .patch(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_error(&key.to_string(), e))?;
        Ok(())
    }

    async fn add_finalizer(&self, key: &ObjectKey, finalizer: &str) -> Result<(), StoreError> {
        self.patch_finalizers(key, |finalizers| {
            if finalizers.iter().any(|f| f == finalizer) {
                return false;
            }
            finalizers.push(finalizer.to_string());
            true
        })
        .await
    }

    async fn remove_finalizer(&self, key: &ObjectKey, finalizer: &str) -> Result<(), StoreError> {
        let result = self
            .patch_finalizers(key, |finalizers| {
                let before = finalizers.len();
                finalizers.retain(|f| f != finalizer);
                finalizers.len() != before
            })
            .await;
        match result {
            // Already gone: the finalizer was the last thing holding it
            Err(StoreError::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    async fn patch_status(
        &self,
        key: &ObjectKey,
        status: serde_json::Value,
    ) -> Result<(), StoreError> {
        let patch = json!({ "status": status });
        self.api(key)
            .patch_status(
                &key.name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await
            .map_err(|e| map_kube_error(&key.to_string(), e))?;
        Ok(())
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        match self
            .api(key)
            .delete(&key.name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(map_kube_error(&key.to_string(), e)),
        }
    }

    fn watch(&self) -> BoxStream<'static, Result<K, StoreError>> {
        let api: Api<K> = Api::all(self.client.clone());
        watcher(api, watcher::Config::default().any_semantic())
            .filter_map(|event| async move {
                match event {
                    Ok(watcher::Event::Apply(record) | watcher::Event::InitApply(record)) => {
                        Some(Ok(record))
                    }
                    Ok(watcher::Event::Delete(record)) => Some(Ok(mark_removed(record))),
                    Ok(watcher::Event::Init | watcher::Event::InitDone) => None,
                    Err(e) => Some(Err(StoreError::Watch(format!("{e:?}")))),
                }
            })
            .boxed()
    }
}

/// Secrets in the API server
#[derive(Clone)]
pub struct KubeSecrets {
    client: Client,
}

impl std::fmt::Debug for KubeSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecrets").finish_non_exhaustive()
    }
}

impl KubeSecrets {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn secret_key(secret: &Secret) -> (String, String) {
    (
        secret
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        secret.metadata.name.clone().unwrap_or_default(),
    )
}

#[async_trait]
impl SecretStore for KubeSecrets {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        self.api(namespace)
            .get_opt(name)
            .await
            .map_err(|e| map_kube_error(&format!("secret {namespace}/{name}"), e))
    }

    async fn create(&self, secret: &Secret) -> Result<(), StoreError> {
        let (namespace, name) = secret_key(secret);
        self.api(&namespace)
            .create(&PostParams::default(), secret)
            .await
            .map_err(|e| map_kube_error(&format!("secret {namespace}/{name}"), e))?;
        Ok(())
    }

    async fn apply(&self, secret: &Secret) -> Result<(), StoreError> {
        let (namespace, name) = secret_key(secret);
        self.api(&namespace)
            .patch(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(secret),
            )
            .await
            .map_err(|e| map_kube_error(&format!("secret {namespace}/{name}"), e))?;
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        match self.api(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!("Secret {}/{} already absent", namespace, name);
                Ok(())
            }
            Err(e) => Err(map_kube_error(&format!("secret {namespace}/{name}"), e)),
        }
    }
}
