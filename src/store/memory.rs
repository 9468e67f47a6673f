//! # In-Process Store
//!
//! A control-plane store that lives in memory. It mirrors the API server
//! semantics the engine depends on:
//!
//! - creation assigns uid, generation and resourceVersion
//! - deletion of a record holding finalizers only sets `deletionTimestamp`
//! - removing the last finalizer of a deleting record removes it
//! - removal cascades to everything registered as owned by the record
//!
//! Used by the integration tests and for running the engine without a
//! cluster.

use super::ownership::{ChildRef, OwnershipIndex};
use super::{now_time, ObjectKey, RecordStore, SecretStore, StoreError};
use crate::constants::DEFAULT_NAMESPACE;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;
use tracing::{debug, warn};

const WATCH_BUFFER: usize = 1024;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A record collection the garbage collector can delete from
trait Collectable: Send + Sync {
    /// Request deletion of `key`. Returns the uid when the record was
    /// removed outright, `None` when it is gone already or held by finalizers.
    fn request_delete(&self, key: &ObjectKey) -> Option<String>;
}

/// Shared state of one in-process cluster: secrets, the ownership table and
/// the record collections registered against it
pub struct MemoryCluster {
    secrets: Mutex<BTreeMap<ObjectKey, Secret>>,
    ownership: OwnershipIndex,
    collectors: Mutex<HashMap<String, Weak<dyn Collectable>>>,
}

impl Debug for MemoryCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCluster")
            .field("secrets", &lock(&self.secrets).len())
            .finish_non_exhaustive()
    }
}

impl MemoryCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            secrets: Mutex::new(BTreeMap::new()),
            ownership: OwnershipIndex::new(),
            collectors: Mutex::new(HashMap::new()),
        })
    }

    pub fn ownership(&self) -> &OwnershipIndex {
        &self.ownership
    }

    /// Secret lookup without going through the async trait
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        lock(&self.secrets)
            .get(&ObjectKey::namespaced(namespace, name))
            .cloned()
    }

    pub fn secret_count(&self) -> usize {
        lock(&self.secrets).len()
    }

    fn register_collector(&self, kind: String, collector: Weak<dyn Collectable>) {
        lock(&self.collectors).insert(kind, collector);
    }

    /// Delete everything owned by `owner_uid`, transitively
    ///
    /// No lock is held while a collector runs, so a record removed by the
    /// pass may itself trigger further collection.
    fn collect(&self, owner_uid: &str) {
        let mut pending = vec![owner_uid.to_string()];
        while let Some(uid) = pending.pop() {
            for child in self.ownership.release(&uid) {
                match child {
                    ChildRef::Secret(key) => {
                        if lock(&self.secrets).remove(&key).is_some() {
                            debug!("Collected secret {} owned by {}", key, uid);
                        }
                    }
                    ChildRef::Record { kind, key } => {
                        let collector = lock(&self.collectors).get(&kind).and_then(Weak::upgrade);
                        match collector {
                            Some(collector) => {
                                debug!("Collecting {} {} owned by {}", kind, key, uid);
                                if let Some(child_uid) = collector.request_delete(&key) {
                                    pending.push(child_uid);
                                }
                            }
                            None => debug!("No collection registered for kind {}", kind),
                        }
                    }
                }
            }
        }
    }
}

/// Records of kind `K` held in a [`MemoryCluster`]
pub struct MemoryRecords<K> {
    cluster: Arc<MemoryCluster>,
    records: Mutex<BTreeMap<ObjectKey, K>>,
    events: broadcast::Sender<K>,
    next_version: AtomicU64,
}

impl<K> Debug for MemoryRecords<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRecords")
            .field("records", &lock(&self.records).len())
            .finish_non_exhaustive()
    }
}

impl<K> MemoryRecords<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(cluster: &Arc<MemoryCluster>) -> Arc<Self> {
        let (events, _) = broadcast::channel(WATCH_BUFFER);
        let records = Arc::new(Self {
            cluster: Arc::clone(cluster),
            records: Mutex::new(BTreeMap::new()),
            events,
            next_version: AtomicU64::new(1),
        });
        let collector: Weak<dyn Collectable> = Arc::downgrade(&records) as Weak<dyn Collectable>;
        cluster.register_collector(K::kind(&()).to_string(), collector);
        records
    }

    /// Current copy of a record
    pub fn snapshot(&self, key: &ObjectKey) -> Option<K> {
        lock(&self.records).get(key).cloned()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        lock(&self.records).contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Edit a record's desired state; bumps `metadata.generation`
    pub fn update_spec(&self, key: &ObjectKey, edit: impl FnOnce(&mut K)) -> Result<(), StoreError> {
        let updated = {
            let mut records = lock(&self.records);
            let record = records
                .get_mut(key)
                .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
            edit(record);
            let generation = record.meta().generation.unwrap_or(0) + 1;
            record.meta_mut().generation = Some(generation);
            self.bump_version(record);
            record.clone()
        };
        self.notify(updated);
        Ok(())
    }

    fn bump_version(&self, record: &mut K) {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        record.meta_mut().resource_version = Some(version.to_string());
    }

    fn notify(&self, record: K) {
        // No receivers is fine: nobody is watching yet
        let _ = self.events.send(record);
    }

    /// Broadcast the last copy of a removed record: deleting, no finalizers
    fn notify_removed(&self, mut removed: K) {
        let meta = removed.meta_mut();
        if meta.deletion_timestamp.is_none() {
            meta.deletion_timestamp = now_time();
        }
        meta.finalizers = None;
        self.notify(removed);
    }

    fn child_ref(key: &ObjectKey) -> ChildRef {
        ChildRef::Record {
            kind: K::kind(&()).to_string(),
            key: key.clone(),
        }
    }

    /// Mutate a stored record, then notify watchers
    fn modify(
        &self,
        key: &ObjectKey,
        edit: impl FnOnce(&mut K) -> bool,
    ) -> Result<(), StoreError> {
        let updated = {
            let mut records = lock(&self.records);
            let record = records
                .get_mut(key)
                .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
            if !edit(record) {
                return Ok(());
            }
            self.bump_version(record);
            record.clone()
        };
        self.notify(updated);
        Ok(())
    }

    /// Remove a record and collect its dependents
    fn remove(&self, key: &ObjectKey) -> Option<String> {
        let removed = lock(&self.records).remove(key)?;
        let uid = removed.meta().uid.clone();
        self.cluster.ownership.forget(&Self::child_ref(key));
        self.notify_removed(removed);
        if let Some(uid) = &uid {
            self.cluster.collect(uid);
        }
        uid
    }

    fn finalizers_empty(record: &K) -> bool {
        record.meta().finalizers.as_ref().is_none_or(Vec::is_empty)
    }
}

impl<K> Collectable for MemoryRecords<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn request_delete(&self, key: &ObjectKey) -> Option<String> {
        let holds_finalizers = {
            let records = lock(&self.records);
            let record = records.get(key)?;
            !Self::finalizers_empty(record)
        };
        if holds_finalizers {
            // Marked only; the collection pass does not recurse into it
            let marked = self.modify(key, |record| {
                if record.meta().deletion_timestamp.is_some() {
                    return false;
                }
                record.meta_mut().deletion_timestamp = now_time();
                true
            });
            if let Err(e) = marked {
                warn!("Failed to mark owned record {} for deletion: {}", key, e);
            }
            return None;
        }
        let removed = lock(&self.records).remove(key)?;
        self.cluster.ownership.forget(&Self::child_ref(key));
        let uid = removed.meta().uid.clone();
        self.notify_removed(removed);
        uid
    }
}

/// Apply an RFC 7386 JSON merge patch
fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(fields) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(existing) = target {
                for (name, value) in fields {
                    if value.is_null() {
                        existing.remove(name);
                    } else {
                        merge_patch(existing.entry(name.clone()).or_insert(Value::Null), value);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

#[async_trait]
impl<K> RecordStore<K> for MemoryRecords<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        Ok(self.snapshot(key))
    }

    async fn list(&self) -> Result<Vec<K>, StoreError> {
        Ok(lock(&self.records).values().cloned().collect())
    }

    async fn create(&self, record: &K) -> Result<K, StoreError> {
        let key = ObjectKey::of(record);
        let created = {
            let mut records = lock(&self.records);
            if records.contains_key(&key) {
                return Err(StoreError::AlreadyExists(key.to_string()));
            }
            let mut created = record.clone();
            let meta = created.meta_mut();
            meta.uid = Some(uuid::Uuid::new_v4().to_string());
            meta.generation = Some(1);
            meta.creation_timestamp = now_time();
            meta.deletion_timestamp = None;
            self.bump_version(&mut created);
            records.insert(key.clone(), created.clone());
            created
        };
        if let Some(owners) = &created.meta().owner_references {
            self.cluster.ownership.register(owners, &Self::child_ref(&key));
        }
        self.notify(created.clone());
        Ok(created)
    }

    async fn set_annotation(
        &self,
        key: &ObjectKey,
        annotation: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.modify(key, |record| {
            let annotations = record.meta_mut().annotations.get_or_insert_with(BTreeMap::new);
            if annotations.get(annotation).map(String::as_str) == Some(value) {
                return false;
            }
            annotations.insert(annotation.to_string(), value.to_string());
            true
        })
    }

    async fn add_finalizer(&self, key: &ObjectKey, finalizer: &str) -> Result<(), StoreError> {
        self.modify(key, |record| {
            if record.meta().deletion_timestamp.is_some() {
                return false;
            }
            let finalizers = record.meta_mut().finalizers.get_or_insert_with(Vec::new);
            if finalizers.iter().any(|f| f == finalizer) {
                return false;
            }
            finalizers.push(finalizer.to_string());
            true
        })
    }

    async fn remove_finalizer(&self, key: &ObjectKey, finalizer: &str) -> Result<(), StoreError> {
        let mut release = false;
        match self.modify(key, |record| {
            let Some(finalizers) = record.meta_mut().finalizers.as_mut() else {
                return false;
            };
            let before = finalizers.len();
            finalizers.retain(|f| f != finalizer);
            if finalizers.len() == before {
                return false;
            }
            let now_empty = finalizers.is_empty();
            release = now_empty && record.meta().deletion_timestamp.is_some();
            true
        }) {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        if release {
            self.remove(key);
        }
        Ok(())
    }

    async fn patch_status(&self, key: &ObjectKey, status: Value) -> Result<(), StoreError> {
        let mut failure = None;
        self.modify(key, |record| {
            let mut value = match serde_json::to_value(&*record) {
                Ok(value) => value,
                Err(e) => {
                    failure = Some(StoreError::Api(e.to_string()));
                    return false;
                }
            };
            merge_patch(&mut value, &serde_json::json!({ "status": status }));
            match serde_json::from_value::<K>(value) {
                Ok(patched) => {
                    *record = patched;
                    true
                }
                Err(e) => {
                    failure = Some(StoreError::Api(format!("invalid status for {key}: {e}")));
                    false
                }
            }
        })?;
        failure.map_or(Ok(()), Err)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let holds_finalizers = match lock(&self.records).get(key) {
            None => return Ok(()),
            Some(record) => !Self::finalizers_empty(record),
        };
        if holds_finalizers {
            return self.modify(key, |record| {
                if record.meta().deletion_timestamp.is_some() {
                    return false;
                }
                record.meta_mut().deletion_timestamp = now_time();
                true
            });
        }
        self.remove(key);
        Ok(())
    }

    fn watch(&self) -> BoxStream<'static, Result<K, StoreError>> {
        let receiver = self.events.subscribe();
        futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(record) => return Some((Ok(record), receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("In-memory watch lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

/// Secrets held in a [`MemoryCluster`]
#[derive(Debug, Clone)]
pub struct MemorySecrets {
    cluster: Arc<MemoryCluster>,
}

impl MemorySecrets {
    pub fn new(cluster: &Arc<MemoryCluster>) -> Self {
        Self {
            cluster: Arc::clone(cluster),
        }
    }

    fn key_of(secret: &Secret) -> ObjectKey {
        ObjectKey::namespaced(
            secret
                .metadata
                .namespace
                .clone()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            secret.metadata.name.clone().unwrap_or_default(),
        )
    }

    fn store(&self, key: ObjectKey, secret: &Secret) {
        lock(&self.cluster.secrets).insert(key.clone(), secret.clone());
        let child = ChildRef::Secret(key);
        self.cluster.ownership.forget(&child);
        if let Some(owners) = &secret.metadata.owner_references {
            self.cluster.ownership.register(owners, &child);
        }
    }
}

#[async_trait]
impl SecretStore for MemorySecrets {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self.cluster.secret(namespace, name))
    }

    async fn create(&self, secret: &Secret) -> Result<(), StoreError> {
        let key = Self::key_of(secret);
        if lock(&self.cluster.secrets).contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!("secret {key}")));
        }
        self.store(key, secret);
        Ok(())
    }

    async fn apply(&self, secret: &Secret) -> Result<(), StoreError> {
        self.store(Self::key_of(secret), secret);
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let key = ObjectKey::namespaced(namespace, name);
        lock(&self.cluster.secrets).remove(&key);
        self.cluster.ownership.forget(&ChildRef::Secret(key));
        Ok(())
    }
}
