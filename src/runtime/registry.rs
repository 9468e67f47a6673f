//! # Registry
//!
//! The kinds the driver serves, registered explicitly at startup. Each entry
//! supplies its own change stream, key listing and reconcile entry point.

use crate::controller::error::ReconcileError;
use crate::controller::reconciler::{AttemptContext, ReconcileOutcome};
use crate::store::{ObjectKey, StoreError};
use async_trait::async_trait;
use futures::stream::BoxStream;
use kube::Resource;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Parts of a record whose change warrants a new attempt
///
/// Status and resourceVersion are not part of it, so status writes made by
/// the engine never retrigger.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fingerprint {
    pub generation: Option<i64>,
    pub annotations: BTreeMap<String, String>,
    pub deleting: bool,
    pub finalizers: Vec<String>,
}

impl Fingerprint {
    /// Deleting with nothing left to hold it: the record is gone
    pub fn is_removal(&self) -> bool {
        self.deleting && self.finalizers.is_empty()
    }
}

/// One event of a kind's change stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observed {
    pub key: ObjectKey,
    /// `None` for events that always trigger
    pub fingerprint: Option<Fingerprint>,
}

impl Observed {
    pub fn of<K: Resource>(record: &K) -> Self {
        let meta = record.meta();
        Self {
            key: ObjectKey::of(record),
            fingerprint: Some(Fingerprint {
                generation: meta.generation,
                annotations: meta.annotations.clone().unwrap_or_default(),
                deleting: meta.deletion_timestamp.is_some(),
                finalizers: meta.finalizers.clone().unwrap_or_default(),
            }),
        }
    }

    /// An event about `key` derived from another kind's change
    pub fn touch(key: ObjectKey) -> Self {
        Self {
            key,
            fingerprint: None,
        }
    }
}

/// One reconciled kind as seen by the driver
#[async_trait]
pub trait KindController: Send + Sync {
    /// Kind name used in logs, metrics and task identities
    fn kind(&self) -> &str;

    /// Changes to records of this kind; ends or fails when the underlying
    /// watch does, after which the watch loop restarts it
    fn watch(&self) -> BoxStream<'static, Result<Observed, StoreError>>;

    /// Every record currently stored
    async fn keys(&self) -> Result<Vec<ObjectKey>, StoreError>;

    async fn reconcile(
        &self,
        key: &ObjectKey,
        attempt: AttemptContext,
    ) -> Result<ReconcileOutcome, ReconcileError>;
}

/// Kind name → controller
#[derive(Default, Clone)]
pub struct Registry {
    kinds: BTreeMap<String, Arc<dyn KindController>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kinds", &self.kinds.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a kind; a kind registered twice keeps the later controller
    #[must_use]
    pub fn register(mut self, controller: Arc<dyn KindController>) -> Self {
        self.kinds.insert(controller.kind().to_string(), controller);
        self
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn KindController>> {
        self.kinds.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &Arc<dyn KindController>> {
        self.kinds.values()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ResourceSpec, User, UserParameters, UserProfile, UserSpec};

    fn user() -> User {
        let mut user = User::new(
            "alice",
            UserSpec {
                resource: ResourceSpec::default(),
                for_provider: UserParameters {
                    profile: UserProfile {
                        username: "alice".to_string(),
                        email: "alice@example.com".to_string(),
                        full_name: "Alice".to_string(),
                        comment: None,
                        admin: None,
                    },
                    password_secret_ref: None,
                },
            },
        );
        user.metadata.namespace = Some("team-a".to_string());
        user.metadata.generation = Some(1);
        user
    }

    #[test]
    fn test_fingerprint_ignores_status_and_version() {
        let mut a = user();
        a.metadata.resource_version = Some("1".to_string());
        let mut b = a.clone();
        b.metadata.resource_version = Some("2".to_string());
        b.status = Some(Default::default());
        assert_eq!(Observed::of(&a), Observed::of(&b));
    }

    #[test]
    fn test_fingerprint_tracks_desired_state() {
        let a = user();
        let mut b = a.clone();
        b.metadata.generation = Some(2);
        assert_ne!(Observed::of(&a), Observed::of(&b));

        let mut c = a.clone();
        c.metadata.finalizers = Some(vec!["finalizer.managedresource.crossplane.io".to_string()]);
        assert_ne!(Observed::of(&a), Observed::of(&c));
    }
}
