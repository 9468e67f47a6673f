//! # Ownership Index
//!
//! Owner uid → dependent objects. The in-process store consults it when a
//! record goes away so dependents are collected with their owner, the way
//! the Kubernetes garbage collector follows `ownerReferences`.

use super::ObjectKey;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

/// An object owned by a record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChildRef {
    Secret(ObjectKey),
    Record { kind: String, key: ObjectKey },
}

#[derive(Debug, Default)]
pub struct OwnershipIndex {
    children: Mutex<HashMap<String, BTreeSet<ChildRef>>>,
}

impl OwnershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `child` under every owner uid in `owners`
    pub fn register(&self, owners: &[OwnerReference], child: &ChildRef) {
        if owners.is_empty() {
            return;
        }
        let mut children = self
            .children
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for owner in owners {
            children
                .entry(owner.uid.clone())
                .or_default()
                .insert(child.clone());
        }
    }

    pub fn children_of(&self, owner_uid: &str) -> Vec<ChildRef> {
        self.children
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(owner_uid)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove and return the dependents of `owner_uid`
    ///
    /// Removal is atomic so a concurrent collection of the same owner sees
    /// nothing left to do.
    pub fn release(&self, owner_uid: &str) -> Vec<ChildRef> {
        self.children
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(owner_uid)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default()
    }

    /// Drop `child` from every owner's set, e.g. after it was deleted directly
    pub fn forget(&self, child: &ChildRef) {
        let mut children = self
            .children
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        children.retain(|_, set| {
            set.remove(child);
            !set.is_empty()
        });
    }
}
