//! # Managed Records
//!
//! The view of a record the engine works with, independent of its kind.

use super::{ManagedStatus, ResourceSpec};
use crate::constants::EXTERNAL_NAME_ANNOTATION;
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// A record whose desired state is reconciled against Harbor
pub trait Managed:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Kind-specific snapshot stored in `status.atProvider`
    type Observation: Clone
        + Debug
        + Default
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    fn resource_spec(&self) -> &ResourceSpec;

    fn managed_status(&self) -> Option<&ManagedStatus<Self::Observation>>;

    fn managed_status_mut(&mut self) -> &mut ManagedStatus<Self::Observation>;

    fn external_name(&self) -> Option<&str> {
        self.meta()
            .annotations
            .as_ref()
            .and_then(|a| a.get(EXTERNAL_NAME_ANNOTATION))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn is_deleting(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    fn has_finalizer(&self, finalizer: &str) -> bool {
        self.meta()
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|x| x == finalizer))
    }

    fn display_name(&self) -> String {
        format!(
            "{}/{}",
            self.meta().namespace.as_deref().unwrap_or("-"),
            self.meta().name.as_deref().unwrap_or("unknown")
        )
    }
}

/// Implements [`Managed`] for a kube-derived kind whose spec flattens
/// `ResourceSpec` into a `resource` field.
macro_rules! impl_managed {
    ($kind:ty, $observation:ty) => {
        impl $crate::crd::Managed for $kind {
            type Observation = $observation;

            fn resource_spec(&self) -> &$crate::crd::ResourceSpec {
                &self.spec.resource
            }

            fn managed_status(&self) -> Option<&$crate::crd::ManagedStatus<$observation>> {
                self.status.as_ref()
            }

            fn managed_status_mut(&mut self) -> &mut $crate::crd::ManagedStatus<$observation> {
                self.status.get_or_insert_with(Default::default)
            }
        }
    };
}

pub(crate) use impl_managed;
