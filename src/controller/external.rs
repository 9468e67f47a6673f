//! # External Handle
//!
//! The per-attempt view of the external system for one kind. A connector
//! resolves credentials and opens a client; the reconciler drives the four
//! lifecycle operations through it and disconnects when the attempt ends.

use super::drift::FieldSet;
use super::error::ReconcileError;
use crate::crd::Managed;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Key to raw value; published verbatim into the connection secret
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// Result of Observe
#[derive(Debug, Clone)]
pub struct ExternalObservation<O> {
    /// The object exists in Harbor
    pub exists: bool,
    /// No desired field differs from what Harbor reports
    pub up_to_date: bool,
    pub observation: Option<O>,
    /// Desired values of the drifted fields; empty when up to date
    pub changed: FieldSet,
    /// Identity found by adopting an existing object; to be persisted
    pub external_name: Option<String>,
    pub connection_details: ConnectionDetails,
}

impl<O> ExternalObservation<O> {
    pub fn absent() -> Self {
        Self {
            exists: false,
            up_to_date: false,
            observation: None,
            changed: FieldSet::new(),
            external_name: None,
            connection_details: ConnectionDetails::new(),
        }
    }
}

/// Result of Create
#[derive(Debug, Clone)]
pub struct ExternalCreation<O> {
    /// Identity of the new object; `None` for kinds that have no single
    /// Harbor-side identity
    pub external_name: Option<String>,
    pub observation: Option<O>,
    pub connection_details: ConnectionDetails,
}

/// Result of Update
#[derive(Debug, Clone)]
pub struct ExternalUpdate<O> {
    pub observation: Option<O>,
    pub connection_details: ConnectionDetails,
}

impl<O> Default for ExternalUpdate<O> {
    fn default() -> Self {
        Self {
            observation: None,
            connection_details: ConnectionDetails::new(),
        }
    }
}

/// Lifecycle operations against the external object of one record
#[async_trait]
pub trait ExternalClient<R: Managed>: Send + Sync {
    /// Must not report `exists = false` for anything but a definite absence
    async fn observe(&self, record: &R) -> Result<ExternalObservation<R::Observation>, ReconcileError>;

    async fn create(&self, record: &R) -> Result<ExternalCreation<R::Observation>, ReconcileError>;

    async fn update(
        &self,
        record: &R,
        observed: &ExternalObservation<R::Observation>,
    ) -> Result<ExternalUpdate<R::Observation>, ReconcileError>;

    /// Succeeds when the object is already gone
    async fn delete(&self, record: &R) -> Result<(), ReconcileError>;

    /// Release the session opened by [`ExternalConnector::connect`]
    async fn disconnect(&self) {}
}

#[async_trait]
pub trait ExternalConnector<R: Managed>: Send + Sync {
    async fn connect(&self, record: &R) -> Result<Box<dyn ExternalClient<R>>, ReconcileError>;

    /// Drop whatever `connect` recorded for the record; called once the
    /// record is about to go away
    async fn release(&self, _record: &R) -> Result<(), ReconcileError> {
        Ok(())
    }
}
