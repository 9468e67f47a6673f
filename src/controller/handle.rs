//! # Managed External Handle
//!
//! Generic [`ExternalClient`] for kinds backed by a single Harbor object.
//! The kind-specific parts (lookups, field projections, payloads) live in
//! an [`ExternalKind`] implementation; this module owns the shared rules:
//!
//! - a record without an identity adopts an existing object of the same name
//! - a bound identity that Harbor reports gone means the object is absent
//! - any other failure while observing is an error, never absence
//! - immutable kinds refuse to apply drift
//! - deleting an object that is already gone succeeds

use super::drift::{self, FieldSet};
use super::error::ReconcileError;
use super::external::{
    ConnectionDetails, ExternalClient, ExternalCreation, ExternalObservation, ExternalUpdate,
};
use super::identity::{Correlator, ExternalId};
use crate::crd::Managed;
use crate::harbor::{ApiError, HarborApi};
use crate::observability::metrics;
use crate::store::SecretStore;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};

/// What a kind adapter needs besides the record
#[derive(Clone)]
pub struct HandleContext {
    pub api: Arc<dyn HarborApi>,
    pub secrets: Arc<dyn SecretStore>,
    /// Registry host used in published docker configs
    pub registry_host: Option<String>,
}

impl std::fmt::Debug for HandleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleContext")
            .field("registry_host", &self.registry_host)
            .finish_non_exhaustive()
    }
}

/// A freshly created object
#[derive(Debug)]
pub struct Created<I, O> {
    pub id: I,
    pub observation: Option<O>,
    pub connection_details: ConnectionDetails,
}

/// Kind adapter for [`ManagedExternal`]
#[async_trait]
pub trait ExternalKind: Send + Sync + 'static {
    type Record: Managed;
    type Id: ExternalId;
    type Remote: Send + Sync;

    /// Metric and log label
    const KIND: &'static str;
    /// Harbor cannot change the object after creation
    const IMMUTABLE: bool = false;

    fn correlator(&self) -> Correlator<Self::Id>;

    /// Name Harbor knows the object by, used for adoption
    fn desired_name(&self, record: &Self::Record) -> Result<String, ReconcileError>;

    async fn get(&self, api: &dyn HarborApi, id: &Self::Id) -> Result<Self::Remote, ApiError>;

    async fn find(&self, api: &dyn HarborApi, name: &str) -> Result<Option<Self::Remote>, ApiError>;

    fn id_of(&self, remote: &Self::Remote) -> Result<Self::Id, ReconcileError>;

    fn desired_fields(&self, record: &Self::Record) -> FieldSet;

    fn observed_fields(&self, remote: &Self::Remote) -> FieldSet;

    fn observation(&self, remote: &Self::Remote) -> <Self::Record as Managed>::Observation;

    /// Connection details that can be derived from an observed object
    fn observed_details(&self, _remote: &Self::Remote) -> ConnectionDetails {
        ConnectionDetails::new()
    }

    async fn create(
        &self,
        ctx: &HandleContext,
        record: &Self::Record,
    ) -> Result<Created<Self::Id, <Self::Record as Managed>::Observation>, ReconcileError>;

    /// Apply the drifted fields in `changed`
    async fn update(
        &self,
        ctx: &HandleContext,
        id: &Self::Id,
        record: &Self::Record,
        changed: &FieldSet,
    ) -> Result<ConnectionDetails, ReconcileError> {
        let _ = (ctx, id, record);
        Err(ReconcileError::NotSupported(format!(
            "{} cannot change {} after creation",
            Self::KIND,
            names(changed)
        )))
    }

    async fn delete(&self, api: &dyn HarborApi, id: &Self::Id) -> Result<(), ApiError>;
}

fn names(fields: &FieldSet) -> String {
    fields.names().collect::<Vec<_>>().join(", ")
}

/// Time one external operation and count its failures
async fn measured<T>(
    kind: &'static str,
    operation: &'static str,
    call: impl Future<Output = Result<T, ReconcileError>>,
) -> Result<T, ReconcileError> {
    let start = Instant::now();
    let result = call.await;
    metrics::record_external_operation(kind, operation, start.elapsed().as_secs_f64());
    if result.is_err() {
        metrics::increment_external_operation_errors(kind, operation);
    }
    result
}

/// [`ExternalClient`] for one [`ExternalKind`]
pub struct ManagedExternal<K> {
    kind: K,
    ctx: HandleContext,
}

impl<K: ExternalKind> std::fmt::Debug for ManagedExternal<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedExternal")
            .field("kind", &K::KIND)
            .field("ctx", &self.ctx)
            .finish()
    }
}

impl<K: ExternalKind> ManagedExternal<K> {
    pub fn new(kind: K, ctx: HandleContext) -> Self {
        Self { kind, ctx }
    }

    fn bound_id(&self, value: &str) -> Result<K::Id, ReconcileError> {
        self.kind.correlator().decode(value)
    }

    async fn observe_remote(
        &self,
        record: &K::Record,
    ) -> Result<ExternalObservation<<K::Record as Managed>::Observation>, ReconcileError> {
        let api = self.ctx.api.as_ref();
        let (remote, adopted) = match record.external_name() {
            None => {
                let name = self.kind.desired_name(record)?;
                match self.kind.find(api, &name).await.map_err(ReconcileError::Observe)? {
                    Some(remote) => {
                        let id = self.kind.id_of(&remote)?;
                        let external_name = self.kind.correlator().encode(&id);
                        info!(
                            kind = K::KIND,
                            resource = %record.display_name(),
                            external_name = %external_name,
                            "Adopting existing Harbor object"
                        );
                        (remote, Some(external_name))
                    }
                    None => {
                        debug!(kind = K::KIND, name = %name, "No Harbor object to adopt");
                        return Ok(ExternalObservation::absent());
                    }
                }
            }
            Some(value) => {
                let id = self.bound_id(value)?;
                match self.kind.get(api, &id).await {
                    Ok(remote) => (remote, None),
                    Err(ApiError::NotFound) => {
                        info!(
                            kind = K::KIND,
                            resource = %record.display_name(),
                            external_name = value,
                            "Harbor object is gone"
                        );
                        return Ok(ExternalObservation::absent());
                    }
                    Err(e) => return Err(ReconcileError::Observe(e)),
                }
            }
        };

        let report = drift::detect(
            &self.kind.desired_fields(record),
            &self.kind.observed_fields(&remote),
        );
        if !report.up_to_date() {
            debug!(
                kind = K::KIND,
                resource = %record.display_name(),
                fields = %names(&report.changed),
                "Drift detected"
            );
        }
        Ok(ExternalObservation {
            exists: true,
            up_to_date: report.up_to_date(),
            observation: Some(self.kind.observation(&remote)),
            changed: report.changed,
            external_name: adopted,
            connection_details: self.kind.observed_details(&remote),
        })
    }

    async fn create_remote(
        &self,
        record: &K::Record,
    ) -> Result<ExternalCreation<<K::Record as Managed>::Observation>, ReconcileError> {
        let created = self.kind.create(&self.ctx, record).await?;
        let external_name = self.kind.correlator().encode(&created.id);
        info!(
            kind = K::KIND,
            resource = %record.display_name(),
            external_name = %external_name,
            "Created Harbor object"
        );
        Ok(ExternalCreation {
            external_name: Some(external_name),
            observation: created.observation,
            connection_details: created.connection_details,
        })
    }

    async fn update_remote(
        &self,
        record: &K::Record,
        observed: &ExternalObservation<<K::Record as Managed>::Observation>,
    ) -> Result<ExternalUpdate<<K::Record as Managed>::Observation>, ReconcileError> {
        if K::IMMUTABLE {
            return Err(ReconcileError::NotSupported(format!(
                "{} cannot be changed after creation (drifted: {}); delete and recreate the record",
                K::KIND,
                names(&observed.changed)
            )));
        }
        let value = record
            .external_name()
            .or(observed.external_name.as_deref())
            .ok_or_else(|| ReconcileError::correlation("", "update requires a bound identity"))?;
        let id = self.bound_id(value)?;
        let connection_details = self
            .kind
            .update(&self.ctx, &id, record, &observed.changed)
            .await?;
        info!(
            kind = K::KIND,
            resource = %record.display_name(),
            fields = %names(&observed.changed),
            "Updated Harbor object"
        );
        Ok(ExternalUpdate {
            observation: None,
            connection_details,
        })
    }

    async fn delete_remote(&self, record: &K::Record) -> Result<(), ReconcileError> {
        let Some(value) = record.external_name() else {
            debug!(
                kind = K::KIND,
                resource = %record.display_name(),
                "No identity bound; nothing to delete"
            );
            return Ok(());
        };
        let id = self.bound_id(value)?;
        match self.kind.delete(self.ctx.api.as_ref(), &id).await {
            Ok(()) => {
                info!(kind = K::KIND, external_name = value, "Deleted Harbor object");
                Ok(())
            }
            Err(ApiError::NotFound) => {
                debug!(kind = K::KIND, external_name = value, "Harbor object already gone");
                Ok(())
            }
            Err(e) => Err(ReconcileError::Delete(e)),
        }
    }
}

#[async_trait]
impl<K: ExternalKind> ExternalClient<K::Record> for ManagedExternal<K> {
    async fn observe(
        &self,
        record: &K::Record,
    ) -> Result<ExternalObservation<<K::Record as Managed>::Observation>, ReconcileError> {
        let span = info_span!("harbor.observe", kind = K::KIND, resource = %record.display_name());
        measured(K::KIND, "observe", self.observe_remote(record))
            .instrument(span)
            .await
    }

    async fn create(
        &self,
        record: &K::Record,
    ) -> Result<ExternalCreation<<K::Record as Managed>::Observation>, ReconcileError> {
        let span = info_span!("harbor.create", kind = K::KIND, resource = %record.display_name());
        measured(K::KIND, "create", self.create_remote(record))
            .instrument(span)
            .await
    }

    async fn update(
        &self,
        record: &K::Record,
        observed: &ExternalObservation<<K::Record as Managed>::Observation>,
    ) -> Result<ExternalUpdate<<K::Record as Managed>::Observation>, ReconcileError> {
        let span = info_span!("harbor.update", kind = K::KIND, resource = %record.display_name());
        measured(K::KIND, "update", self.update_remote(record, observed))
            .instrument(span)
            .await
    }

    async fn delete(&self, record: &K::Record) -> Result<(), ReconcileError> {
        let span = info_span!("harbor.delete", kind = K::KIND, resource = %record.display_name());
        measured(K::KIND, "delete", self.delete_remote(record))
            .instrument(span)
            .await
    }
}
