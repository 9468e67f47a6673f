//! # Managed Reconciler
//!
//! One attempt for one managed record:
//!
//! 1. Hold the managed finalizer while the record is alive
//! 2. Connect (credentials, usage tracking, Harbor client)
//! 3. Observe; persist an adopted identity before anything else
//! 4. Deleting: delete unless orphaned or never bound, unpublish, release,
//!    drop the finalizer
//! 5. Otherwise Create when absent, Update when drifted, or report Ready
//! 6. Publish connection details, write status only when it changed
//!
//! Failures are written to the `Synced` condition. An Update refused as
//! `NotSupported` is not retried for the same generation; the record keeps
//! being observed and the condition stays until the spec changes.

use super::types::{AttemptContext, ReconcileOutcome};
use crate::config::ControllerConfig;
use crate::constants::{EXTERNAL_NAME_ANNOTATION, MANAGED_FINALIZER};
use crate::controller::error::{ReconcileError, REASON_NOT_SUPPORTED};
use crate::controller::external::{ExternalClient, ExternalConnector, ExternalObservation};
use crate::controller::identity;
use crate::controller::publisher::ConnectionPublisher;
use crate::crd::{
    set_condition, Condition, DeletionPolicy, Managed, ManagedStatus, CONDITION_SYNCED,
};
use crate::runtime::{KindController, Observed};
use crate::store::{ObjectKey, RecordStore, StoreError};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct ManagedReconciler<R: Managed> {
    kind: String,
    records: Arc<dyn RecordStore<R>>,
    connector: Arc<dyn ExternalConnector<R>>,
    publisher: ConnectionPublisher,
    poll_interval: Duration,
    post_write_requeue: Duration,
}

impl<R: Managed> std::fmt::Debug for ManagedReconciler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedReconciler")
            .field("kind", &self.kind)
            .field("poll_interval", &self.poll_interval)
            .field("post_write_requeue", &self.post_write_requeue)
            .finish_non_exhaustive()
    }
}

/// A refused update was already reported for this generation
fn update_blocked<O>(status: &ManagedStatus<O>, generation: Option<i64>) -> bool {
    status.condition(CONDITION_SYNCED).is_some_and(|c| {
        !c.is_true()
            && c.reason() == Some(REASON_NOT_SUPPORTED)
            && c.observed_generation == generation
    })
}

impl<R: Managed> ManagedReconciler<R> {
    pub fn new(
        records: Arc<dyn RecordStore<R>>,
        connector: Arc<dyn ExternalConnector<R>>,
        publisher: ConnectionPublisher,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            kind: R::kind(&()).into_owned(),
            records,
            connector,
            publisher,
            poll_interval: config.poll_interval(),
            post_write_requeue: config.post_write_requeue(),
        }
    }

    /// Run one attempt for the record stored under `key`
    ///
    /// # Errors
    ///
    /// Any [`ReconcileError`] of the attempt, after it was recorded on the
    /// record's `Synced` condition. Cancellation is not recorded.
    pub async fn reconcile_key(
        &self,
        key: &ObjectKey,
        attempt: AttemptContext,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(record) = self.records.get(key).await? else {
            debug!(kind = %self.kind, resource = %key, "Record no longer exists");
            return Ok(ReconcileOutcome::Done);
        };

        debug!(
            kind = %self.kind,
            resource = %key,
            trigger = attempt.trigger.as_str(),
            retries = attempt.retries,
            "🔄 Reconciling"
        );
        let timeout = attempt.timeout;
        let result = tokio::select! {
            biased;
            () = attempt.cancel.cancelled() => Err(ReconcileError::Cancelled),
            outcome = tokio::time::timeout(timeout, self.attempt(&record)) => {
                outcome.unwrap_or(Err(ReconcileError::Timeout(timeout)))
            }
        };

        if let Err(error) = &result {
            if !matches!(error, ReconcileError::Cancelled) {
                self.report_failure(key, error).await;
            }
        }
        result
    }

    async fn attempt(&self, record: &R) -> Result<ReconcileOutcome, ReconcileError> {
        let key = ObjectKey::of(record);
        if !record.has_finalizer(MANAGED_FINALIZER) {
            if record.is_deleting() {
                return Ok(ReconcileOutcome::Done);
            }
            self.records.add_finalizer(&key, MANAGED_FINALIZER).await?;
        }

        let client = self.connector.connect(record).await?;
        let result = self.drive(record, client.as_ref()).await;
        client.disconnect().await;
        result
    }

    async fn drive(
        &self,
        record: &R,
        client: &dyn ExternalClient<R>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let generation = record.meta().generation;
        let mut current = record.clone();
        let mut status = record.managed_status().cloned().unwrap_or_default();

        // Never bound means nothing was created; a same-named object in
        // Harbor belongs to someone else
        if current.is_deleting() && current.external_name().is_none() {
            return self
                .finalize(&current, client, &ExternalObservation::absent(), status)
                .await;
        }

        let observed = client.observe(&current).await?;
        if let Some(name) = &observed.external_name {
            self.bind(&mut current, name, false).await?;
        }
        if let Some(observation) = &observed.observation {
            status.at_provider = observation.clone();
        }

        if current.is_deleting() {
            return self.finalize(&current, client, &observed, status).await;
        }

        let outcome = if !observed.exists {
            let creation = client.create(&current).await?;
            if let Some(name) = &creation.external_name {
                // Recreation after the object vanished may rebind
                self.bind(&mut current, name, true).await?;
            }
            if let Some(observation) = creation.observation {
                status.at_provider = observation;
            }
            self.publisher
                .publish(&current, &creation.connection_details)
                .await?;
            set_condition(&mut status.conditions, Condition::creating());
            ReconcileOutcome::RequeueAfter(self.post_write_requeue)
        } else if !observed.up_to_date {
            if update_blocked(&status, generation) {
                debug!(
                    kind = %self.kind,
                    resource = %current.display_name(),
                    "Drift cannot be applied to this generation; observing only"
                );
                set_condition(
                    &mut status.conditions,
                    Condition::unavailable("external object differs from the record and cannot be updated"),
                );
                self.write_status(&current, &status).await?;
                return Ok(ReconcileOutcome::RequeueAfter(self.poll_interval));
            }
            let update = client.update(&current, &observed).await?;
            if let Some(observation) = update.observation {
                status.at_provider = observation;
            }
            self.publisher
                .publish(&current, &update.connection_details)
                .await?;
            set_condition(&mut status.conditions, Condition::available());
            ReconcileOutcome::RequeueAfter(self.post_write_requeue)
        } else {
            self.publisher
                .publish(&current, &observed.connection_details)
                .await?;
            set_condition(&mut status.conditions, Condition::available());
            ReconcileOutcome::RequeueAfter(self.poll_interval)
        };

        set_condition(
            &mut status.conditions,
            Condition::reconcile_success().with_generation(generation),
        );
        self.write_status(&current, &status).await?;
        Ok(outcome)
    }

    async fn finalize(
        &self,
        record: &R,
        client: &dyn ExternalClient<R>,
        observed: &ExternalObservation<R::Observation>,
        mut status: ManagedStatus<R::Observation>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let key = ObjectKey::of(record);
        set_condition(&mut status.conditions, Condition::deleting());
        self.write_status(record, &status).await?;

        if observed.exists {
            match record.resource_spec().deletion_policy {
                DeletionPolicy::Delete => client.delete(record).await?,
                DeletionPolicy::Orphan => info!(
                    kind = %self.kind,
                    resource = %record.display_name(),
                    external_name = record.external_name().unwrap_or_default(),
                    "Orphaning external object"
                ),
            }
        }
        self.publisher.unpublish(record).await?;
        self.connector.release(record).await?;
        self.records.remove_finalizer(&key, MANAGED_FINALIZER).await?;
        info!(kind = %self.kind, resource = %key, "🗑️ Finalized record");
        Ok(ReconcileOutcome::Done)
    }

    /// Persist `name` as the record's external identity
    async fn bind(&self, record: &mut R, name: &str, allow_rebind: bool) -> Result<(), ReconcileError> {
        let existing = record.external_name().map(str::to_owned);
        identity::check_binding(existing.as_deref(), name, allow_rebind)?;
        if existing.as_deref() == Some(name) {
            return Ok(());
        }
        self.records
            .set_annotation(&ObjectKey::of(record), EXTERNAL_NAME_ANNOTATION, name)
            .await?;
        record
            .meta_mut()
            .annotations
            .get_or_insert_with(Default::default)
            .insert(EXTERNAL_NAME_ANNOTATION.to_string(), name.to_string());
        info!(
            kind = %self.kind,
            resource = %record.display_name(),
            external_name = name,
            "🔗 Bound external identity"
        );
        Ok(())
    }

    async fn write_status(
        &self,
        record: &R,
        status: &ManagedStatus<R::Observation>,
    ) -> Result<(), ReconcileError> {
        if record.managed_status() == Some(status) {
            return Ok(());
        }
        let value = serde_json::to_value(status).map_err(|e| StoreError::Api(e.to_string()))?;
        self.records.patch_status(&ObjectKey::of(record), value).await?;
        Ok(())
    }

    async fn report_failure(&self, key: &ObjectKey, error: &ReconcileError) {
        let record = match self.records.get(key).await {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                warn!(resource = %key, error = %e, "Failed to reload record to report failure");
                return;
            }
        };
        let mut status = record.managed_status().cloned().unwrap_or_default();
        set_condition(
            &mut status.conditions,
            Condition::reconcile_error(error.reason(), error.to_string())
                .with_generation(record.meta().generation),
        );
        if let Err(e) = self.write_status(&record, &status).await {
            warn!(resource = %key, error = %e, "Failed to record reconcile error on status");
        }
    }
}

#[async_trait]
impl<R: Managed> KindController for ManagedReconciler<R> {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn watch(&self) -> BoxStream<'static, Result<Observed, StoreError>> {
        self.records
            .watch()
            .map(|event| event.map(|record| Observed::of(&record)))
            .boxed()
    }

    async fn keys(&self) -> Result<Vec<ObjectKey>, StoreError> {
        Ok(self.records.list().await?.iter().map(ObjectKey::of).collect())
    }

    async fn reconcile(
        &self,
        key: &ObjectKey,
        attempt: AttemptContext,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.reconcile_key(key, attempt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::UserObservation;

    #[test]
    fn test_update_blocked_only_for_same_generation() {
        let mut status: ManagedStatus<UserObservation> = ManagedStatus::default();
        assert!(!update_blocked(&status, Some(1)));

        set_condition(
            &mut status.conditions,
            Condition::reconcile_error("NotSupported", "immutable").with_generation(Some(1)),
        );
        assert!(update_blocked(&status, Some(1)));
        assert!(!update_blocked(&status, Some(2)));

        set_condition(
            &mut status.conditions,
            Condition::reconcile_error("UpdateError", "boom").with_generation(Some(2)),
        );
        assert!(!update_blocked(&status, Some(2)));
    }
}
