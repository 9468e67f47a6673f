//! # ProviderConfig Reconciler
//!
//! Counts the `ProviderConfigUsage` records that point at each
//! ProviderConfig and holds a finalizer on the config while any remain.
//! A deleting config is released once its last user is finalized.

use super::types::{AttemptContext, ReconcileOutcome};
use crate::constants::PROVIDER_CONFIG_FINALIZER;
use crate::controller::error::ReconcileError;
use crate::crd::{set_condition, Condition, ProviderConfig, ProviderConfigStatus, ProviderConfigUsage};
use crate::runtime::{KindController, Observed};
use crate::store::{ObjectKey, RecordStore, StoreError};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use kube::Resource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const KIND: &str = "ProviderConfig";

pub struct ProviderConfigReconciler {
    configs: Arc<dyn RecordStore<ProviderConfig>>,
    usages: Arc<dyn RecordStore<ProviderConfigUsage>>,
    poll_interval: Duration,
}

impl std::fmt::Debug for ProviderConfigReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfigReconciler")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl ProviderConfigReconciler {
    pub fn new(
        configs: Arc<dyn RecordStore<ProviderConfig>>,
        usages: Arc<dyn RecordStore<ProviderConfigUsage>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            configs,
            usages,
            poll_interval,
        }
    }

    async fn users_of(&self, name: &str) -> Result<i64, StoreError> {
        let count = self
            .usages
            .list()
            .await?
            .iter()
            .filter(|u| u.spec.provider_config_ref.name == name)
            .filter(|u| u.meta().deletion_timestamp.is_none())
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn reconcile_config(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(config) = self.configs.get(key).await? else {
            return Ok(ReconcileOutcome::Done);
        };
        let users = self.users_of(&key.name).await?;
        let holds_finalizer = config
            .meta()
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|x| x == PROVIDER_CONFIG_FINALIZER));

        let mut status = config.status.clone().unwrap_or_default();
        status.users = users;

        if config.meta().deletion_timestamp.is_some() {
            if users == 0 {
                if holds_finalizer {
                    self.configs
                        .remove_finalizer(key, PROVIDER_CONFIG_FINALIZER)
                        .await?;
                    info!(provider_config = %key, "Released ProviderConfig with no remaining users");
                }
                return Ok(ReconcileOutcome::Done);
            }
            debug!(provider_config = %key, users, "ProviderConfig deletion blocked by users");
            set_condition(
                &mut status.conditions,
                Condition::unavailable(format!("{users} managed records still use this config"))
                    .with_reason("InUse"),
            );
            self.write_status(&config, &status).await?;
            return Ok(ReconcileOutcome::RequeueAfter(self.poll_interval));
        }

        if !holds_finalizer {
            self.configs
                .add_finalizer(key, PROVIDER_CONFIG_FINALIZER)
                .await?;
        }
        set_condition(&mut status.conditions, Condition::available());
        self.write_status(&config, &status).await?;
        Ok(ReconcileOutcome::Done)
    }

    async fn write_status(
        &self,
        config: &ProviderConfig,
        status: &ProviderConfigStatus,
    ) -> Result<(), ReconcileError> {
        if config.status.as_ref() == Some(status) {
            return Ok(());
        }
        let value = serde_json::to_value(status).map_err(|e| StoreError::Api(e.to_string()))?;
        self.configs.patch_status(&ObjectKey::of(config), value).await?;
        Ok(())
    }
}

#[async_trait]
impl KindController for ProviderConfigReconciler {
    fn kind(&self) -> &str {
        KIND
    }

    /// Config changes plus every usage change, mapped to the config it names
    fn watch(&self) -> BoxStream<'static, Result<Observed, StoreError>> {
        let configs = self
            .configs
            .watch()
            .map(|event| event.map(|config| Observed::of(&config)));
        let usages = self.usages.watch().map(|event| {
            event.map(|usage| {
                Observed::touch(ObjectKey::cluster(usage.spec.provider_config_ref.name))
            })
        });
        stream::select(configs, usages).boxed()
    }

    async fn keys(&self) -> Result<Vec<ObjectKey>, StoreError> {
        Ok(self.configs.list().await?.iter().map(ObjectKey::of).collect())
    }

    async fn reconcile(
        &self,
        key: &ObjectKey,
        _attempt: AttemptContext,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.reconcile_config(key).await
    }
}
