//! # Connector
//!
//! Opens a Harbor session for one reconciliation attempt:
//!
//! 1. Record a `ProviderConfigUsage` so the ProviderConfig cannot be deleted
//!    while the record depends on it
//! 2. Resolve the credentials the ProviderConfig points at
//! 3. Build a Harbor client through the configured [`ClientFactory`]
//!
//! The usage is released once the record's finalizer is about to be removed.

use super::credentials::CredentialResolver;
use super::error::ReconcileError;
use super::external::{ExternalClient, ExternalConnector};
use super::handle::{ExternalKind, HandleContext, ManagedExternal};
use crate::crd::{
    Managed, ProviderConfigUsage, ProviderConfigUsageSpec, TypedReference,
};
use crate::constants::{FIELD_MANAGER, LABEL_MANAGED_BY};
use crate::harbor::{HarborApi, HarborClient, HarborConfig};
use crate::store::{ObjectKey, RecordStore, SecretStore, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Builds a Harbor client from resolved settings
pub type ClientFactory =
    Arc<dyn Fn(&HarborConfig) -> Result<Arc<dyn HarborApi>, ReconcileError> + Send + Sync>;

/// Factory for the REST client
pub fn rest_client_factory(timeout: Duration) -> ClientFactory {
    Arc::new(move |config: &HarborConfig| {
        HarborClient::new(config, timeout)
            .map(|client| Arc::new(client) as Arc<dyn HarborApi>)
            .map_err(|e| ReconcileError::ClientConstruction(e.to_string()))
    })
}

/// Keeps one `ProviderConfigUsage` per managed record, named by its uid
#[derive(Clone)]
pub struct UsageTracker {
    usages: Arc<dyn RecordStore<ProviderConfigUsage>>,
}

impl std::fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageTracker").finish_non_exhaustive()
    }
}

impl UsageTracker {
    pub fn new(usages: Arc<dyn RecordStore<ProviderConfigUsage>>) -> Self {
        Self { usages }
    }

    fn usage_key<R: Managed>(record: &R) -> Option<ObjectKey> {
        record.meta().uid.as_ref().map(ObjectKey::cluster)
    }

    /// Ensure the record's usage exists and names its current ProviderConfig
    pub async fn track<R: Managed>(&self, record: &R) -> Result<(), ReconcileError> {
        let Some(key) = Self::usage_key(record) else {
            return Ok(());
        };
        let config_ref = &record.resource_spec().provider_config_ref;
        if let Some(existing) = self.usages.get(&key).await? {
            if existing.spec.provider_config_ref == *config_ref {
                return Ok(());
            }
            debug!(
                resource = %record.display_name(),
                from = %existing.spec.provider_config_ref.name,
                to = %config_ref.name,
                "ProviderConfig reference changed; replacing usage"
            );
            self.usages.delete(&key).await?;
        }

        let mut usage = ProviderConfigUsage::new(
            &key.name,
            ProviderConfigUsageSpec {
                provider_config_ref: config_ref.clone(),
                resource_ref: TypedReference {
                    api_version: R::api_version(&()).into_owned(),
                    kind: R::kind(&()).into_owned(),
                    name: record.meta().name.clone().unwrap_or_default(),
                    namespace: record.meta().namespace.clone(),
                    uid: record.meta().uid.clone(),
                },
            },
        );
        usage.metadata.labels = Some(BTreeMap::from([(
            LABEL_MANAGED_BY.to_string(),
            FIELD_MANAGER.to_string(),
        )]));

        match self.usages.create(&usage).await {
            Ok(_) => {
                info!(
                    resource = %record.display_name(),
                    provider_config = %config_ref.name,
                    "Recorded ProviderConfig usage"
                );
                Ok(())
            }
            Err(StoreError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn release<R: Managed>(&self, record: &R) -> Result<(), ReconcileError> {
        if let Some(key) = Self::usage_key(record) {
            self.usages.delete(&key).await?;
        }
        Ok(())
    }
}

/// [`ExternalConnector`] for kinds backed by one Harbor object
pub struct HarborConnector<K> {
    kind: K,
    usages: UsageTracker,
    credentials: CredentialResolver,
    secrets: Arc<dyn SecretStore>,
    factory: ClientFactory,
}

impl<K: ExternalKind> std::fmt::Debug for HarborConnector<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarborConnector")
            .field("kind", &K::KIND)
            .finish_non_exhaustive()
    }
}

impl<K: ExternalKind> HarborConnector<K> {
    pub fn new(
        kind: K,
        usages: UsageTracker,
        credentials: CredentialResolver,
        secrets: Arc<dyn SecretStore>,
        factory: ClientFactory,
    ) -> Self {
        Self {
            kind,
            usages,
            credentials,
            secrets,
            factory,
        }
    }
}

#[async_trait]
impl<K: ExternalKind + Clone> ExternalConnector<K::Record> for HarborConnector<K> {
    async fn connect(
        &self,
        record: &K::Record,
    ) -> Result<Box<dyn ExternalClient<K::Record>>, ReconcileError> {
        self.usages.track(record).await?;

        let config = self
            .credentials
            .resolve(&record.resource_spec().provider_config_ref.name)
            .await?;
        reqwest::Url::parse(&config.url).map_err(|e| {
            ReconcileError::ClientConstruction(format!("invalid Harbor URL '{}': {e}", config.url))
        })?;
        let api = (self.factory)(&config)?;

        Ok(Box::new(ManagedExternal::new(
            self.kind.clone(),
            HandleContext {
                api,
                secrets: Arc::clone(&self.secrets),
                registry_host: config.registry_host(),
            },
        )))
    }

    async fn release(&self, record: &K::Record) -> Result<(), ReconcileError> {
        self.usages.release(record).await
    }
}
