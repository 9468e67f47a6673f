//! # Setup
//!
//! Wires stores, connectors and reconcilers into the [`Registry`] the driver
//! runs. Nothing here is global: callers construct the stores (API server or
//! in-process) and the Harbor client factory and pass them in.

use super::composite::CompositeConnector;
use super::connector::{ClientFactory, HarborConnector, UsageTracker};
use super::credentials::CredentialResolver;
use super::external::ExternalConnector;
use super::handle::ExternalKind;
use super::kinds::{ProjectKind, RobotAccountKind, ScannerKind, UserKind};
use super::publisher::ConnectionPublisher;
use super::reconciler::{ManagedReconciler, ProviderConfigReconciler};
use crate::config::ControllerConfig;
use crate::crd::{
    Managed, Project, ProviderConfig, ProviderConfigUsage, RobotAccount, ScannerRegistration,
    User, UserWithGeneratedPassword,
};
use crate::runtime::{KindController, Registry};
use crate::store::{
    KubeRecords, KubeSecrets, MemoryCluster, MemoryRecords, MemorySecrets, RecordStore,
    SecretStore,
};
use kube::Client;
use std::sync::Arc;

/// Every store the engine reads and writes
#[derive(Clone)]
pub struct Stores {
    pub robots: Arc<dyn RecordStore<RobotAccount>>,
    pub users: Arc<dyn RecordStore<User>>,
    pub projects: Arc<dyn RecordStore<Project>>,
    pub scanners: Arc<dyn RecordStore<ScannerRegistration>>,
    pub composites: Arc<dyn RecordStore<UserWithGeneratedPassword>>,
    pub provider_configs: Arc<dyn RecordStore<ProviderConfig>>,
    pub usages: Arc<dyn RecordStore<ProviderConfigUsage>>,
    pub secrets: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

impl Stores {
    /// Stores backed by the API server
    pub fn kube(client: &Client) -> Self {
        Self {
            robots: Arc::new(KubeRecords::<RobotAccount>::namespaced(client.clone())),
            users: Arc::new(KubeRecords::<User>::namespaced(client.clone())),
            projects: Arc::new(KubeRecords::<Project>::namespaced(client.clone())),
            scanners: Arc::new(KubeRecords::<ScannerRegistration>::namespaced(client.clone())),
            composites: Arc::new(KubeRecords::<UserWithGeneratedPassword>::namespaced(
                client.clone(),
            )),
            provider_configs: Arc::new(KubeRecords::<ProviderConfig>::cluster(client.clone())),
            usages: Arc::new(KubeRecords::<ProviderConfigUsage>::cluster(client.clone())),
            secrets: Arc::new(KubeSecrets::new(client.clone())),
        }
    }

    /// In-process stores sharing one ownership table
    pub fn memory(cluster: &Arc<MemoryCluster>) -> Self {
        Self {
            robots: MemoryRecords::<RobotAccount>::new(cluster),
            users: MemoryRecords::<User>::new(cluster),
            projects: MemoryRecords::<Project>::new(cluster),
            scanners: MemoryRecords::<ScannerRegistration>::new(cluster),
            composites: MemoryRecords::<UserWithGeneratedPassword>::new(cluster),
            provider_configs: MemoryRecords::<ProviderConfig>::new(cluster),
            usages: MemoryRecords::<ProviderConfigUsage>::new(cluster),
            secrets: Arc::new(MemorySecrets::new(cluster)),
        }
    }

    fn credentials(&self) -> CredentialResolver {
        CredentialResolver::new(Arc::clone(&self.provider_configs), Arc::clone(&self.secrets))
    }

    fn usage_tracker(&self) -> UsageTracker {
        UsageTracker::new(Arc::clone(&self.usages))
    }

    /// Connector for a kind backed by one Harbor object
    pub fn harbor_connector<K: ExternalKind + Clone>(
        &self,
        kind: K,
        factory: &ClientFactory,
    ) -> HarborConnector<K> {
        HarborConnector::new(
            kind,
            self.usage_tracker(),
            self.credentials(),
            Arc::clone(&self.secrets),
            Arc::clone(factory),
        )
    }
}

fn managed<R: Managed>(
    records: &Arc<dyn RecordStore<R>>,
    connector: Arc<dyn ExternalConnector<R>>,
    stores: &Stores,
    config: &ControllerConfig,
) -> Arc<dyn KindController> {
    Arc::new(ManagedReconciler::new(
        Arc::clone(records),
        connector,
        ConnectionPublisher::new(Arc::clone(&stores.secrets)),
        config,
    ))
}

/// The registry of every kind served by the provider
pub fn registry(stores: &Stores, config: &ControllerConfig, factory: &ClientFactory) -> Registry {
    Registry::new()
        .register(managed(
            &stores.robots,
            Arc::new(stores.harbor_connector(RobotAccountKind, factory)),
            stores,
            config,
        ))
        .register(managed(
            &stores.users,
            Arc::new(stores.harbor_connector(UserKind, factory)),
            stores,
            config,
        ))
        .register(managed(
            &stores.projects,
            Arc::new(stores.harbor_connector(ProjectKind, factory)),
            stores,
            config,
        ))
        .register(managed(
            &stores.scanners,
            Arc::new(stores.harbor_connector(ScannerKind, factory)),
            stores,
            config,
        ))
        .register(managed(
            &stores.composites,
            Arc::new(CompositeConnector::new(
                Arc::clone(&stores.users),
                Arc::clone(&stores.secrets),
            )),
            stores,
            config,
        ))
        .register(Arc::new(ProviderConfigReconciler::new(
            Arc::clone(&stores.provider_configs),
            Arc::clone(&stores.usages),
            config.poll_interval(),
        )))
}
