//! # Connection Publisher
//!
//! Writes connection details into the secret named by a record's
//! `writeConnectionSecretToRef`. The secret is controller-owned by the
//! record, so it is garbage collected with it; a secret controlled by
//! another object is never touched.
//!
//! Details are merged into the existing data: values Harbor only reveals
//! once (robot secrets) survive later publishes that lack them.

use super::error::ReconcileError;
use super::external::ConnectionDetails;
use crate::constants::{
    CONNECTION_SECRET_TYPE, DEFAULT_NAMESPACE, FIELD_MANAGER, LABEL_MANAGED_BY,
};
use crate::crd::Managed;
use crate::observability::metrics;
use crate::store::SecretStore;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct ConnectionPublisher {
    secrets: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for ConnectionPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPublisher").finish_non_exhaustive()
    }
}

/// Uid of the object controlling `secret`, if any
fn controller_uid(secret: &Secret) -> Option<&str> {
    secret
        .metadata
        .owner_references
        .iter()
        .flatten()
        .find(|r| r.controller == Some(true))
        .map(|r| r.uid.as_str())
}

impl ConnectionPublisher {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    fn target<R: Managed>(record: &R) -> Option<(String, String)> {
        let target = record.resource_spec().write_connection_secret_to_ref.as_ref()?;
        let namespace = target
            .namespace
            .clone()
            .or_else(|| record.meta().namespace.clone())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        Some((namespace, target.name.clone()))
    }

    /// Publish `details`; returns whether the secret was written
    ///
    /// Nothing is written when the record names no secret, the details are
    /// empty, or the secret already holds them.
    pub async fn publish<R: Managed>(
        &self,
        record: &R,
        details: &ConnectionDetails,
    ) -> Result<bool, ReconcileError> {
        let Some((namespace, name)) = Self::target(record) else {
            return Ok(false);
        };
        if details.is_empty() {
            return Ok(false);
        }
        let owner = record.controller_owner_ref(&()).ok_or_else(|| {
            ReconcileError::Publish(format!("{} has no uid yet", record.display_name()))
        })?;

        let existing = self.secrets.get(&namespace, &name).await?;
        let mut data = BTreeMap::new();
        if let Some(existing) = &existing {
            if let Some(uid) = controller_uid(existing) {
                if uid != owner.uid {
                    return Err(ReconcileError::Publish(format!(
                        "secret {namespace}/{name} is controlled by another object ({uid})"
                    )));
                }
            }
            data.extend(existing.data.clone().unwrap_or_default());
        }
        let before = data.clone();
        for (key, value) in details {
            data.insert(key.clone(), ByteString(value.clone()));
        }
        let already_owned = existing
            .as_ref()
            .and_then(controller_uid)
            .is_some_and(|uid| uid == owner.uid);
        if existing.is_some() && already_owned && before == data {
            debug!(secret = %format!("{namespace}/{name}"), "Connection secret up to date");
            return Ok(false);
        }

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(namespace.clone()),
                labels: Some(BTreeMap::from([(
                    LABEL_MANAGED_BY.to_string(),
                    FIELD_MANAGER.to_string(),
                )])),
                owner_references: Some(vec![owner]),
                ..Default::default()
            },
            type_: Some(CONNECTION_SECRET_TYPE.to_string()),
            data: Some(data),
            ..Default::default()
        };
        self.secrets.apply(&secret).await?;
        metrics::increment_connection_secrets_published();
        info!(
            resource = %record.display_name(),
            secret = %format!("{namespace}/{name}"),
            keys = details.len(),
            "Published connection details"
        );
        Ok(true)
    }

    /// Delete the record's connection secret, if the record controls it
    pub async fn unpublish<R: Managed>(&self, record: &R) -> Result<(), ReconcileError> {
        let Some((namespace, name)) = Self::target(record) else {
            return Ok(());
        };
        let Some(existing) = self.secrets.get(&namespace, &name).await? else {
            return Ok(());
        };
        let uid = record.meta().uid.as_deref();
        match controller_uid(&existing) {
            Some(owner) if Some(owner) == uid => {
                self.secrets.delete(&namespace, &name).await?;
                debug!(secret = %format!("{namespace}/{name}"), "Deleted connection secret");
            }
            _ => warn!(
                resource = %record.display_name(),
                secret = %format!("{namespace}/{name}"),
                "Connection secret is not controlled by this record; leaving it in place"
            ),
        }
        Ok(())
    }
}
