//! # Credential Resolver
//!
//! Turns a ProviderConfig name into Harbor connection settings by reading
//! the secret key it references. The key holds a JSON document:
//!
//! ```json
//! {"url": "https://harbor.example.com", "username": "admin", "password": "...", "insecure": false}
//! ```

use super::error::ReconcileError;
use crate::crd::{CredentialsSource, ProviderConfig};
use crate::harbor::HarborConfig;
use crate::store::{ObjectKey, RecordStore, SecretStore};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

#[derive(Deserialize)]
struct RawCredentials {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    #[serde(default)]
    insecure: bool,
}

#[derive(Clone)]
pub struct CredentialResolver {
    configs: Arc<dyn RecordStore<ProviderConfig>>,
    secrets: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver").finish_non_exhaustive()
    }
}

impl CredentialResolver {
    pub fn new(configs: Arc<dyn RecordStore<ProviderConfig>>, secrets: Arc<dyn SecretStore>) -> Self {
        Self { configs, secrets }
    }

    /// Resolve the named ProviderConfig
    ///
    /// # Errors
    ///
    /// [`ReconcileError::CredentialResolution`] when the config, secret or key
    /// is missing, or the key does not hold the expected document.
    pub async fn resolve(&self, provider_config: &str) -> Result<HarborConfig, ReconcileError> {
        let config = self
            .configs
            .get(&ObjectKey::cluster(provider_config))
            .await?
            .ok_or_else(|| {
                ReconcileError::CredentialResolution(format!(
                    "ProviderConfig '{provider_config}' not found"
                ))
            })?;

        let credentials = &config.spec.credentials;
        if credentials.source != CredentialsSource::Secret {
            return Err(ReconcileError::CredentialResolution(format!(
                "ProviderConfig '{provider_config}': credentials source {:?} is not supported",
                credentials.source
            )));
        }
        let secret_ref = credentials.secret_ref.as_ref().ok_or_else(|| {
            ReconcileError::CredentialResolution(format!(
                "ProviderConfig '{provider_config}' has no secretRef"
            ))
        })?;

        let secret = self
            .secrets
            .get(&secret_ref.namespace, &secret_ref.name)
            .await?
            .ok_or_else(|| {
                ReconcileError::CredentialResolution(format!(
                    "secret {}/{} not found",
                    secret_ref.namespace, secret_ref.name
                ))
            })?;
        let raw = secret
            .data
            .as_ref()
            .and_then(|data| data.get(&secret_ref.key))
            .ok_or_else(|| {
                ReconcileError::CredentialResolution(format!(
                    "secret {}/{} has no key '{}'",
                    secret_ref.namespace, secret_ref.name, secret_ref.key
                ))
            })?;

        debug!(
            provider_config = provider_config,
            secret = %format!("{}/{}", secret_ref.namespace, secret_ref.name),
            "Resolved Harbor credentials secret"
        );
        parse_credentials(&raw.0)
    }
}

/// Parse the credentials document
pub fn parse_credentials(raw: &[u8]) -> Result<HarborConfig, ReconcileError> {
    let parsed: RawCredentials = serde_json::from_slice(raw).map_err(|e| {
        ReconcileError::CredentialResolution(format!("credentials are not valid JSON: {e}"))
    })?;
    let missing =
        |key: &str| ReconcileError::CredentialResolution(format!("credentials lack '{key}'"));

    Ok(HarborConfig {
        url: parsed.url.filter(|u| !u.is_empty()).ok_or_else(|| missing("url"))?,
        username: parsed
            .username
            .filter(|u| !u.is_empty())
            .ok_or_else(|| missing("username"))?,
        password: Zeroizing::new(parsed.password.ok_or_else(|| missing("password"))?),
        insecure: parsed.insecure,
    })
}
