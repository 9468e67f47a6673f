//! # Multi-Phase Orchestrator
//!
//! `UserWithGeneratedPassword` provisions in two phases, one per attempt:
//!
//! 1. generate a password into a secret owned by the composite
//! 2. create a child `User` record, owned by the composite, that reads its
//!    password from that secret
//!
//! The phase is derived from what exists, so a crash between the two steps
//! resumes at step 2 without generating a second password. The composite
//! never talks to Harbor; the child User does. Deleting the composite
//! relies on ownership to cascade to the secret and the child.

use super::error::ReconcileError;
use super::external::{
    ConnectionDetails, ExternalClient, ExternalConnector, ExternalCreation, ExternalObservation,
    ExternalUpdate,
};
use crate::constants::{
    COMPOSITE_USER_SUFFIX, DEFAULT_NAMESPACE, DEFAULT_PASSWORD_KEY, DEFAULT_PASSWORD_LENGTH,
    FIELD_MANAGER, LABEL_GENERATED, LABEL_MANAGED_BY, LABEL_SECRET_TYPE, LABEL_USER,
    MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH, PASSWORD_CHARSET, SECRET_TYPE_PASSWORD,
};
use crate::crd::{
    CompositePhase, Managed, ResourceSpec, SecretKeySelector, SecretReference, User,
    UserParameters, UserSpec, UserWithGeneratedPassword, UserWithGeneratedPasswordObservation,
};
use crate::observability::metrics;
use crate::store::{ObjectKey, RecordStore, SecretStore, StoreError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::Resource;
use rand::rngs::OsRng;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use zeroize::Zeroizing;

/// Generate a password from [`PASSWORD_CHARSET`]
///
/// Lengths below [`MIN_PASSWORD_LENGTH`] fall back to the default; lengths
/// above [`MAX_PASSWORD_LENGTH`] are capped.
pub fn generate_password(length: Option<usize>) -> Zeroizing<String> {
    let length = match length {
        Some(requested) if requested < MIN_PASSWORD_LENGTH => DEFAULT_PASSWORD_LENGTH,
        Some(requested) => requested.min(MAX_PASSWORD_LENGTH),
        None => DEFAULT_PASSWORD_LENGTH,
    };
    let mut rng = OsRng;
    Zeroizing::new(
        (0..length)
            .map(|_| char::from(PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())]))
            .collect(),
    )
}

/// Where the generated password lives
#[derive(Debug, Clone, PartialEq, Eq)]
struct PasswordTarget {
    namespace: String,
    name: String,
    key: String,
    length: Option<usize>,
}

fn password_target(record: &UserWithGeneratedPassword) -> Result<PasswordTarget, ReconcileError> {
    let config = record
        .spec
        .for_provider
        .generate_password_in_secret
        .as_ref()
        .ok_or_else(|| {
            ReconcileError::InvalidSpec("generatePasswordInSecret is required".to_string())
        })?;
    Ok(PasswordTarget {
        namespace: config
            .namespace
            .clone()
            .or_else(|| record.metadata.namespace.clone())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        name: config.name.clone(),
        key: config
            .key
            .clone()
            .unwrap_or_else(|| DEFAULT_PASSWORD_KEY.to_string()),
        length: config.length,
    })
}

/// Key of the child User record
pub fn child_key(record: &UserWithGeneratedPassword) -> ObjectKey {
    ObjectKey {
        namespace: record.metadata.namespace.clone(),
        name: format!(
            "{}{COMPOSITE_USER_SUFFIX}",
            record.metadata.name.as_deref().unwrap_or_default()
        ),
    }
}

fn labels(record: &UserWithGeneratedPassword) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_MANAGED_BY.to_string(), FIELD_MANAGER.to_string()),
        (
            LABEL_USER.to_string(),
            record.spec.for_provider.profile.username.clone(),
        ),
    ])
}

/// Session for one composite record
pub struct CompositeHandle {
    users: Arc<dyn RecordStore<User>>,
    secrets: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for CompositeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeHandle").finish_non_exhaustive()
    }
}

impl CompositeHandle {
    fn observation(
        target: &PasswordTarget,
        secret_exists: bool,
        user: Option<&ObjectKey>,
    ) -> UserWithGeneratedPasswordObservation {
        let phase = match (secret_exists, user.is_some()) {
            (false, _) => CompositePhase::NoSecret,
            (true, false) => CompositePhase::SecretCreated,
            (true, true) => CompositePhase::PrimaryCreated,
        };
        UserWithGeneratedPasswordObservation {
            phase: Some(phase),
            secret_ref: secret_exists.then(|| SecretReference {
                name: target.name.clone(),
                namespace: Some(target.namespace.clone()),
            }),
            user_ref: user.map(|key| key.name.clone()),
        }
    }

    /// Does the password secret exist and hold the password key
    async fn secret_ready(&self, target: &PasswordTarget) -> Result<bool, ReconcileError> {
        let Some(secret) = self.secrets.get(&target.namespace, &target.name).await? else {
            return Ok(false);
        };
        let has_key = secret
            .data
            .as_ref()
            .is_some_and(|data| data.contains_key(&target.key));
        if has_key {
            Ok(true)
        } else {
            Err(ReconcileError::InvalidSpec(format!(
                "secret {}/{} exists without key '{}'",
                target.namespace, target.name, target.key
            )))
        }
    }

    async fn create_secret(
        &self,
        record: &UserWithGeneratedPassword,
        target: &PasswordTarget,
    ) -> Result<(), ReconcileError> {
        let owner = record.controller_owner_ref(&()).ok_or_else(|| {
            ReconcileError::InvalidSpec(format!("{} has no uid yet", record.display_name()))
        })?;
        let password = generate_password(target.length);
        let mut secret_labels = labels(record);
        secret_labels.insert(LABEL_GENERATED.to_string(), "true".to_string());
        secret_labels.insert(LABEL_SECRET_TYPE.to_string(), SECRET_TYPE_PASSWORD.to_string());

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(target.name.clone()),
                namespace: Some(target.namespace.clone()),
                labels: Some(secret_labels),
                owner_references: Some(vec![owner]),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(BTreeMap::from([(
                target.key.clone(),
                ByteString(password.as_bytes().to_vec()),
            )])),
            ..Default::default()
        };
        match self.secrets.create(&secret).await {
            Ok(()) => {
                metrics::increment_generated_passwords();
                info!(
                    resource = %record.display_name(),
                    secret = %format!("{}/{}", target.namespace, target.name),
                    "Generated password secret"
                );
                Ok(())
            }
            // Created by an earlier attempt whose outcome was lost
            Err(StoreError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_user(
        &self,
        record: &UserWithGeneratedPassword,
        target: &PasswordTarget,
        key: &ObjectKey,
    ) -> Result<(), ReconcileError> {
        let owner = record.controller_owner_ref(&()).ok_or_else(|| {
            ReconcileError::InvalidSpec(format!("{} has no uid yet", record.display_name()))
        })?;
        let mut user = User::new(
            &key.name,
            UserSpec {
                resource: ResourceSpec {
                    provider_config_ref: record.spec.resource.provider_config_ref.clone(),
                    deletion_policy: record.spec.resource.deletion_policy,
                    write_connection_secret_to_ref: None,
                },
                for_provider: UserParameters {
                    profile: record.spec.for_provider.profile.clone(),
                    password_secret_ref: Some(SecretKeySelector {
                        name: target.name.clone(),
                        namespace: Some(target.namespace.clone()),
                        key: target.key.clone(),
                    }),
                },
            },
        );
        user.metadata.namespace = key.namespace.clone();
        user.metadata.labels = Some(labels(record));
        user.metadata.owner_references = Some(vec![owner]);

        match self.users.create(&user).await {
            Ok(_) => {
                info!(
                    resource = %record.display_name(),
                    user = %key,
                    "Created child User record"
                );
                Ok(())
            }
            Err(StoreError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ExternalClient<UserWithGeneratedPassword> for CompositeHandle {
    async fn observe(
        &self,
        record: &UserWithGeneratedPassword,
    ) -> Result<ExternalObservation<UserWithGeneratedPasswordObservation>, ReconcileError> {
        let target = password_target(record)?;
        let secret_exists = self.secret_ready(&target).await?;
        let key = child_key(record);
        let user_exists = secret_exists && self.users.get(&key).await?.is_some();
        let exists = secret_exists && user_exists;

        Ok(ExternalObservation {
            exists,
            up_to_date: exists,
            observation: Some(Self::observation(
                &target,
                secret_exists,
                user_exists.then_some(&key),
            )),
            changed: Default::default(),
            external_name: None,
            connection_details: ConnectionDetails::new(),
        })
    }

    async fn create(
        &self,
        record: &UserWithGeneratedPassword,
    ) -> Result<ExternalCreation<UserWithGeneratedPasswordObservation>, ReconcileError> {
        let target = password_target(record)?;
        let key = child_key(record);

        // One phase per attempt; the next observation picks up from here
        let observation = if self.secret_ready(&target).await? {
            self.create_user(record, &target, &key).await?;
            Self::observation(&target, true, Some(&key))
        } else {
            self.create_secret(record, &target).await?;
            Self::observation(&target, true, None)
        };
        Ok(ExternalCreation {
            external_name: None,
            observation: Some(observation),
            connection_details: ConnectionDetails::new(),
        })
    }

    async fn update(
        &self,
        _record: &UserWithGeneratedPassword,
        _observed: &ExternalObservation<UserWithGeneratedPasswordObservation>,
    ) -> Result<ExternalUpdate<UserWithGeneratedPasswordObservation>, ReconcileError> {
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, _record: &UserWithGeneratedPassword) -> Result<(), ReconcileError> {
        Ok(())
    }
}

/// [`ExternalConnector`] for the composite; needs no Harbor credentials
pub struct CompositeConnector {
    users: Arc<dyn RecordStore<User>>,
    secrets: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for CompositeConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeConnector").finish_non_exhaustive()
    }
}

impl CompositeConnector {
    pub fn new(users: Arc<dyn RecordStore<User>>, secrets: Arc<dyn SecretStore>) -> Self {
        Self { users, secrets }
    }
}

#[async_trait]
impl ExternalConnector<UserWithGeneratedPassword> for CompositeConnector {
    async fn connect(
        &self,
        _record: &UserWithGeneratedPassword,
    ) -> Result<Box<dyn ExternalClient<UserWithGeneratedPassword>>, ReconcileError> {
        Ok(Box::new(CompositeHandle {
            users: Arc::clone(&self.users),
            secrets: Arc::clone(&self.secrets),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_password_lengths() {
        assert_eq!(generate_password(None).len(), DEFAULT_PASSWORD_LENGTH);
        assert_eq!(generate_password(Some(4)).len(), DEFAULT_PASSWORD_LENGTH);
        assert_eq!(generate_password(Some(8)).len(), 8);
        assert_eq!(generate_password(Some(32)).len(), 32);
        assert_eq!(generate_password(Some(10_000)).len(), MAX_PASSWORD_LENGTH);
    }

    #[test]
    fn test_generate_password_charset() {
        let password = generate_password(Some(MAX_PASSWORD_LENGTH));
        assert!(password.bytes().all(|b| PASSWORD_CHARSET.contains(&b)));
        assert_ne!(*generate_password(None), *generate_password(None));
    }
}
