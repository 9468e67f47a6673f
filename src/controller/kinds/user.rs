//! Harbor local users. The password comes from a referenced secret and is
//! only sent on creation; Harbor never reports it back.

use crate::constants::DEFAULT_NAMESPACE;
use crate::controller::drift::FieldSet;
use crate::controller::error::ReconcileError;
use crate::controller::external::ConnectionDetails;
use crate::controller::handle::{Created, ExternalKind, HandleContext};
use crate::controller::identity::Correlator;
use crate::crd::{User, UserObservation};
use crate::harbor::{ApiError, HarborApi, UserCreate, UserProfileUpdate, UserRecord};
use crate::store::SecretStore;
use async_trait::async_trait;
use tracing::debug;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, Default)]
pub struct UserKind;

const PROFILE_FIELDS: [&str; 3] = ["email", "fullName", "comment"];

async fn read_password(secrets: &dyn SecretStore, record: &User) -> Result<Zeroizing<String>, ReconcileError> {
    let selector = record
        .spec
        .for_provider
        .password_secret_ref
        .as_ref()
        .ok_or_else(|| ReconcileError::InvalidSpec("passwordSecretRef is required".to_string()))?;
    let namespace = selector
        .namespace
        .as_deref()
        .or(record.metadata.namespace.as_deref())
        .unwrap_or(DEFAULT_NAMESPACE);

    // Missing secrets are transient: the composite kind creates them
    let secret = secrets
        .get(namespace, &selector.name)
        .await?
        .ok_or_else(|| {
            ReconcileError::CredentialResolution(format!(
                "password secret {namespace}/{} not found",
                selector.name
            ))
        })?;
    let raw = secret
        .data
        .as_ref()
        .and_then(|data| data.get(&selector.key))
        .ok_or_else(|| {
            ReconcileError::CredentialResolution(format!(
                "password secret {namespace}/{} has no key '{}'",
                selector.name, selector.key
            ))
        })?;
    String::from_utf8(raw.0.clone())
        .map(Zeroizing::new)
        .map_err(|e| ReconcileError::InvalidSpec(format!("password is not valid UTF-8: {e}")))
}

#[async_trait]
impl ExternalKind for UserKind {
    type Record = User;
    type Id = i64;
    type Remote = UserRecord;

    const KIND: &'static str = "user";

    fn correlator(&self) -> Correlator<i64> {
        Correlator::new("users")
    }

    fn desired_name(&self, record: &User) -> Result<String, ReconcileError> {
        Ok(record.spec.for_provider.profile.username.clone())
    }

    async fn get(&self, api: &dyn HarborApi, id: &i64) -> Result<UserRecord, ApiError> {
        api.get_user(*id).await
    }

    async fn find(&self, api: &dyn HarborApi, name: &str) -> Result<Option<UserRecord>, ApiError> {
        api.find_user(name).await
    }

    fn id_of(&self, remote: &UserRecord) -> Result<i64, ReconcileError> {
        Ok(remote.user_id)
    }

    fn desired_fields(&self, record: &User) -> FieldSet {
        let profile = &record.spec.for_provider.profile;
        FieldSet::new()
            .scalar("email", &profile.email)
            .scalar("fullName", &profile.full_name)
            .opt_scalar("comment", profile.comment.as_ref())
            .opt_scalar("admin", profile.admin)
    }

    fn observed_fields(&self, remote: &UserRecord) -> FieldSet {
        FieldSet::new()
            .scalar("email", remote.email.clone().unwrap_or_default())
            .scalar("fullName", remote.realname.clone().unwrap_or_default())
            .scalar("comment", remote.comment.clone().unwrap_or_default())
            .scalar("admin", remote.sysadmin_flag.unwrap_or(false))
    }

    fn observation(&self, remote: &UserRecord) -> UserObservation {
        UserObservation {
            user_id: Some(remote.user_id),
            username: Some(remote.username.clone()),
            email: remote.email.clone(),
            full_name: remote.realname.clone(),
            comment: remote.comment.clone(),
            admin: remote.sysadmin_flag,
            creation_time: remote.creation_time.clone(),
        }
    }

    async fn create(
        &self,
        ctx: &HandleContext,
        record: &User,
    ) -> Result<Created<i64, UserObservation>, ReconcileError> {
        let profile = &record.spec.for_provider.profile;
        let password = read_password(ctx.secrets.as_ref(), record).await?;
        let request = UserCreate {
            username: profile.username.clone(),
            email: profile.email.clone(),
            realname: profile.full_name.clone(),
            password: password.to_string(),
            comment: profile.comment.clone(),
        };
        let id = ctx
            .api
            .create_user(&request)
            .await
            .map_err(ReconcileError::Create)?;
        if profile.admin == Some(true) {
            ctx.api
                .set_user_sysadmin(id, true)
                .await
                .map_err(ReconcileError::Create)?;
        }

        let mut details = ConnectionDetails::new();
        details.insert("username".to_string(), profile.username.clone().into_bytes());
        details.insert("password".to_string(), password.as_bytes().to_vec());

        Ok(Created {
            id,
            observation: Some(UserObservation {
                user_id: Some(id),
                username: Some(profile.username.clone()),
                email: Some(profile.email.clone()),
                full_name: Some(profile.full_name.clone()),
                comment: profile.comment.clone(),
                admin: Some(profile.admin.unwrap_or(false)),
                creation_time: None,
            }),
            connection_details: details,
        })
    }

    async fn update(
        &self,
        ctx: &HandleContext,
        id: &i64,
        record: &User,
        changed: &FieldSet,
    ) -> Result<ConnectionDetails, ReconcileError> {
        let profile = &record.spec.for_provider.profile;
        if PROFILE_FIELDS.iter().any(|f| changed.contains(f)) {
            debug!(user_id = id, "Updating user profile");
            let update = UserProfileUpdate {
                email: profile.email.clone(),
                realname: profile.full_name.clone(),
                comment: profile.comment.clone().unwrap_or_default(),
            };
            ctx.api
                .update_user_profile(*id, &update)
                .await
                .map_err(ReconcileError::Update)?;
        }
        if changed.contains("admin") {
            debug!(user_id = id, admin = ?profile.admin, "Updating sysadmin flag");
            ctx.api
                .set_user_sysadmin(*id, profile.admin.unwrap_or(false))
                .await
                .map_err(ReconcileError::Update)?;
        }
        Ok(ConnectionDetails::new())
    }

    async fn delete(&self, api: &dyn HarborApi, id: &i64) -> Result<(), ApiError> {
        api.delete_user(*id).await
    }
}
