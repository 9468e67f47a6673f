//! # User
//!
//! Harbor local users, and the composite kind that provisions a generated
//! password secret before creating the user that references it.

use super::managed::impl_managed;
use super::{ManagedStatus, ResourceSpec, SecretKeySelector, SecretReference};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[kube(
    group = "harbor.crossplane.io",
    version = "v1alpha1",
    kind = "User",
    namespaced,
    status = "UserStatus",
    printcolumn = r#"{"name":"SYNCED", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}"#,
    printcolumn = r#"{"name":"READY", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"EXTERNAL-NAME", "type":"string", "jsonPath":".metadata.annotations.crossplane\\.io/external-name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    pub for_provider: UserParameters,
}

/// Profile fields shared by `User` and `UserWithGeneratedPassword`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Grant Harbor system administrator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserParameters {
    #[serde(flatten)]
    pub profile: UserProfile,
    /// Secret key holding the initial password; required to create the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_secret_ref: Option<SecretKeySelector>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
}

pub type UserStatus = ManagedStatus<UserObservation>;

impl_managed!(User, UserObservation);

/// A Harbor user whose password is generated into a secret first
///
/// # Example
///
/// ```yaml
/// apiVersion: harbor.crossplane.io/v1alpha1
/// kind: UserWithGeneratedPassword
/// metadata:
///   name: alice
///   namespace: team-a
/// spec:
///   forProvider:
///     username: alice
///     email: alice@example.com
///     fullName: Alice Example
///     generatePasswordInSecret:
///       name: alice-harbor-password
///       length: 24
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[kube(
    group = "harbor.crossplane.io",
    version = "v1alpha1",
    kind = "UserWithGeneratedPassword",
    namespaced,
    status = "UserWithGeneratedPasswordStatus",
    printcolumn = r#"{"name":"SYNCED", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}"#,
    printcolumn = r#"{"name":"READY", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"PHASE", "type":"string", "jsonPath":".status.atProvider.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct UserWithGeneratedPasswordSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    pub for_provider: UserWithGeneratedPasswordParameters,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserWithGeneratedPasswordParameters {
    #[serde(flatten)]
    pub profile: UserProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_password_in_secret: Option<GeneratePasswordConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePasswordConfig {
    /// Name of the secret that receives the password
    pub name: String,
    /// Defaults to the record's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Defaults to `password`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Defaults to 16; values below 8 fall back to the default, values above 128 are capped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

/// Last completed provisioning step of a composite user
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub enum CompositePhase {
    NoSecret,
    SecretCreated,
    PrimaryCreated,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserWithGeneratedPasswordObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<CompositePhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretReference>,
    /// Name of the child `User` record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ref: Option<String>,
}

pub type UserWithGeneratedPasswordStatus = ManagedStatus<UserWithGeneratedPasswordObservation>;

impl_managed!(UserWithGeneratedPassword, UserWithGeneratedPasswordObservation);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_spec_flattens_profile() {
        let spec: UserSpec = serde_json::from_value(serde_json::json!({
            "forProvider": {
                "username": "alice",
                "email": "alice@example.com",
                "fullName": "Alice Example",
                "admin": true,
                "passwordSecretRef": {"name": "pw", "key": "password"}
            }
        }))
        .unwrap();
        assert_eq!(spec.for_provider.profile.username, "alice");
        assert_eq!(spec.for_provider.profile.admin, Some(true));
        assert_eq!(spec.resource.provider_config_ref.name, "default");
        assert_eq!(spec.for_provider.password_secret_ref.unwrap().key, "password");
    }

    #[test]
    fn test_composite_phase_round_trips_in_status() {
        let observation = UserWithGeneratedPasswordObservation {
            phase: Some(CompositePhase::SecretCreated),
            ..Default::default()
        };
        let value = serde_json::to_value(&observation).unwrap();
        assert_eq!(value["phase"], "SecretCreated");
    }
}
