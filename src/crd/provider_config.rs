//! # ProviderConfig
//!
//! Cluster-scoped records naming the secret that holds Harbor credentials,
//! and the usage markers managed records leave on them.

use super::status::Condition;
use super::ProviderConfigReference;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Points the provider at a Harbor instance
///
/// # Example
///
/// ```yaml
/// apiVersion: harbor.crossplane.io/v1beta1
/// kind: ProviderConfig
/// metadata:
///   name: default
/// spec:
///   credentials:
///     source: Secret
///     secretRef:
///       name: harbor-credentials
///       namespace: crossplane-system
///       key: credentials
/// ```
///
/// The referenced key holds JSON: `{"url": "...", "username": "...", "password": "...", "insecure": false}`.
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[kube(
    group = "harbor.crossplane.io",
    version = "v1beta1",
    kind = "ProviderConfig",
    status = "ProviderConfigStatus",
    printcolumn = r#"{"name":"USERS", "type":"integer", "jsonPath":".status.users"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    pub credentials: ProviderCredentials,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    #[serde(default)]
    pub source: CredentialsSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<CredentialsSecretRef>,
}

#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema,
)]
pub enum CredentialsSource {
    #[default]
    Secret,
    None,
}

/// Secret key holding the credentials JSON; the namespace is mandatory
/// because ProviderConfig is cluster-scoped
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct CredentialsSecretRef {
    pub name: String,
    pub namespace: String,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigStatus {
    /// Number of managed records currently using this config
    #[serde(default)]
    pub users: i64,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Records that a managed record resolved its credentials through a
/// ProviderConfig. Deleted when the managed record is finalized.
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[kube(
    group = "harbor.crossplane.io",
    version = "v1beta1",
    kind = "ProviderConfigUsage",
    printcolumn = r#"{"name":"CONFIG-NAME", "type":"string", "jsonPath":".spec.providerConfigRef.name"}"#,
    printcolumn = r#"{"name":"RESOURCE-KIND", "type":"string", "jsonPath":".spec.resourceRef.kind"}"#,
    printcolumn = r#"{"name":"RESOURCE-NAME", "type":"string", "jsonPath":".spec.resourceRef.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigUsageSpec {
    pub provider_config_ref: ProviderConfigReference,
    pub resource_ref: TypedReference,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypedReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}
