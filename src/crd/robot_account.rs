//! # RobotAccount
//!
//! Harbor robot accounts. Harbor cannot change a robot after creation, so the
//! kind is treated as immutable: drift is reported but never applied.

use super::managed::impl_managed;
use super::{ManagedStatus, ResourceSpec};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[kube(
    group = "harbor.crossplane.io",
    version = "v1alpha1",
    kind = "RobotAccount",
    namespaced,
    status = "RobotAccountStatus",
    shortname = "robot",
    printcolumn = r#"{"name":"SYNCED", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}"#,
    printcolumn = r#"{"name":"READY", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"EXTERNAL-NAME", "type":"string", "jsonPath":".metadata.annotations.crossplane\\.io/external-name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RobotAccountSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    pub for_provider: RobotAccountParameters,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RobotAccountParameters {
    /// Short name; Harbor prefixes it with `robot$` (and the project for project robots)
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `system` or `project`
    #[serde(default = "default_level")]
    pub level: String,
    /// Lifetime in days; -1 never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable: Option<bool>,
    #[serde(default)]
    pub permissions: Vec<RobotPermission>,
}

fn default_level() -> String {
    "system".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RobotPermission {
    /// `project` or `system`
    pub kind: String,
    /// Project name, or `/` for system scope
    pub namespace: String,
    #[serde(default)]
    pub access: Vec<RobotAccess>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct RobotAccess {
    pub resource: String,
    pub action: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RobotAccountObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Full Harbor name, e.g. `robot$ci+pusher`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
}

pub type RobotAccountStatus = ManagedStatus<RobotAccountObservation>;

impl_managed!(RobotAccount, RobotAccountObservation);
