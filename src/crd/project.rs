//! # Project
//!
//! Harbor projects with their metadata flags, CVE allowlist and quota.

use super::managed::impl_managed;
use super::{ManagedStatus, ResourceSpec};
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[kube(
    group = "harbor.crossplane.io",
    version = "v1alpha1",
    kind = "Project",
    namespaced,
    status = "ProjectStatus",
    printcolumn = r#"{"name":"SYNCED", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}"#,
    printcolumn = r#"{"name":"READY", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"EXTERNAL-NAME", "type":"string", "jsonPath":".metadata.annotations.crossplane\\.io/external-name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    pub for_provider: ProjectParameters,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectParameters {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_content_trust: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_content_trust_cosign: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_scan_images: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prevent_vulnerable_images: Option<bool>,
    /// Minimum severity blocked when `preventVulnerableImages` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    /// CVE ids that must be allowlisted; Harbor may allow more
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cve_allowlist: Option<Vec<String>>,
    /// Proxy-cache upstream registry; only honoured on creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<i64>,
    /// Quota in bytes; -1 is unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_limit: Option<i64>,
    /// Additional project metadata passed through verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
}

pub type ProjectStatus = ManagedStatus<ProjectObservation>;

impl_managed!(Project, ProjectObservation);
