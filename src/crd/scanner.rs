//! # ScannerRegistration
//!
//! Vulnerability scanner adapters registered with Harbor. Identified by the
//! registration UUID Harbor assigns.

use super::managed::impl_managed;
use super::{ManagedStatus, ResourceSpec};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[kube(
    group = "harbor.crossplane.io",
    version = "v1alpha1",
    kind = "ScannerRegistration",
    namespaced,
    status = "ScannerRegistrationStatus",
    printcolumn = r#"{"name":"SYNCED", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}"#,
    printcolumn = r#"{"name":"READY", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"URL", "type":"string", "jsonPath":".spec.forProvider.url"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ScannerRegistrationSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    pub for_provider: ScannerRegistrationParameters,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScannerRegistrationParameters {
    pub name: String,
    /// Base URL of the scanner adapter
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `Basic`, `Bearer` or `X-ScannerAdapter-API-Key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    /// Authorization header value sent to the adapter; never returned by Harbor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_credential: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScannerRegistrationObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

pub type ScannerRegistrationStatus = ManagedStatus<ScannerRegistrationObservation>;

impl_managed!(ScannerRegistration, ScannerRegistrationObservation);
