//! # Common Spec Types
//!
//! Fields flattened into every managed kind: which ProviderConfig supplies the
//! Harbor credentials, what happens to the Harbor object on deletion, and
//! where connection details are published.

use crate::constants::DEFAULT_PROVIDER_CONFIG_NAME;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    #[serde(default)]
    pub provider_config_ref: ProviderConfigReference,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
    /// Secret that receives the connection details issued by Harbor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self {
            provider_config_ref: ProviderConfigReference::default(),
            deletion_policy: DeletionPolicy::Delete,
            write_connection_secret_to_ref: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct ProviderConfigReference {
    pub name: String,
}

impl Default for ProviderConfigReference {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROVIDER_CONFIG_NAME.to_string(),
        }
    }
}

/// What happens to the Harbor object when its record is deleted
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema,
)]
pub enum DeletionPolicy {
    #[default]
    Delete,
    Orphan,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct SecretReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct SecretKeySelector {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_spec_defaults() {
        let spec: ResourceSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec.provider_config_ref.name, "default");
        assert_eq!(spec.deletion_policy, DeletionPolicy::Delete);
        assert!(spec.write_connection_secret_to_ref.is_none());
    }

    #[test]
    fn test_resource_spec_camel_case() {
        let spec: ResourceSpec = serde_json::from_value(serde_json::json!({
            "providerConfigRef": {"name": "prod"},
            "deletionPolicy": "Orphan",
            "writeConnectionSecretToRef": {"name": "robot-creds", "namespace": "ci"}
        }))
        .unwrap();
        assert_eq!(spec.provider_config_ref.name, "prod");
        assert_eq!(spec.deletion_policy, DeletionPolicy::Orphan);
        assert_eq!(
            spec.write_connection_secret_to_ref.unwrap().namespace.as_deref(),
            Some("ci")
        );
    }
}
