//! Harbor API v2.0 request and response payloads.
//!
//! Only the fields the provider reads or writes are modelled; unknown fields
//! in responses are ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Robot accounts
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RobotAccess {
    pub resource: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RobotPermission {
    pub kind: String,
    pub namespace: String,
    #[serde(default)]
    pub access: Vec<RobotAccess>,
}

/// `POST /robots`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RobotCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub level: String,
    /// Days; -1 never expires
    pub duration: i64,
    pub disable: bool,
    pub permissions: Vec<RobotPermission>,
}

/// Returned once by `POST /robots`; the only time Harbor reveals the secret
#[derive(Clone, Deserialize)]
pub struct RobotCreated {
    pub id: i64,
    /// Full name, e.g. `robot$ci+pusher`
    pub name: String,
    pub secret: String,
    #[serde(default)]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl std::fmt::Debug for RobotCreated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobotCreated")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Robot {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub disable: Option<bool>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub permissions: Vec<RobotPermission>,
}

// ============================================================================
// Users
// ============================================================================

/// `POST /users`
#[derive(Clone, Serialize)]
pub struct UserCreate {
    pub username: String,
    pub email: String,
    pub realname: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl std::fmt::Debug for UserCreate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCreate")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// `PUT /users/{id}`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserProfileUpdate {
    pub email: String,
    pub realname: String,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserRecord {
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub realname: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub sysadmin_flag: Option<bool>,
    #[serde(default)]
    pub creation_time: Option<String>,
}

/// Entry of `GET /users/search`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserSearchResult {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SysAdminFlag {
    pub sysadmin_flag: bool,
}

// ============================================================================
// Projects
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CveAllowlist {
    #[serde(default)]
    pub items: Vec<CveItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CveItem {
    pub cve_id: String,
}

impl CveAllowlist {
    pub fn from_ids<'a>(ids: impl IntoIterator<Item = &'a String>) -> Self {
        Self {
            items: ids
                .into_iter()
                .map(|id| CveItem { cve_id: id.clone() })
                .collect(),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.cve_id.as_str())
    }
}

/// `POST /projects` and `PUT /projects/{id}`
///
/// Project metadata values are strings on the wire (`"true"`, `"false"`).
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct ProjectRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cve_allowlist: Option<CveAllowlist>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProjectRecord {
    pub project_id: i64,
    pub name: String,
    #[serde(default)]
    pub registry_id: Option<i64>,
    #[serde(default)]
    pub repo_count: Option<i64>,
    #[serde(default)]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub cve_allowlist: Option<CveAllowlist>,
}

/// Entry of `GET /quotas`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Quota {
    pub id: i64,
    #[serde(default)]
    pub hard: BTreeMap<String, i64>,
}

// ============================================================================
// Scanners
// ============================================================================

/// `POST /scanners` and `PUT /scanners/{uuid}`
#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct ScannerRequest {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_credential: Option<String>,
}

impl std::fmt::Debug for ScannerRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerRequest")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ScannerRecord {
    pub uuid: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
    #[serde(default)]
    pub health: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// Harbor error body: `{"errors": [{"code": "...", "message": "..."}]}`
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEntry {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
