//! # Harbor API
//!
//! The target-system collaborator. The engine only talks to Harbor through
//! [`HarborApi`]; [`HarborClient`] is the REST implementation.

mod client;
pub mod models;

pub use client::HarborClient;
pub use models::*;

use async_trait::async_trait;
use thiserror::Error;
use zeroize::Zeroizing;

/// Failure of one Harbor call
///
/// `NotFound` is the only variant callers may reinterpret as absence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("HTTP {status}: unauthorized: {message}")]
    Unauthorized { status: u16, message: String },
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Resolved connection settings for one Harbor instance
#[derive(Clone, PartialEq, Eq)]
pub struct HarborConfig {
    pub url: String,
    pub username: String,
    pub password: Zeroizing<String>,
    pub insecure: bool,
}

impl std::fmt::Debug for HarborConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarborConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("insecure", &self.insecure)
            .finish()
    }
}

impl HarborConfig {
    /// Host (and port, if any) of the registry, as used in docker config keys
    pub fn registry_host(&self) -> Option<String> {
        let url = reqwest::Url::parse(&self.url).ok()?;
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}

/// Domain operations against one Harbor instance
#[async_trait]
pub trait HarborApi: Send + Sync {
    async fn create_robot(&self, robot: &RobotCreate) -> Result<RobotCreated, ApiError>;
    async fn get_robot(&self, id: i64) -> Result<Robot, ApiError>;
    /// Look up by full name (`robot$...`)
    async fn find_robot(&self, name: &str) -> Result<Option<Robot>, ApiError>;
    async fn delete_robot(&self, id: i64) -> Result<(), ApiError>;

    /// Returns the new user id
    async fn create_user(&self, user: &UserCreate) -> Result<i64, ApiError>;
    async fn get_user(&self, id: i64) -> Result<UserRecord, ApiError>;
    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, ApiError>;
    async fn update_user_profile(&self, id: i64, profile: &UserProfileUpdate) -> Result<(), ApiError>;
    async fn set_user_sysadmin(&self, id: i64, sysadmin: bool) -> Result<(), ApiError>;
    async fn delete_user(&self, id: i64) -> Result<(), ApiError>;

    /// Returns the new project id
    async fn create_project(&self, project: &ProjectRequest) -> Result<i64, ApiError>;
    async fn get_project(&self, id: i64) -> Result<ProjectRecord, ApiError>;
    async fn find_project(&self, name: &str) -> Result<Option<ProjectRecord>, ApiError>;
    async fn update_project(&self, id: i64, project: &ProjectRequest) -> Result<(), ApiError>;
    /// Hard storage quota in bytes, if Harbor reports one
    async fn get_project_storage_limit(&self, id: i64) -> Result<Option<i64>, ApiError>;
    async fn set_project_storage_limit(&self, id: i64, limit: i64) -> Result<(), ApiError>;
    async fn delete_project(&self, id: i64) -> Result<(), ApiError>;

    /// Returns the registration UUID
    async fn create_scanner(&self, scanner: &ScannerRequest) -> Result<String, ApiError>;
    async fn get_scanner(&self, uuid: &str) -> Result<ScannerRecord, ApiError>;
    async fn find_scanner(&self, name: &str) -> Result<Option<ScannerRecord>, ApiError>;
    async fn update_scanner(&self, uuid: &str, scanner: &ScannerRequest) -> Result<(), ApiError>;
    async fn delete_scanner(&self, uuid: &str) -> Result<(), ApiError>;
}
