//! Common test utilities for the integration tests
//!
//! Provides:
//! - [`FakeHarbor`], an in-memory [`HarborApi`] that records every call and
//!   can be told to fail specific operations
//! - [`Env`], an in-process cluster with every store, a ProviderConfig and
//!   its credentials secret
//! - record builders
//! - rustls crypto provider setup

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use harbor_provider::config::ControllerConfig;
use harbor_provider::controller::connector::ClientFactory;
use harbor_provider::controller::setup::{self, Stores};
use harbor_provider::crd::{
    Condition, CredentialsSecretRef, Managed, CredentialsSource, DeletionPolicy, GeneratePasswordConfig, Project,
    ProjectParameters, ProjectSpec, ProviderConfig, ProviderConfigSpec, ProviderConfigUsage,
    ProviderCredentials, ResourceSpec, RobotAccess, RobotAccount, RobotAccountParameters,
    RobotAccountSpec, RobotPermission, ScannerRegistration, SecretKeySelector, SecretReference,
    User, UserParameters, UserProfile, UserSpec, UserWithGeneratedPassword,
    UserWithGeneratedPasswordParameters, UserWithGeneratedPasswordSpec,
};
use harbor_provider::harbor::{
    self, ApiError, HarborApi, ProjectRecord, ProjectRequest, Robot, RobotCreate, RobotCreated,
    ScannerRecord, ScannerRequest, UserCreate, UserProfileUpdate, UserRecord,
};
use harbor_provider::controller::reconciler::{AttemptContext, ReconcileOutcome, TriggerSource};
use harbor_provider::controller::error::ReconcileError;
use harbor_provider::runtime::Registry;
use harbor_provider::store::{
    MemoryCluster, MemoryRecords, MemorySecrets, ObjectKey, RecordStore, SecretStore,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` so it only runs once per test binary.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

pub const NAMESPACE: &str = "team-a";
pub const HARBOR_URL: &str = "https://harbor.example.com";

// ============================================================================
// Fake Harbor
// ============================================================================

#[derive(Default)]
struct HarborState {
    next_id: i64,
    robots: BTreeMap<i64, Robot>,
    robot_secrets: HashMap<i64, String>,
    users: BTreeMap<i64, UserRecord>,
    user_passwords: HashMap<i64, String>,
    projects: BTreeMap<i64, ProjectRecord>,
    storage_limits: HashMap<i64, i64>,
    scanners: BTreeMap<String, ScannerRecord>,
    calls: Vec<String>,
    failures: HashMap<String, ApiError>,
    stalled: HashSet<String>,
}

/// In-memory Harbor
#[derive(Clone, Default)]
pub struct FakeHarbor {
    state: Arc<Mutex<HarborState>>,
}

impl std::fmt::Debug for FakeHarbor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeHarbor").finish_non_exhaustive()
    }
}

impl FakeHarbor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory handing this instance to every connection
    pub fn factory(&self) -> ClientFactory {
        let fake = self.clone();
        Arc::new(move |_config: &harbor::HarborConfig| {
            Ok(Arc::new(fake.clone()) as Arc<dyn HarborApi>)
        })
    }

    fn with<T>(&self, f: impl FnOnce(&mut HarborState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Record `operation` and return its injected failure, if any
    async fn call(&self, operation: &str) -> Result<(), ApiError> {
        let (stalled, result) = self.with(|s| {
            s.calls.push(operation.to_string());
            let result = match s.failures.get(operation) {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            };
            (s.stalled.contains(operation), result)
        });
        if stalled {
            std::future::pending::<()>().await;
        }
        result
    }

    /// Make every later call of `operation` never return
    pub fn stall(&self, operation: &str) {
        self.with(|s| s.stalled.insert(operation.to_string()));
    }

    /// Make every later call of `operation` fail with `error`
    pub fn fail(&self, operation: &str, error: ApiError) {
        self.with(|s| s.failures.insert(operation.to_string(), error));
    }

    pub fn heal(&self, operation: &str) {
        self.with(|s| s.failures.remove(operation));
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    pub fn count(&self, operation: &str) -> usize {
        self.with(|s| s.calls.iter().filter(|c| c.as_str() == operation).count())
    }

    /// Calls that change Harbor
    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                ["create_", "update_", "set_", "delete_"]
                    .iter()
                    .any(|prefix| c.starts_with(prefix))
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.with(|s| s.calls.clear());
    }

    fn next_id(state: &mut HarborState) -> i64 {
        state.next_id += 1;
        state.next_id
    }

    // Out-of-band manipulation, as an operator using the Harbor UI would

    pub fn seed_robot(&self, full_name: &str, level: &str) -> i64 {
        self.with(|s| {
            let id = Self::next_id(s);
            s.robots.insert(
                id,
                Robot {
                    id,
                    name: full_name.to_string(),
                    level: Some(level.to_string()),
                    duration: Some(-1),
                    disable: Some(false),
                    ..Robot::default()
                },
            );
            id
        })
    }

    pub fn robot(&self, id: i64) -> Option<Robot> {
        self.with(|s| s.robots.get(&id).cloned())
    }

    pub fn find_robot_id(&self, full_name: &str) -> Option<i64> {
        self.with(|s| s.robots.values().find(|r| r.name == full_name).map(|r| r.id))
    }

    pub fn robot_count(&self) -> usize {
        self.with(|s| s.robots.len())
    }

    pub fn edit_robot(&self, id: i64, edit: impl FnOnce(&mut Robot)) {
        self.with(|s| s.robots.get_mut(&id).map(edit));
    }

    pub fn remove_robot(&self, id: i64) {
        self.with(|s| s.robots.remove(&id));
    }

    pub fn seed_user(&self, username: &str, email: &str, realname: &str) -> i64 {
        self.with(|s| {
            let id = Self::next_id(s);
            s.users.insert(
                id,
                UserRecord {
                    user_id: id,
                    username: username.to_string(),
                    email: Some(email.to_string()),
                    realname: Some(realname.to_string()),
                    comment: None,
                    sysadmin_flag: Some(false),
                    creation_time: None,
                },
            );
            id
        })
    }

    pub fn user(&self, id: i64) -> Option<UserRecord> {
        self.with(|s| s.users.get(&id).cloned())
    }

    pub fn user_named(&self, username: &str) -> Option<UserRecord> {
        self.with(|s| s.users.values().find(|u| u.username == username).cloned())
    }

    pub fn user_password(&self, id: i64) -> Option<String> {
        self.with(|s| s.user_passwords.get(&id).cloned())
    }

    pub fn user_count(&self) -> usize {
        self.with(|s| s.users.len())
    }

    pub fn edit_user(&self, id: i64, edit: impl FnOnce(&mut UserRecord)) {
        self.with(|s| s.users.get_mut(&id).map(edit));
    }

    pub fn remove_user(&self, id: i64) {
        self.with(|s| s.users.remove(&id));
    }

    pub fn project_named(&self, name: &str) -> Option<ProjectRecord> {
        self.with(|s| s.projects.values().find(|p| p.name == name).cloned())
    }

    pub fn storage_limit(&self, id: i64) -> Option<i64> {
        self.with(|s| s.storage_limits.get(&id).copied())
    }
}

#[async_trait]
impl HarborApi for FakeHarbor {
    async fn create_robot(&self, robot: &RobotCreate) -> Result<RobotCreated, ApiError> {
        self.call("create_robot").await?;
        let full_name = if robot.level == "project" {
            let project = robot
                .permissions
                .first()
                .map(|p| p.namespace.clone())
                .unwrap_or_default();
            format!("robot${project}+{}", robot.name)
        } else {
            format!("robot${}", robot.name)
        };
        self.with(|s| {
            if s.robots.values().any(|r| r.name == full_name) {
                return Err(ApiError::Conflict(format!("robot {full_name} exists")));
            }
            let id = Self::next_id(s);
            let secret = format!("robot-secret-{id}");
            s.robots.insert(
                id,
                Robot {
                    id,
                    name: full_name.clone(),
                    description: robot.description.clone(),
                    level: Some(robot.level.clone()),
                    duration: Some(robot.duration),
                    disable: Some(robot.disable),
                    expires_at: None,
                    creation_time: Some("2024-01-01T00:00:00Z".to_string()),
                    permissions: robot.permissions.clone(),
                },
            );
            s.robot_secrets.insert(id, secret.clone());
            Ok(RobotCreated {
                id,
                name: full_name.clone(),
                secret,
                creation_time: Some("2024-01-01T00:00:00Z".to_string()),
                expires_at: None,
            })
        })
    }

    async fn get_robot(&self, id: i64) -> Result<Robot, ApiError> {
        self.call("get_robot").await?;
        self.robot(id).ok_or(ApiError::NotFound)
    }

    async fn find_robot(&self, name: &str) -> Result<Option<Robot>, ApiError> {
        self.call("find_robot").await?;
        Ok(self.with(|s| s.robots.values().find(|r| r.name == name).cloned()))
    }

    async fn delete_robot(&self, id: i64) -> Result<(), ApiError> {
        self.call("delete_robot").await?;
        self.with(|s| s.robots.remove(&id))
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }

    async fn create_user(&self, user: &UserCreate) -> Result<i64, ApiError> {
        self.call("create_user").await?;
        self.with(|s| {
            if s.users.values().any(|u| u.username == user.username) {
                return Err(ApiError::Conflict(format!("user {} exists", user.username)));
            }
            let id = Self::next_id(s);
            s.users.insert(
                id,
                UserRecord {
                    user_id: id,
                    username: user.username.clone(),
                    email: Some(user.email.clone()),
                    realname: Some(user.realname.clone()),
                    comment: user.comment.clone(),
                    sysadmin_flag: Some(false),
                    creation_time: None,
                },
            );
            s.user_passwords.insert(id, user.password.clone());
            Ok(id)
        })
    }

    async fn get_user(&self, id: i64) -> Result<UserRecord, ApiError> {
        self.call("get_user").await?;
        self.user(id).ok_or(ApiError::NotFound)
    }

    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, ApiError> {
        self.call("find_user").await?;
        Ok(self.user_named(username))
    }

    async fn update_user_profile(
        &self,
        id: i64,
        profile: &UserProfileUpdate,
    ) -> Result<(), ApiError> {
        self.call("update_user_profile").await?;
        self.with(|s| {
            let user = s.users.get_mut(&id).ok_or(ApiError::NotFound)?;
            user.email = Some(profile.email.clone());
            user.realname = Some(profile.realname.clone());
            user.comment = Some(profile.comment.clone()).filter(|c| !c.is_empty());
            Ok(())
        })
    }

    async fn set_user_sysadmin(&self, id: i64, sysadmin: bool) -> Result<(), ApiError> {
        self.call("set_user_sysadmin").await?;
        self.with(|s| {
            let user = s.users.get_mut(&id).ok_or(ApiError::NotFound)?;
            user.sysadmin_flag = Some(sysadmin);
            Ok(())
        })
    }

    async fn delete_user(&self, id: i64) -> Result<(), ApiError> {
        self.call("delete_user").await?;
        self.with(|s| s.users.remove(&id))
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }

    async fn create_project(&self, project: &ProjectRequest) -> Result<i64, ApiError> {
        self.call("create_project").await?;
        let name = project.project_name.clone().unwrap_or_default();
        self.with(|s| {
            if s.projects.values().any(|p| p.name == name) {
                return Err(ApiError::Conflict(format!("project {name} exists")));
            }
            let id = Self::next_id(s);
            let mut metadata = project.metadata.clone();
            if let Some(public) = project.public {
                metadata.insert("public".to_string(), public.to_string());
            }
            s.projects.insert(
                id,
                ProjectRecord {
                    project_id: id,
                    name,
                    registry_id: project.registry_id,
                    repo_count: Some(0),
                    creation_time: None,
                    metadata,
                    cve_allowlist: project.cve_allowlist.clone(),
                },
            );
            s.storage_limits
                .insert(id, project.storage_limit.unwrap_or(-1));
            Ok(id)
        })
    }

    async fn get_project(&self, id: i64) -> Result<ProjectRecord, ApiError> {
        self.call("get_project").await?;
        self.with(|s| s.projects.get(&id).cloned())
            .ok_or(ApiError::NotFound)
    }

    async fn find_project(&self, name: &str) -> Result<Option<ProjectRecord>, ApiError> {
        self.call("find_project").await?;
        Ok(self.project_named(name))
    }

    async fn update_project(&self, id: i64, project: &ProjectRequest) -> Result<(), ApiError> {
        self.call("update_project").await?;
        self.with(|s| {
            let stored = s.projects.get_mut(&id).ok_or(ApiError::NotFound)?;
            stored.metadata.extend(project.metadata.clone());
            if let Some(public) = project.public {
                stored
                    .metadata
                    .insert("public".to_string(), public.to_string());
            }
            if let Some(allowlist) = &project.cve_allowlist {
                stored.cve_allowlist = Some(allowlist.clone());
            }
            Ok(())
        })
    }

    async fn get_project_storage_limit(&self, id: i64) -> Result<Option<i64>, ApiError> {
        self.call("get_project_storage_limit").await?;
        Ok(self.storage_limit(id))
    }

    async fn set_project_storage_limit(&self, id: i64, limit: i64) -> Result<(), ApiError> {
        self.call("set_project_storage_limit").await?;
        self.with(|s| {
            if !s.projects.contains_key(&id) {
                return Err(ApiError::NotFound);
            }
            s.storage_limits.insert(id, limit);
            Ok(())
        })
    }

    async fn delete_project(&self, id: i64) -> Result<(), ApiError> {
        self.call("delete_project").await?;
        self.with(|s| {
            s.storage_limits.remove(&id);
            s.projects.remove(&id)
        })
        .map(|_| ())
        .ok_or(ApiError::NotFound)
    }

    async fn create_scanner(&self, scanner: &ScannerRequest) -> Result<String, ApiError> {
        self.call("create_scanner").await?;
        self.with(|s| {
            if s.scanners.values().any(|r| r.name == scanner.name) {
                return Err(ApiError::Conflict(format!("scanner {} exists", scanner.name)));
            }
            let uuid = uuid::Uuid::new_v4().to_string();
            s.scanners.insert(
                uuid.clone(),
                ScannerRecord {
                    uuid: uuid.clone(),
                    name: scanner.name.clone(),
                    url: scanner.url.clone(),
                    description: scanner.description.clone(),
                    auth: scanner.auth.clone(),
                    ..ScannerRecord::default()
                },
            );
            Ok(uuid)
        })
    }

    async fn get_scanner(&self, uuid: &str) -> Result<ScannerRecord, ApiError> {
        self.call("get_scanner").await?;
        self.with(|s| s.scanners.get(uuid).cloned())
            .ok_or(ApiError::NotFound)
    }

    async fn find_scanner(&self, name: &str) -> Result<Option<ScannerRecord>, ApiError> {
        self.call("find_scanner").await?;
        Ok(self.with(|s| s.scanners.values().find(|r| r.name == name).cloned()))
    }

    async fn update_scanner(&self, uuid: &str, scanner: &ScannerRequest) -> Result<(), ApiError> {
        self.call("update_scanner").await?;
        self.with(|s| {
            let stored = s.scanners.get_mut(uuid).ok_or(ApiError::NotFound)?;
            stored.name = scanner.name.clone();
            stored.url = scanner.url.clone();
            stored.description = scanner.description.clone();
            stored.auth = scanner.auth.clone();
            Ok(())
        })
    }

    async fn delete_scanner(&self, uuid: &str) -> Result<(), ApiError> {
        self.call("delete_scanner").await?;
        self.with(|s| s.scanners.remove(uuid))
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }
}

// ============================================================================
// In-process environment
// ============================================================================

/// Concrete in-process stores plus the registry built on them
pub struct Env {
    pub cluster: Arc<MemoryCluster>,
    pub robots: Arc<MemoryRecords<RobotAccount>>,
    pub users: Arc<MemoryRecords<User>>,
    pub projects: Arc<MemoryRecords<Project>>,
    pub scanners: Arc<MemoryRecords<ScannerRegistration>>,
    pub composites: Arc<MemoryRecords<UserWithGeneratedPassword>>,
    pub provider_configs: Arc<MemoryRecords<ProviderConfig>>,
    pub usages: Arc<MemoryRecords<ProviderConfigUsage>>,
    pub secrets: Arc<MemorySecrets>,
    pub harbor: FakeHarbor,
    pub registry: Registry,
}

impl Env {
    /// Environment with the `default` ProviderConfig and its secret in place
    pub async fn new() -> Self {
        let env = Self::bare();
        env.add_provider_config("default").await;
        env
    }

    /// Environment without any ProviderConfig
    pub fn bare() -> Self {
        let cluster = MemoryCluster::new();
        let robots = MemoryRecords::<RobotAccount>::new(&cluster);
        let users = MemoryRecords::<User>::new(&cluster);
        let projects = MemoryRecords::<Project>::new(&cluster);
        let scanners = MemoryRecords::<ScannerRegistration>::new(&cluster);
        let composites = MemoryRecords::<UserWithGeneratedPassword>::new(&cluster);
        let provider_configs = MemoryRecords::<ProviderConfig>::new(&cluster);
        let usages = MemoryRecords::<ProviderConfigUsage>::new(&cluster);
        let secrets = Arc::new(MemorySecrets::new(&cluster));
        let stores = Stores {
            robots: Arc::clone(&robots) as Arc<dyn RecordStore<RobotAccount>>,
            users: Arc::clone(&users) as Arc<dyn RecordStore<User>>,
            projects: Arc::clone(&projects) as Arc<dyn RecordStore<Project>>,
            scanners: Arc::clone(&scanners) as Arc<dyn RecordStore<ScannerRegistration>>,
            composites: Arc::clone(&composites)
                as Arc<dyn RecordStore<UserWithGeneratedPassword>>,
            provider_configs: Arc::clone(&provider_configs)
                as Arc<dyn RecordStore<ProviderConfig>>,
            usages: Arc::clone(&usages) as Arc<dyn RecordStore<ProviderConfigUsage>>,
            secrets: Arc::clone(&secrets) as Arc<dyn SecretStore>,
        };
        let harbor = FakeHarbor::new();
        let registry = setup::registry(&stores, &test_config(), &harbor.factory());
        Self {
            cluster,
            robots,
            users,
            projects,
            scanners,
            composites,
            provider_configs,
            usages,
            secrets,
            harbor,
            registry,
        }
    }

    pub async fn add_provider_config(&self, name: &str) {
        let secret_name = format!("{name}-harbor-credentials");
        self.secrets
            .apply(&credentials_secret(&secret_name, HARBOR_URL))
            .await
            .unwrap();
        self.provider_configs
            .create(&provider_config(name, &secret_name))
            .await
            .unwrap();
    }

    /// Run one attempt of `kind`/`key`
    pub async fn reconcile(
        &self,
        kind: &str,
        key: &ObjectKey,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.reconcile_with(
            kind,
            key,
            AttemptContext::new(TriggerSource::Change, Duration::from_secs(30)),
        )
        .await
    }

    pub async fn reconcile_with(
        &self,
        kind: &str,
        key: &ObjectKey,
        attempt: AttemptContext,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let controller = self.registry.get(kind).unwrap();
        controller.reconcile(key, attempt).await
    }

    /// Reconcile until an attempt requeues at the poll interval or finishes
    pub async fn converge(&self, kind: &str, key: &ObjectKey) -> ReconcileOutcome {
        for _ in 0..10 {
            let outcome = self.reconcile(kind, key).await.unwrap();
            if outcome != ReconcileOutcome::RequeueAfter(test_config().post_write_requeue()) {
                return outcome;
            }
        }
        panic!("{kind} {key} did not converge");
    }

    pub fn secret_value(&self, namespace: &str, name: &str, key: &str) -> Option<String> {
        let secret = self.cluster.secret(namespace, name)?;
        let value = secret.data?.get(key)?.0.clone();
        String::from_utf8(value).ok()
    }
}

pub fn test_config() -> ControllerConfig {
    ControllerConfig {
        poll_interval_secs: 600,
        post_write_requeue_ms: 1000,
        ..ControllerConfig::default()
    }
}

// ============================================================================
// Record builders
// ============================================================================

pub fn credentials_secret(name: &str, url: &str) -> Secret {
    let mut secret = Secret::default();
    secret.metadata.name = Some(name.to_string());
    secret.metadata.namespace = Some("crossplane-system".to_string());
    let document = serde_json::json!({
        "url": url,
        "username": "admin",
        "password": "Harbor12345",
    });
    secret.data = Some(BTreeMap::from([(
        "credentials".to_string(),
        ByteString(document.to_string().into_bytes()),
    )]));
    secret
}

pub fn provider_config(name: &str, secret_name: &str) -> ProviderConfig {
    ProviderConfig::new(
        name,
        ProviderConfigSpec {
            credentials: ProviderCredentials {
                source: CredentialsSource::Secret,
                secret_ref: Some(CredentialsSecretRef {
                    name: secret_name.to_string(),
                    namespace: "crossplane-system".to_string(),
                    key: "credentials".to_string(),
                }),
            },
        },
    )
}

pub fn resource_spec(connection_secret: Option<&str>) -> ResourceSpec {
    ResourceSpec {
        write_connection_secret_to_ref: connection_secret.map(|name| SecretReference {
            name: name.to_string(),
            namespace: None,
        }),
        ..ResourceSpec::default()
    }
}

pub fn robot(name: &str) -> RobotAccount {
    let mut robot = RobotAccount::new(
        name,
        RobotAccountSpec {
            resource: resource_spec(Some(&format!("{name}-creds"))),
            for_provider: RobotAccountParameters {
                name: name.to_string(),
                description: Some("CI pusher".to_string()),
                level: "system".to_string(),
                duration: Some(-1),
                disable: Some(false),
                permissions: vec![RobotPermission {
                    kind: "project".to_string(),
                    namespace: "library".to_string(),
                    access: vec![RobotAccess {
                        resource: "repository".to_string(),
                        action: "push".to_string(),
                    }],
                }],
            },
        },
    );
    robot.metadata.namespace = Some(NAMESPACE.to_string());
    robot
}

pub fn profile(username: &str) -> UserProfile {
    UserProfile {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        full_name: format!("{username} Example"),
        comment: None,
        admin: None,
    }
}

pub fn user(name: &str, password_secret: &str) -> User {
    let mut user = User::new(
        name,
        UserSpec {
            resource: resource_spec(None),
            for_provider: UserParameters {
                profile: profile(name),
                password_secret_ref: Some(SecretKeySelector {
                    name: password_secret.to_string(),
                    namespace: None,
                    key: "password".to_string(),
                }),
            },
        },
    );
    user.metadata.namespace = Some(NAMESPACE.to_string());
    user
}

pub fn password_secret(name: &str, password: &str) -> Secret {
    let mut secret = Secret::default();
    secret.metadata.name = Some(name.to_string());
    secret.metadata.namespace = Some(NAMESPACE.to_string());
    secret.data = Some(BTreeMap::from([(
        "password".to_string(),
        ByteString(password.as_bytes().to_vec()),
    )]));
    secret
}

pub fn project(name: &str) -> Project {
    let mut project = Project::new(
        name,
        ProjectSpec {
            resource: resource_spec(None),
            for_provider: ProjectParameters {
                name: name.to_string(),
                public: Some(false),
                auto_scan_images: Some(true),
                storage_limit: Some(1024),
                ..ProjectParameters::default()
            },
        },
    );
    project.metadata.namespace = Some(NAMESPACE.to_string());
    project
}

pub fn composite(name: &str, secret_name: &str) -> UserWithGeneratedPassword {
    let mut record = UserWithGeneratedPassword::new(
        name,
        UserWithGeneratedPasswordSpec {
            resource: resource_spec(None),
            for_provider: UserWithGeneratedPasswordParameters {
                profile: profile(name),
                generate_password_in_secret: Some(GeneratePasswordConfig {
                    name: secret_name.to_string(),
                    namespace: None,
                    key: None,
                    length: Some(24),
                }),
            },
        },
    );
    record.metadata.namespace = Some(NAMESPACE.to_string());
    record
}

pub fn orphaned(mut spec: ResourceSpec) -> ResourceSpec {
    spec.deletion_policy = DeletionPolicy::Orphan;
    spec
}

pub fn key(name: &str) -> ObjectKey {
    ObjectKey::namespaced(NAMESPACE, name)
}

/// Condition `type` of a stored record
pub fn condition<R: Managed>(record: &R, r#type: &str) -> Option<Condition> {
    record.managed_status()?.condition(r#type).cloned()
}
