//! # CRD Validation Tests
//!
//! Tests for every CRD to catch schema drift early. These tests validate
//! that sample manifests deserialize with the expected defaults and that the
//! generated definitions carry the right group, versions and scope.

use harbor_provider::crd::{
    CredentialsSource, DeletionPolicy, Project, ProviderConfig, ProviderConfigUsage, RobotAccount,
    ScannerRegistration, User, UserWithGeneratedPassword,
};
use kube::CustomResourceExt;

/// Robot account with every field set
#[test]
fn test_robot_account_full() {
    let yaml = r#"
apiVersion: harbor.crossplane.io/v1alpha1
kind: RobotAccount
metadata:
  name: ci-pusher
  namespace: ci
  annotations:
    crossplane.io/external-name: robots/12
spec:
  providerConfigRef:
    name: production
  deletionPolicy: Orphan
  writeConnectionSecretToRef:
    name: ci-pusher-creds
  forProvider:
    name: ci-pusher
    description: Pushes images from CI
    level: project
    duration: 30
    disable: false
    permissions:
      - kind: project
        namespace: payments
        access:
          - resource: repository
            action: push
          - resource: repository
            action: pull
"#;

    let robot: RobotAccount =
        serde_yaml::from_str(yaml).expect("Should deserialize robot account with all fields");
    assert_eq!(robot.spec.resource.provider_config_ref.name, "production");
    assert_eq!(robot.spec.resource.deletion_policy, DeletionPolicy::Orphan);
    assert_eq!(
        robot
            .spec
            .resource
            .write_connection_secret_to_ref
            .as_ref()
            .map(|r| r.name.as_str()),
        Some("ci-pusher-creds")
    );
    let params = &robot.spec.for_provider;
    assert_eq!(params.level, "project");
    assert_eq!(params.duration, Some(30));
    assert_eq!(params.permissions.len(), 1);
    assert_eq!(params.permissions[0].access.len(), 2);
}

/// Omitted fields fall back to the provider defaults
#[test]
fn test_robot_account_defaults() {
    let yaml = r#"
apiVersion: harbor.crossplane.io/v1alpha1
kind: RobotAccount
metadata:
  name: minimal
  namespace: ci
spec:
  forProvider:
    name: minimal
"#;

    let robot: RobotAccount = serde_yaml::from_str(yaml).expect("Should deserialize minimal robot");
    assert_eq!(robot.spec.resource.provider_config_ref.name, "default");
    assert_eq!(robot.spec.resource.deletion_policy, DeletionPolicy::Delete);
    assert!(robot.spec.resource.write_connection_secret_to_ref.is_none());
    assert_eq!(robot.spec.for_provider.level, "system");
    assert!(robot.spec.for_provider.permissions.is_empty());
    assert!(robot.status.is_none());
}

#[test]
fn test_user_profile_is_flattened() {
    let yaml = r#"
apiVersion: harbor.crossplane.io/v1alpha1
kind: User
metadata:
  name: alice
  namespace: team-a
spec:
  forProvider:
    username: alice
    email: alice@example.com
    fullName: Alice Example
    admin: true
    passwordSecretRef:
      name: alice-password
      key: password
"#;

    let user: User = serde_yaml::from_str(yaml).expect("Should deserialize user");
    let profile = &user.spec.for_provider.profile;
    assert_eq!(profile.username, "alice");
    assert_eq!(profile.full_name, "Alice Example");
    assert_eq!(profile.admin, Some(true));
    assert!(profile.comment.is_none());
    let secret_ref = user.spec.for_provider.password_secret_ref.unwrap();
    assert_eq!(secret_ref.name, "alice-password");
    assert!(secret_ref.namespace.is_none());
}

#[test]
fn test_user_with_generated_password() {
    let yaml = r#"
apiVersion: harbor.crossplane.io/v1alpha1
kind: UserWithGeneratedPassword
metadata:
  name: bob
  namespace: team-a
spec:
  forProvider:
    username: bob
    email: bob@example.com
    fullName: Bob Example
    generatePasswordInSecret:
      name: bob-password
      length: 32
"#;

    let composite: UserWithGeneratedPassword =
        serde_yaml::from_str(yaml).expect("Should deserialize composite user");
    let generate = composite
        .spec
        .for_provider
        .generate_password_in_secret
        .unwrap();
    assert_eq!(generate.name, "bob-password");
    assert_eq!(generate.length, Some(32));
    assert!(generate.key.is_none());
}

#[test]
fn test_project_settings() {
    let yaml = r#"
apiVersion: harbor.crossplane.io/v1alpha1
kind: Project
metadata:
  name: payments
  namespace: team-a
spec:
  forProvider:
    name: payments
    public: false
    autoScanImages: true
    preventVulnerableImages: true
    severity: high
    cveAllowlist:
      - CVE-2021-44228
    storageLimit: 10737418240
"#;

    let project: Project = serde_yaml::from_str(yaml).expect("Should deserialize project");
    let params = &project.spec.for_provider;
    assert_eq!(params.public, Some(false));
    assert_eq!(params.auto_scan_images, Some(true));
    assert_eq!(params.severity.as_deref(), Some("high"));
    assert_eq!(params.storage_limit, Some(10_737_418_240));
    assert_eq!(
        params.cve_allowlist.as_deref(),
        Some(&["CVE-2021-44228".to_string()][..])
    );
    assert!(params.enable_content_trust.is_none());
}

#[test]
fn test_scanner_registration() {
    let yaml = r#"
apiVersion: harbor.crossplane.io/v1alpha1
kind: ScannerRegistration
metadata:
  name: trivy
  namespace: harbor-system
spec:
  forProvider:
    name: trivy
    url: http://trivy.harbor-system:8080
    auth: Bearer
    accessCredential: token
"#;

    let scanner: ScannerRegistration =
        serde_yaml::from_str(yaml).expect("Should deserialize scanner registration");
    assert_eq!(scanner.spec.for_provider.url, "http://trivy.harbor-system:8080");
    assert_eq!(scanner.spec.for_provider.auth.as_deref(), Some("Bearer"));
}

#[test]
fn test_provider_config() {
    let yaml = r#"
apiVersion: harbor.crossplane.io/v1beta1
kind: ProviderConfig
metadata:
  name: default
spec:
  credentials:
    source: Secret
    secretRef:
      name: harbor-credentials
      namespace: crossplane-system
      key: credentials
"#;

    let config: ProviderConfig =
        serde_yaml::from_str(yaml).expect("Should deserialize provider config");
    assert_eq!(config.spec.credentials.source, CredentialsSource::Secret);
    let secret_ref = config.spec.credentials.secret_ref.unwrap();
    assert_eq!(secret_ref.namespace, "crossplane-system");
    assert_eq!(secret_ref.key, "credentials");
}

#[test]
fn test_unknown_deletion_policy_is_rejected() {
    let yaml = r#"
apiVersion: harbor.crossplane.io/v1alpha1
kind: User
metadata:
  name: alice
spec:
  deletionPolicy: Keep
  forProvider:
    username: alice
    email: alice@example.com
    fullName: Alice
"#;

    assert!(serde_yaml::from_str::<User>(yaml).is_err());
}

#[test]
fn test_generated_crds_scope_and_versions() {
    for (crd, version, scope) in [
        (RobotAccount::crd(), "v1alpha1", "Namespaced"),
        (User::crd(), "v1alpha1", "Namespaced"),
        (UserWithGeneratedPassword::crd(), "v1alpha1", "Namespaced"),
        (Project::crd(), "v1alpha1", "Namespaced"),
        (ScannerRegistration::crd(), "v1alpha1", "Namespaced"),
        (ProviderConfig::crd(), "v1beta1", "Cluster"),
        (ProviderConfigUsage::crd(), "v1beta1", "Cluster"),
    ] {
        let name = crd.metadata.name.clone().unwrap_or_default();
        assert_eq!(crd.spec.group, "harbor.crossplane.io", "{name}");
        assert_eq!(crd.spec.scope, scope, "{name}");
        assert_eq!(crd.spec.versions.len(), 1, "{name}");
        assert_eq!(crd.spec.versions[0].name, version, "{name}");
        assert!(
            crd.spec.versions[0]
                .subresources
                .as_ref()
                .and_then(|s| s.status.as_ref())
                .is_some()
                || name.starts_with("providerconfigusages"),
            "{name} should expose a status subresource"
        );
    }
}
