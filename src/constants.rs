//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group for every record kind served by this provider
pub const API_GROUP: &str = "harbor.crossplane.io";

/// Annotation holding the Harbor-side identity of a managed record
pub const EXTERNAL_NAME_ANNOTATION: &str = "crossplane.io/external-name";

/// Finalizer held on managed records until the external object is handled
pub const MANAGED_FINALIZER: &str = "finalizer.managedresource.crossplane.io";

/// Finalizer held on ProviderConfigs while usages reference them
pub const PROVIDER_CONFIG_FINALIZER: &str = "in-use.harbor.crossplane.io";

/// Field manager used for server-side patches
pub const FIELD_MANAGER: &str = "harbor-provider";

/// Secret type used for published connection details
pub const CONNECTION_SECRET_TYPE: &str = "connection.crossplane.io/v1alpha1";

/// Name of the ProviderConfig used when a record does not reference one
pub const DEFAULT_PROVIDER_CONFIG_NAME: &str = "default";

/// Namespace used when neither the reference nor the record carries one
pub const DEFAULT_NAMESPACE: &str = "default";

// Generated password secrets

/// Key used for generated passwords when none is configured
pub const DEFAULT_PASSWORD_KEY: &str = "password";

/// Default generated password length
pub const DEFAULT_PASSWORD_LENGTH: usize = 16;

/// Shortest generated password accepted
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Longest generated password accepted
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Characters drawn from when generating passwords
pub const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*";

pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const LABEL_USER: &str = "harbor.crossplane.io/user";
pub const LABEL_GENERATED: &str = "harbor.crossplane.io/generated";
pub const LABEL_SECRET_TYPE: &str = "harbor.crossplane.io/secret-type";
/// `LABEL_SECRET_TYPE` value of generated password secrets
pub const SECRET_TYPE_PASSWORD: &str = "password";

/// Prefix Harbor puts in front of every robot account name
pub const ROBOT_NAME_PREFIX: &str = "robot$";

/// Suffix appended to a composite's name to name its child User record
pub const COMPOSITE_USER_SUFFIX: &str = "-user";

// Scheduling

/// Default poll interval for records that converged (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 600;

/// Default interval between full relists of every kind (seconds)
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 3600;

/// Default maximum number of attempts running at once
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: usize = 10;

/// Default global attempt-start rate (attempts per second)
pub const DEFAULT_MAX_RECONCILE_RATE: u32 = 10;

/// Default overall deadline of one attempt (seconds)
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 60;

/// Default exponential backoff starting value (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 60_000;

/// Default requeue after a successful Create or Update (milliseconds)
pub const DEFAULT_POST_WRITE_REQUEUE_MS: u64 = 1000;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Maximum backoff applied to watch streams on 429 (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_MAX_MS: u64 = 30_000;

/// Default Harbor HTTP request timeout (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Harbor REST API prefix
pub const HARBOR_API_PREFIX: &str = "/api/v2.0";
