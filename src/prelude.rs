//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use harbor_provider::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All record types (ProviderConfig, RobotAccount, User, etc.)
//! - The Harbor client trait and its errors
//! - The external handle contract and the error taxonomy
//! - Stores, the registry and the driver
//! - Config types

pub use crate::crd::*;

pub use crate::harbor::{ApiError, HarborApi, HarborClient, HarborConfig};

pub use crate::controller::error::ReconcileError;
pub use crate::controller::external::{
    ConnectionDetails, ExternalClient, ExternalConnector, ExternalCreation, ExternalObservation,
    ExternalUpdate,
};
pub use crate::controller::reconciler::{AttemptContext, ReconcileOutcome, TriggerSource};
pub use crate::controller::setup::{registry, Stores};

pub use crate::runtime::{Driver, DriverSettings, KindController, Registry};

pub use crate::store::{
    MemoryCluster, ObjectKey, RecordStore, SecretStore, StoreError,
};

pub use crate::config::ControllerConfig;
