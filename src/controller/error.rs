//! # Reconcile Errors
//!
//! Every component error bubbles up as a [`ReconcileError`]. The driver
//! records its [`reason`](ReconcileError::reason) on the `Synced` condition
//! and decides between backoff and a plain poll requeue with
//! [`is_permanent`](ReconcileError::is_permanent).

use crate::harbor::ApiError;
use crate::store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// `Synced` reason of an update Harbor cannot apply
pub const REASON_NOT_SUPPORTED: &str = "NotSupported";

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("cannot resolve credentials: {0}")]
    CredentialResolution(String),

    #[error("cannot construct Harbor client: {0}")]
    ClientConstruction(String),

    #[error("cannot observe external resource: {0}")]
    Observe(#[source] ApiError),

    #[error("cannot create external resource: {0}")]
    Create(#[source] ApiError),

    #[error("cannot update external resource: {0}")]
    Update(#[source] ApiError),

    #[error("cannot delete external resource: {0}")]
    Delete(#[source] ApiError),

    /// The operation cannot be applied to this kind; needs operator action
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// The external-name annotation is malformed or would be rebound
    #[error("invalid external name '{value}': {reason}")]
    Correlation { value: String, reason: String },

    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot publish connection details: {0}")]
    Publish(String),

    #[error("reconciliation attempt exceeded {0:?}")]
    Timeout(Duration),

    #[error("reconciliation attempt cancelled")]
    Cancelled,
}

impl ReconcileError {
    /// Reason string written to the `Synced` condition and used as a metric label
    pub fn reason(&self) -> &'static str {
        match self {
            Self::CredentialResolution(_) => "CredentialResolutionError",
            Self::ClientConstruction(_) => "ClientConstructionError",
            Self::Observe(_) => "ObserveError",
            Self::Create(_) => "CreateError",
            Self::Update(_) => "UpdateError",
            Self::Delete(_) => "DeleteError",
            Self::NotSupported(_) => REASON_NOT_SUPPORTED,
            Self::Correlation { .. } => "CorrelationError",
            Self::InvalidSpec(_) => "InvalidSpec",
            Self::Store(_) => "StoreError",
            Self::Publish(_) => "PublishError",
            Self::Timeout(_) => "Timeout",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Retrying with the same input cannot succeed
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::NotSupported(_) | Self::Correlation { .. } | Self::InvalidSpec(_)
        )
    }

    pub fn correlation(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Correlation {
            value: value.into(),
            reason: reason.into(),
        }
    }
}
