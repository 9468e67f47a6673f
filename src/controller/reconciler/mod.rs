//! # Reconciler
//!
//! Per-kind reconciliation entry points driven by the runtime.
//!
//! - `managed`: the Observe → Create/Update/Delete flow shared by every
//!   managed kind
//! - `provider_config`: usage counting and deletion protection for
//!   ProviderConfigs
//! - `types`: values passed between the driver and the reconcilers

pub mod managed;
pub mod provider_config;
pub mod types;

pub use managed::ManagedReconciler;
pub use provider_config::ProviderConfigReconciler;
pub use types::{AttemptContext, ReconcileOutcome, TriggerSource};
