//! # Controller
//!
//! The reconciliation engine.
//!
//! - `credentials`: ProviderConfig → Harbor connection settings
//! - `connector`: usage tracking plus client construction per attempt
//! - `external` / `handle`: the Observe/Create/Update/Delete contract and its
//!   generic implementation
//! - `drift`: desired vs observed field comparison
//! - `identity`: external-name annotation encoding and binding rules
//! - `kinds`: per-kind Harbor adapters
//! - `composite`: two-phase generated-password orchestration
//! - `publisher`: connection secret publishing
//! - `reconciler`: per-kind reconciliation flows
//! - `setup`: registry wiring
//! - `backoff`, `error`: retry delays and the error taxonomy

pub mod backoff;
pub mod composite;
pub mod connector;
pub mod credentials;
pub mod drift;
pub mod error;
pub mod external;
pub mod handle;
pub mod identity;
pub mod kinds;
pub mod publisher;
pub mod reconciler;
pub mod setup;
