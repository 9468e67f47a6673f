//! Harbor Provider Library
//!
//! Reconciles Harbor registry objects from declarative Kubernetes records.
//! Tests are included in the module files and under `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use harbor_provider::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod harbor;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod server;
pub mod store;
