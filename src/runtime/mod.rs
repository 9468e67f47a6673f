//! # Runtime
//!
//! The driver and what it is built from.
//!
//! - `registry`: explicit kind → controller mapping
//! - `watch_loop`: per-kind change streams with restart handling
//! - `error_policy`: backoff after failed attempts, watch error classification
//! - `rate_limit`: global attempt-start token bucket
//! - `driver`: per-record serialization, concurrency limit, requeues

pub mod driver;
pub mod error_policy;
pub mod rate_limit;
pub mod registry;
pub mod watch_loop;

pub use driver::{Driver, DriverSettings, Trigger};
pub use registry::{Fingerprint, KindController, Observed, Registry};
