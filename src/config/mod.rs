//! # Configuration
//!
//! Controller configuration loaded from the environment, plus helpers for
//! command-line overrides.

pub mod controller;
pub mod duration;

pub use controller::ControllerConfig;
pub use duration::parse_interval;
