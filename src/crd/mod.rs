//! # Custom Resource Definitions
//!
//! Record kinds served by the provider.
//!
//! - `ProviderConfig` / `ProviderConfigUsage` - Harbor credentials and who uses them
//! - `RobotAccount`, `User`, `Project`, `ScannerRegistration` - managed Harbor objects
//! - `UserWithGeneratedPassword` - composite: generated password secret, then a `User`

mod common;
mod managed;
mod project;
mod provider_config;
mod robot_account;
mod scanner;
mod status;
mod user;

pub use common::*;
pub use managed::Managed;
pub use project::*;
pub use provider_config::*;
pub use robot_account::*;
pub use scanner::*;
pub use status::*;
pub use user::*;
