//! # Harbor Kinds
//!
//! [`ExternalKind`](super::handle::ExternalKind) adapters, one per managed
//! kind backed by a single Harbor object.
//!
//! | Kind | Annotation | Mutable |
//! |------|------------|---------|
//! | RobotAccount | `robots/<id>` | no |
//! | User | `users/<id>` | yes |
//! | Project | `projects/<id>` | yes |
//! | ScannerRegistration | `scanners/<uuid>` | yes |

pub mod project;
pub mod robot_account;
pub mod scanner;
pub mod user;

pub use project::ProjectKind;
pub use robot_account::RobotAccountKind;
pub use scanner::ScannerKind;
pub use user::UserKind;
