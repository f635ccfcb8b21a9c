#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the vowsession library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod authentication;
pub mod backend;
pub mod models;
pub mod session;
pub mod settings;
pub mod storage;
pub mod utils;

// Testing utilities - available for unit tests and integration tests with the testing feature
#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use authentication::{AuthOrchestrator, RoleResolver, ServiceContainer, SessionServiceFactory};
pub use backend::{Backend, BackendError, RestBackend};
pub use models::{ProviderUser, Role, Session, User};
pub use session::SessionCache;
pub use settings::VowSettings;
pub use storage::{BackupStore, FileStore, MemoryStore};
