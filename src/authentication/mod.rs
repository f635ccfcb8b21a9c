//! Authentication module: role resolution, the orchestrator and its wiring
//!
//! This module provides the role resolver, the `AuthOrchestrator` that
//! materializes users, and the factory and container used to build them
//! from settings.

pub mod dependency_injection;
pub mod factory;
pub mod orchestrator;
pub mod resolver;

pub use dependency_injection::ServiceContainer;
pub use factory::SessionServiceFactory;
pub use orchestrator::{AuthListener, AuthOrchestrator, ListenerId};
pub use resolver::{RetryPolicy, RoleResolution, RoleResolver, RoleSource};
