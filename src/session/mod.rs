//! Session Management Module
//!
//! # Modules
//!
//! - [`cache`] - In-memory session and role cache with durable backup and recovery
//! - [`validation`] - Pure session validity predicates

pub mod cache;
pub mod validation;

// Re-export commonly used items for convenience
pub use cache::{SessionCache, SessionCacheConfig};
pub use validation::{is_session_valid, is_session_valid_at, DEFAULT_EXPIRY_MARGIN_SECS};
