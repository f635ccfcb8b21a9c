//! Unified testing utilities for vowsession
//!
//! Available to unit tests and, with the `testing` feature, to integration tests.
//!
//! ## Organization
//!
//! - [`fixtures`] - Pre-built test data (sessions, provider users, settings)
//! - [`mock`] - Scripted backend and failing storage
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vowsession::testing::{mock::MockBackend, TestFixtures};
//!
//! let backend = Arc::new(
//!     MockBackend::new()
//!         .with_session(TestFixtures::session("user-1"))
//!         .with_current_user(TestFixtures::couple_user("user-1")),
//! );
//! let orchestrator = TestFixtures::orchestrator(backend);
//! assert!(orchestrator.is_master());
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::TestFixtures;

/// Common test constants
pub mod constants {
    /// Default test backend URL
    pub const TEST_BACKEND_URL: &str = "http://localhost:54321";

    /// Default test anon key
    pub const TEST_ANON_KEY: &str = "test-anon-key";

    /// Default test display name
    pub const TEST_USER_NAME: &str = "Alex";

    /// Default test partner name
    pub const TEST_PARTNER_NAME: &str = "Sam";

    /// Default test wedding date
    pub const TEST_WEDDING_DATE: &str = "2027-06-12";

    /// Default test vendor business name
    pub const TEST_BUSINESS_NAME: &str = "Petal & Stem Florals";
}
