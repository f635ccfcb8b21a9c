//! Backend collaborator seam
//!
//! The hosted backend-as-a-service is opaque to this crate. It is consumed
//! through two traits:
//!
//! - [`AuthBackend`] - current session, token refresh, provider user metadata
//! - [`RoleTable`] - the per-user role table
//!
//! [`RestBackend`] implements both against a GoTrue/PostgREST style HTTP API.

pub mod errors;
pub mod rest;
pub mod traits;

pub use errors::BackendError;
pub use rest::RestBackend;
pub use traits::{AuthBackend, Backend, RoleTable};
