//! Backend traits
//!
//! These traits describe the only parts of the hosted backend this crate
//! depends on, enabling consistent interfaces and pluggable implementations
//! (HTTP in production, scripted mocks in tests).

use super::BackendError;
use crate::models::{ProviderUser, Role, RoleRecord, Session};
use async_trait::async_trait;

/// Authentication half of the backend
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Current session held by the backend client, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    /// Mint a new session from the current refresh credential
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - There is no refresh credential
    /// - The refresh credential was rejected
    /// - The backend cannot be reached
    async fn refresh_session(&self) -> Result<Session, BackendError>;

    /// Provider user (id, email and profile metadata) for the current session
    ///
    /// # Errors
    ///
    /// Returns an error if the caller cannot be identified
    async fn get_current_user(&self) -> Result<ProviderUser, BackendError>;

    /// Revoke the current session
    ///
    /// # Errors
    ///
    /// Returns an error if the revocation request fails
    async fn sign_out(&self) -> Result<(), BackendError>;
}

/// Role table keyed by user identifier
#[async_trait]
pub trait RoleTable: Send + Sync {
    /// Look up the role row for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be queried
    async fn find_role(&self, user_id: &str) -> Result<Option<Role>, BackendError>;

    /// Insert a new role row
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Conflict` if a row for the user already exists,
    /// or another error if the insert fails
    async fn insert_role(&self, record: &RoleRecord) -> Result<(), BackendError>;
}

/// Full backend collaborator
pub trait Backend: AuthBackend + RoleTable {}

impl<T: AuthBackend + RoleTable + ?Sized> Backend for T {}
