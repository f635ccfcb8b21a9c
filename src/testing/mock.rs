//! Mock objects and fake implementations for testing
//!
//! `MockBackend` is a scripted, in-memory backend that counts every call so
//! tests can assert on traffic as well as outcomes. `FailingStore` rejects
//! every storage operation.

use crate::backend::{AuthBackend, BackendError, RoleTable};
use crate::models::{ProviderUser, Role, RoleRecord, Session};
use crate::storage::{BackupStore, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct CallCounters {
    session: AtomicUsize,
    refresh: AtomicUsize,
    user: AtomicUsize,
    sign_out: AtomicUsize,
    find: AtomicUsize,
    insert: AtomicUsize,
}

/// Scripted backend for unit and integration tests
#[derive(Default)]
pub struct MockBackend {
    session: Mutex<Option<Session>>,
    session_delay: Option<Duration>,
    session_error: bool,
    late_session: Mutex<Option<(usize, Session)>>,
    refreshed_session: Option<Session>,
    current_user: Mutex<Option<ProviderUser>>,
    roles: Mutex<HashMap<String, Role>>,
    role_table_down: bool,
    find_failures: AtomicU32,
    competing_insert: Option<Role>,
    sign_out_error: bool,
    calls: CallCounters,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockBackend {
    /// Backend with no session, no current user and an empty role table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Session scripting =====

    /// Session returned by `get_session`
    #[must_use]
    pub fn with_session(self, session: Session) -> Self {
        *lock(&self.session) = Some(session);
        self
    }

    /// Session that `get_session` starts reporting from its `call`-th call (1-based)
    #[must_use]
    pub fn with_session_from_call(self, call: usize, session: Session) -> Self {
        *lock(&self.late_session) = Some((call, session));
        self
    }

    /// Delay every `get_session` call
    #[must_use]
    pub const fn with_session_delay(mut self, delay: Duration) -> Self {
        self.session_delay = Some(delay);
        self
    }

    /// Make `get_session` fail with a network error
    #[must_use]
    pub const fn with_session_error(mut self) -> Self {
        self.session_error = true;
        self
    }

    /// Session minted by `refresh_session`; without one refresh is rejected
    #[must_use]
    pub fn with_refresh(mut self, session: Session) -> Self {
        self.refreshed_session = Some(session);
        self
    }

    /// Provider user returned by `get_current_user`
    #[must_use]
    pub fn with_current_user(self, user: ProviderUser) -> Self {
        *lock(&self.current_user) = Some(user);
        self
    }

    /// Make `sign_out` fail with a network error
    #[must_use]
    pub const fn with_sign_out_error(mut self) -> Self {
        self.sign_out_error = true;
        self
    }

    /// Replace the session held by the backend
    pub fn set_session(&self, session: Option<Session>) {
        *lock(&self.session) = session;
    }

    // ===== Role table scripting =====

    /// Pre-existing role row
    #[must_use]
    pub fn with_role(self, user_id: &str, role: Role) -> Self {
        lock(&self.roles).insert(user_id.to_string(), role);
        self
    }

    /// Every role table call fails with a network error
    #[must_use]
    pub const fn with_role_table_down(mut self) -> Self {
        self.role_table_down = true;
        self
    }

    /// The next `count` role lookups fail with a 503
    #[must_use]
    pub fn with_find_failures(self, count: u32) -> Self {
        self.find_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Another client inserts `role` just before our insert lands
    #[must_use]
    pub const fn with_competing_insert(mut self, role: Role) -> Self {
        self.competing_insert = Some(role);
        self
    }

    /// Role row currently stored for `user_id`
    #[must_use]
    pub fn stored_role(&self, user_id: &str) -> Option<Role> {
        lock(&self.roles).get(user_id).copied()
    }

    // ===== Call counters =====

    #[must_use]
    pub fn session_calls(&self) -> usize {
        self.calls.session.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.calls.refresh.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn user_calls(&self) -> usize {
        self.calls.user.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn sign_out_calls(&self) -> usize {
        self.calls.sign_out.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn find_calls(&self) -> usize {
        self.calls.find.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn insert_calls(&self) -> usize {
        self.calls.insert.load(Ordering::SeqCst)
    }

    fn take_find_failure(&self) -> bool {
        self.find_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl AuthBackend for MockBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let call = self.calls.session.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut late = lock(&self.late_session);
            if late.as_ref().is_some_and(|(from_call, _)| call >= *from_call) {
                if let Some((_, session)) = late.take() {
                    *lock(&self.session) = Some(session);
                }
            }
        }
        if let Some(delay) = self.session_delay {
            tokio::time::sleep(delay).await;
        }
        if self.session_error {
            return Err(BackendError::Network("session endpoint unreachable".to_string()));
        }
        Ok(lock(&self.session).clone())
    }

    async fn refresh_session(&self) -> Result<Session, BackendError> {
        self.calls.refresh.fetch_add(1, Ordering::SeqCst);
        let session = self
            .refreshed_session
            .clone()
            .ok_or_else(|| BackendError::Unauthorized("refresh token rejected".to_string()))?;
        *lock(&self.session) = Some(session.clone());
        Ok(session)
    }

    async fn get_current_user(&self) -> Result<ProviderUser, BackendError> {
        self.calls.user.fetch_add(1, Ordering::SeqCst);
        lock(&self.current_user)
            .clone()
            .ok_or_else(|| BackendError::Unauthorized("no signed-in user".to_string()))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.calls.sign_out.fetch_add(1, Ordering::SeqCst);
        *lock(&self.session) = None;
        if self.sign_out_error {
            return Err(BackendError::Network("logout endpoint unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RoleTable for MockBackend {
    async fn find_role(&self, user_id: &str) -> Result<Option<Role>, BackendError> {
        self.calls.find.fetch_add(1, Ordering::SeqCst);
        if self.role_table_down {
            return Err(BackendError::Network("role table unreachable".to_string()));
        }
        if self.take_find_failure() {
            return Err(BackendError::Server {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(lock(&self.roles).get(user_id).copied())
    }

    async fn insert_role(&self, record: &RoleRecord) -> Result<(), BackendError> {
        self.calls.insert.fetch_add(1, Ordering::SeqCst);
        if self.role_table_down {
            return Err(BackendError::Network("role table unreachable".to_string()));
        }
        let mut roles = lock(&self.roles);
        if let Some(winner) = self.competing_insert {
            roles.entry(record.user_id.clone()).or_insert(winner);
        }
        if roles.contains_key(&record.user_id) {
            return Err(BackendError::Conflict(format!(
                "duplicate key value for user_id {}",
                record.user_id
            )));
        }
        roles.insert(record.user_id.clone(), record.role);
        Ok(())
    }
}

/// Store whose every operation fails, for exercising best-effort paths
pub struct FailingStore;

impl FailingStore {
    fn error(operation: &str) -> StorageError {
        StorageError::Io(io::Error::other(format!("{operation} refused by FailingStore")))
    }
}

impl BackupStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(Self::error("get"))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(Self::error("set"))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(Self::error("remove"))
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Err(Self::error("keys"))
    }
}
