//! Session Cache - in-memory session and role state with a durable backup
//!
//! The `SessionCache` holds the authoritative in-process copy of the current
//! session and a per-user role map. Every successful cache is mirrored to a
//! [`BackupStore`] so that, after the process is suspended and resumed, the
//! cache can tell a likely-expired login from a likely-recoverable one.
//!
//! Nothing in here fails loudly: backend and storage errors are logged and
//! normalized to `false`/`None`.

use crate::backend::Backend;
use crate::models::{BackupRecord, Role, Session};
use crate::session::validation::is_session_valid_at;
use crate::settings::{SessionSettings, DEFAULT_BACKUP_KEY, DEFAULT_ROLE_KEY_PREFIX};
use crate::storage::BackupStore;
use crate::utils::logging::LoggingHelper;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Tunables of the session cache
#[derive(Debug, Clone)]
pub struct SessionCacheConfig {
    pub expiry_margin: Duration,
    pub backup_max_age: Duration,
    pub backup_key: String,
    pub role_key_prefix: String,
}

impl Default for SessionCacheConfig {
    fn default() -> Self {
        Self {
            expiry_margin: Duration::seconds(60),
            backup_max_age: Duration::hours(24),
            backup_key: DEFAULT_BACKUP_KEY.to_string(),
            role_key_prefix: DEFAULT_ROLE_KEY_PREFIX.to_string(),
        }
    }
}

impl SessionCacheConfig {
    #[must_use]
    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self {
            expiry_margin: clamped_seconds(settings.expiry_margin_secs),
            backup_max_age: clamped_seconds(settings.backup_max_age_hours.saturating_mul(3600)),
            backup_key: settings.backup_key.clone(),
            role_key_prefix: settings.role_key_prefix.clone(),
        }
    }
}

/// Out-of-range configuration is clamped to the largest duration chrono can hold
fn clamped_seconds(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000))
}

/// Holds the recovery flag for the lifetime of one recovery attempt
///
/// Released on drop, so an early return or a dropped future cannot leave
/// recovery locked out.
struct RecoveryGuard<'a>(&'a AtomicBool);

impl<'a> RecoveryGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RecoveryGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SessionCache {
    backend: Arc<dyn Backend>,
    store: Arc<dyn BackupStore>,
    config: SessionCacheConfig,
    session: RwLock<Option<Session>>,
    roles: RwLock<HashMap<String, Role>>,
    recovering: AtomicBool,
}

// =============================================================================
// Construction
// =============================================================================

impl SessionCache {
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn BackupStore>,
        config: SessionCacheConfig,
    ) -> Self {
        Self {
            backend,
            store,
            config,
            session: RwLock::new(None),
            roles: RwLock::new(HashMap::new()),
            recovering: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SessionCacheConfig {
        &self.config
    }

    fn role_key(&self, user_id: &str) -> String {
        format!("{}{user_id}", self.config.role_key_prefix)
    }

    fn read_session(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_roles(&self) -> RwLockReadGuard<'_, HashMap<String, Role>> {
        self.roles.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_roles(&self) -> RwLockWriteGuard<'_, HashMap<String, Role>> {
        self.roles.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Session and role accessors
// =============================================================================

impl SessionCache {
    /// Store the session in memory and mirror its metadata to durable storage
    ///
    /// A session without a user id is kept in memory only. Durable write
    /// failures are logged and otherwise ignored.
    pub fn cache_session(&self, session: Session) {
        let backup = BackupRecord::from_session(&session, Utc::now());
        *self.write_session() = Some(session);

        let Some(record) = backup else {
            return;
        };
        match serde_json::to_string(&record) {
            Ok(json) => {
                if let Err(e) = self.store.set(&self.config.backup_key, &json) {
                    LoggingHelper::log_storage_failure("write", &self.config.backup_key, &e);
                }
            }
            Err(e) => log::warn!("Failed to encode session backup: {e}"),
        }
    }

    /// The in-memory session, never consulting durable storage
    #[must_use]
    pub fn get_cached_session(&self) -> Option<Session> {
        self.read_session().clone()
    }

    /// Store a user's role in memory and durable storage
    pub fn cache_user_role(&self, user_id: &str, role: Role) {
        self.write_roles().insert(user_id.to_string(), role);

        let key = self.role_key(user_id);
        if let Err(e) = self.store.set(&key, role.as_str()) {
            LoggingHelper::log_storage_failure("write", &key, &e);
        }
    }

    /// Look up a user's role in memory, then durable storage
    ///
    /// A durable hit is promoted back into memory. Unreadable or unknown
    /// stored values count as a miss.
    #[must_use]
    pub fn get_cached_user_role(&self, user_id: &str) -> Option<Role> {
        if let Some(role) = self.read_roles().get(user_id).copied() {
            return Some(role);
        }

        let key = self.role_key(user_id);
        let stored = match self.store.get(&key) {
            Ok(stored) => stored?,
            Err(e) => {
                LoggingHelper::log_storage_failure("read", &key, &e);
                return None;
            }
        };
        match stored.parse::<Role>() {
            Ok(role) => {
                self.write_roles().insert(user_id.to_string(), role);
                Some(role)
            }
            Err(e) => {
                log::warn!("Ignoring cached role for {user_id}: {e}");
                None
            }
        }
    }

    /// Whether the session can be used right now, given the configured margin
    #[must_use]
    pub fn is_session_valid(&self, session: Option<&Session>) -> bool {
        is_session_valid_at(session, Utc::now(), self.config.expiry_margin)
    }

    /// Decode the durable backup record, `None` if absent or unreadable
    #[must_use]
    pub fn backup_record(&self) -> Option<BackupRecord> {
        let raw = match self.store.get(&self.config.backup_key) {
            Ok(raw) => raw?,
            Err(e) => {
                LoggingHelper::log_storage_failure("read", &self.config.backup_key, &e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Ignoring unreadable session backup: {e}");
                None
            }
        }
    }
}

// =============================================================================
// Recovery, refresh and teardown
// =============================================================================

impl SessionCache {
    /// Whether a recovery attempt is currently in flight
    #[must_use]
    pub fn is_recovering(&self) -> bool {
        self.recovering.load(Ordering::Acquire)
    }

    /// Try to re-establish the session after the process was suspended
    ///
    /// Returns `true` if the backend still holds a session, which is then
    /// cached. Otherwise the durable backup decides: older than the maximum
    /// age means the login is gone and all session data is cleared; younger
    /// leaves state untouched. Both cases return `false`.
    ///
    /// A call made while another recovery is in flight returns `false`
    /// immediately.
    pub async fn recover_session(&self) -> bool {
        let Some(_guard) = RecoveryGuard::acquire(&self.recovering) else {
            log::debug!("Session recovery already in progress, skipping");
            return false;
        };

        match self.backend.get_session().await {
            Ok(Some(session)) => {
                self.cache_session(session);
                LoggingHelper::log_recovery_outcome(true, "backend session still active");
                return true;
            }
            Ok(None) => {}
            Err(e) => {
                // A backend hiccup says nothing about the backup; leave it alone
                log::warn!("Session recovery could not reach the backend: {e}");
                return false;
            }
        }

        match self.backup_record() {
            Some(record) if record.is_stale(Utc::now(), self.config.backup_max_age) => {
                LoggingHelper::log_recovery_outcome(false, "backup expired, clearing session data");
                self.clear_session_data();
            }
            Some(record) => {
                LoggingHelper::log_recovery_outcome(false, "backup still recent, login required");
                log::debug!("Recent backup for user {} left in place", record.user_id);
            }
            None => LoggingHelper::log_recovery_outcome(false, "no session and no backup"),
        }
        false
    }

    /// Wipe the in-memory session and roles plus every durable entry this cache owns
    pub fn clear_session_data(&self) {
        *self.write_session() = None;
        self.write_roles().clear();

        if let Err(e) = self.store.remove(&self.config.backup_key) {
            LoggingHelper::log_storage_failure("delete", &self.config.backup_key, &e);
        }

        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                LoggingHelper::log_storage_failure("list", &self.config.role_key_prefix, &e);
                return;
            }
        };
        for key in keys
            .iter()
            .filter(|key| key.starts_with(&self.config.role_key_prefix))
        {
            if let Err(e) = self.store.remove(key) {
                LoggingHelper::log_storage_failure("delete", key, &e);
            }
        }
        log::debug!("Session data cleared");
    }

    /// Ask the backend for a fresh session from the refresh credential
    ///
    /// On failure the existing cached state is left exactly as it was.
    pub async fn force_refresh(&self) -> bool {
        match self.backend.refresh_session().await {
            Ok(session) => {
                self.cache_session(session);
                log::info!("Session refreshed");
                true
            }
            Err(e) => {
                log::warn!("Session refresh failed: {e}");
                false
            }
        }
    }
}
