//! Test fixtures providing pre-built test objects
//!
//! Commonly used sessions, provider users and wired-up services, so tests do
//! not rebuild the same objects by hand.

use crate::authentication::{AuthOrchestrator, SessionServiceFactory};
use crate::backend::Backend;
use crate::models::{ProviderUser, Session, UserMetadata};
use crate::session::{SessionCache, SessionCacheConfig};
use crate::settings::VowSettings;
use crate::storage::{BackupStore, MemoryStore};
use chrono::{Duration, Utc};
use std::sync::Arc;

use super::constants::{
    TEST_ANON_KEY, TEST_BACKEND_URL, TEST_BUSINESS_NAME, TEST_PARTNER_NAME, TEST_USER_NAME,
    TEST_WEDDING_DATE,
};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Session for `user_id` (a couple) valid for one more hour
    #[must_use]
    pub fn session(user_id: &str) -> Session {
        Self::session_expiring_in(user_id, Duration::hours(1))
    }

    /// Session for `user_id` (a couple) expiring `expires_in` from now
    #[must_use]
    pub fn session_expiring_in(user_id: &str, expires_in: Duration) -> Session {
        Self::session_for(Self::couple_user(user_id), expires_in)
    }

    /// Session carrying an arbitrary provider user
    #[must_use]
    pub fn session_for(user: ProviderUser, expires_in: Duration) -> Session {
        Session {
            access_token: format!("access-{}", user.id),
            refresh_token: Some(format!("refresh-{}", user.id)),
            expires_at: Utc::now() + expires_in,
            user: Some(user),
        }
    }

    /// Provider user with couple profile metadata
    #[must_use]
    pub fn couple_user(user_id: &str) -> ProviderUser {
        let metadata = UserMetadata {
            name: Some(TEST_USER_NAME.to_string()),
            partner_name: Some(TEST_PARTNER_NAME.to_string()),
            wedding_date: Some(TEST_WEDDING_DATE.to_string()),
            ..UserMetadata::default()
        };
        ProviderUser::new(user_id, Some(&format!("{user_id}@example.com")), metadata)
    }

    /// Provider user flagged as a vendor in metadata
    #[must_use]
    pub fn vendor_user(user_id: &str) -> ProviderUser {
        let metadata = UserMetadata {
            is_vendor: Some(true),
            business_name: Some(TEST_BUSINESS_NAME.to_string()),
            ..UserMetadata::default()
        };
        ProviderUser::new(user_id, Some(&format!("{user_id}@example.com")), metadata)
    }

    /// Settings pointing at a local backend with default tunables
    #[must_use]
    pub fn settings() -> VowSettings {
        let mut settings = VowSettings::default();
        settings.backend.url = TEST_BACKEND_URL.to_string();
        settings.backend.anon_key = TEST_ANON_KEY.to_string();
        settings
    }

    /// Session cache over `backend` with default configuration
    #[must_use]
    pub fn session_cache(
        backend: Arc<dyn Backend>,
        store: Arc<dyn BackupStore>,
    ) -> Arc<SessionCache> {
        Arc::new(SessionCache::new(
            backend,
            store,
            SessionCacheConfig::default(),
        ))
    }

    /// Orchestrator over `backend` with an in-memory store
    #[must_use]
    pub fn orchestrator(backend: Arc<dyn Backend>) -> AuthOrchestrator {
        Self::orchestrator_with_store(backend, Arc::new(MemoryStore::new()))
    }

    /// Orchestrator over `backend` and `store` with default settings
    #[must_use]
    pub fn orchestrator_with_store(
        backend: Arc<dyn Backend>,
        store: Arc<dyn BackupStore>,
    ) -> AuthOrchestrator {
        SessionServiceFactory::create_orchestrator(&Self::settings(), backend, store)
    }
}
