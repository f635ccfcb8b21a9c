//! Service factory for creating configured session services
//!
//! This module wires the backup store, session cache, role resolver and
//! orchestrator together from settings.

use crate::authentication::orchestrator::AuthOrchestrator;
use crate::authentication::resolver::{RetryPolicy, RoleResolver};
use crate::backend::Backend;
use crate::session::{SessionCache, SessionCacheConfig};
use crate::settings::{StorageSettings, VowSettings};
use crate::storage::{BackupStore, FileStore, MemoryStore};
use std::sync::Arc;

/// Factory for creating session services with dependency injection
pub struct SessionServiceFactory;

impl SessionServiceFactory {
    /// Pick the durable store described by the storage settings
    ///
    /// An empty path keeps backups in process memory; otherwise a
    /// [`FileStore`] is used, encrypted when a secret is configured.
    #[must_use]
    pub fn create_store(settings: &StorageSettings) -> Arc<dyn BackupStore> {
        if settings.path.trim().is_empty() {
            log::info!("⚠️  No storage path configured - session backups kept in memory only");
            return Arc::new(MemoryStore::new());
        }

        let mut store = FileStore::new(settings.path.trim());
        if settings.encryption_secret.is_empty() {
            log::info!("💾 Session backups stored in {}", store.path().display());
        } else {
            store = store.with_encryption_secret(&settings.encryption_secret);
            log::info!(
                "🔐 Session backups stored encrypted in {}",
                store.path().display()
            );
        }
        Arc::new(store)
    }

    /// Create a fully configured `AuthOrchestrator`
    ///
    /// # Arguments
    /// * `settings` - Application settings carrying session and retry tunables
    /// * `backend` - The hosted backend client
    /// * `store` - Durable store for session backups and cached roles
    #[must_use]
    pub fn create_orchestrator(
        settings: &VowSettings,
        backend: Arc<dyn Backend>,
        store: Arc<dyn BackupStore>,
    ) -> AuthOrchestrator {
        log::info!("🏭 Starting session service factory...");

        let cache = Arc::new(SessionCache::new(
            Arc::clone(&backend),
            store,
            SessionCacheConfig::from_settings(&settings.session),
        ));
        log::info!(
            "✅ Session cache configured (expiry margin {}s, backup max age {}h)",
            settings.session.expiry_margin_secs,
            settings.session.backup_max_age_hours
        );

        let policy = RetryPolicy::from_settings(&settings.retry);
        let resolver =
            RoleResolver::new(Arc::clone(&backend), policy).with_cache(Arc::clone(&cache));
        log::info!(
            "✅ Role resolver configured with {} attempts",
            policy.max_attempts
        );
        log::info!("   └─ Backoff {:?} per attempt, capped at {:?}", policy.base_delay, policy.max_delay);

        let orchestrator = AuthOrchestrator::new(backend, cache, resolver);
        log::info!("🏭 Session service factory completed (tab {})", orchestrator.tab_id());
        orchestrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock::MockBackend;
    use crate::testing::TestFixtures;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_create_store_without_path_is_memory() {
        let store = SessionServiceFactory::create_store(&StorageSettings::default());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_create_store_with_path_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup.json");
        let settings = StorageSettings {
            path: path.display().to_string(),
            encryption_secret: "secret".to_string(),
        };

        let store = SessionServiceFactory::create_store(&settings);
        store.set("user_role_u1", "vendor").unwrap();

        assert!(path.exists());
        assert_eq!(store.get("user_role_u1").unwrap().as_deref(), Some("vendor"));
    }

    #[test]
    fn test_create_orchestrator_applies_settings() {
        let mut settings = TestFixtures::settings();
        settings.retry.max_attempts = 5;
        settings.retry.base_delay_ms = 20;
        settings.session.expiry_margin_secs = 120;

        let orchestrator = SessionServiceFactory::create_orchestrator(
            &settings,
            Arc::new(MockBackend::new()),
            Arc::new(MemoryStore::new()),
        );

        assert_eq!(orchestrator.resolver().policy().max_attempts, 5);
        assert_eq!(
            orchestrator.resolver().policy().base_delay,
            Duration::from_millis(20)
        );
        assert_eq!(
            orchestrator.cache().config().expiry_margin,
            chrono::Duration::seconds(120)
        );
    }
}
