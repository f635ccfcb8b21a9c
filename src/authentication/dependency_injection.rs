//! Application service container
//!
//! Holds the single `AuthOrchestrator` of a process together with the
//! settings it was built from.

use super::factory::SessionServiceFactory;
use super::orchestrator::AuthOrchestrator;
use crate::backend::Backend;
use crate::settings::VowSettings;
use crate::storage::BackupStore;
use std::sync::Arc;

/// Application service container for centralized dependency management
#[derive(Clone)]
pub struct ServiceContainer {
    pub orchestrator: Arc<AuthOrchestrator>,
    pub settings: VowSettings,
}

impl ServiceContainer {
    /// Create a container using the store described by the storage settings
    #[must_use]
    pub fn new(settings: VowSettings, backend: Arc<dyn Backend>) -> Self {
        let store = SessionServiceFactory::create_store(&settings.storage);
        Self::with_store(settings, backend, store)
    }

    /// Create a container with an explicitly provided backup store
    #[must_use]
    pub fn with_store(
        settings: VowSettings,
        backend: Arc<dyn Backend>,
        store: Arc<dyn BackupStore>,
    ) -> Self {
        let orchestrator = Arc::new(SessionServiceFactory::create_orchestrator(
            &settings, backend, store,
        ));
        Self {
            orchestrator,
            settings,
        }
    }

    /// Get the orchestrator
    #[must_use]
    pub const fn orchestrator(&self) -> &Arc<AuthOrchestrator> {
        &self.orchestrator
    }

    /// Get the settings
    #[must_use]
    pub const fn settings(&self) -> &VowSettings {
        &self.settings
    }

    /// Short summary of the wiring, for startup logs
    #[must_use]
    pub fn summary(&self) -> String {
        let storage = if self.settings.storage.path.trim().is_empty() {
            "memory".to_string()
        } else if self.settings.storage.encryption_secret.is_empty() {
            format!("file {}", self.settings.storage.path)
        } else {
            format!("encrypted file {}", self.settings.storage.path)
        };
        format!(
            "backend {} / role table {} / storage {storage} / {} role attempts",
            self.settings.backend.url,
            self.settings.backend.role_table,
            self.orchestrator.resolver().policy().max_attempts
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::testing::mock::MockBackend;
    use crate::testing::TestFixtures;

    #[test]
    fn test_service_container() {
        let container = ServiceContainer::new(TestFixtures::settings(), Arc::new(MockBackend::new()));

        assert!(container.orchestrator().is_master());
        let summary = container.summary();
        assert!(summary.contains("storage memory"));
        assert!(summary.contains("3 role attempts"));
    }

    #[test]
    fn test_clones_share_one_orchestrator() {
        let container = ServiceContainer::with_store(
            TestFixtures::settings(),
            Arc::new(MockBackend::new()),
            Arc::new(MemoryStore::new()),
        );
        let clone = container.clone();

        assert!(Arc::ptr_eq(container.orchestrator(), clone.orchestrator()));
        assert_eq!(container.orchestrator().tab_id(), clone.orchestrator().tab_id());
    }
}
