use chrono::{Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;
use vowsession::{
    models::{BackupRecord, Role},
    storage::{BackupStore, FileStore, MemoryStore},
    testing::{mock::MockBackend, TestFixtures},
};

const BACKUP_KEY: &str = "wedding_session_backup";

fn backup_written_ago(user_id: &str, age: Duration) -> String {
    let now = Utc::now();
    let record = BackupRecord {
        user_id: user_id.to_string(),
        email: Some(format!("{user_id}@example.com")),
        expires_at: now - age + Duration::hours(1),
        cached_at: now - age,
    };
    serde_json::to_string(&record).unwrap()
}

#[test]
fn test_cached_session_round_trips_in_process() {
    let cache = TestFixtures::session_cache(Arc::new(MockBackend::new()), Arc::new(MemoryStore::new()));
    let session = TestFixtures::session("user-1");

    cache.cache_session(session.clone());

    assert_eq!(cache.get_cached_session(), Some(session));
}

#[test]
fn test_cached_session_is_not_rebuilt_from_durable_storage() {
    let store = Arc::new(MemoryStore::new());
    let first = TestFixtures::session_cache(Arc::new(MockBackend::new()), store.clone());
    first.cache_session(TestFixtures::session("user-1"));

    // A new process sees the backup but no session
    let second = TestFixtures::session_cache(Arc::new(MockBackend::new()), store);
    assert!(second.get_cached_session().is_none());
    assert_eq!(second.backup_record().unwrap().user_id, "user-1");
}

#[test]
fn test_clear_session_data_removes_namespaced_keys() {
    let store = Arc::new(MemoryStore::new());
    store.set("budget_items_cache", "[]").unwrap();
    let cache = TestFixtures::session_cache(Arc::new(MockBackend::new()), store.clone());

    cache.cache_session(TestFixtures::session("user-1"));
    cache.cache_user_role("user-1", Role::Couple);
    cache.cache_user_role("user-2", Role::Vendor);
    cache.clear_session_data();

    let keys = store.keys().unwrap();
    assert!(!keys.iter().any(|key| key.starts_with("user_role_")));
    assert!(!keys.iter().any(|key| key == BACKUP_KEY));
    assert!(keys.iter().any(|key| key == "budget_items_cache"));
    assert_eq!(cache.get_cached_user_role("user-1"), None);
    assert_eq!(cache.get_cached_user_role("user-2"), None);
    assert!(cache.get_cached_session().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_recovery_is_rejected() {
    let backend = Arc::new(
        MockBackend::new()
            .with_session(TestFixtures::session("user-1"))
            .with_session_delay(std::time::Duration::from_millis(500)),
    );
    let cache = TestFixtures::session_cache(backend.clone(), Arc::new(MemoryStore::new()));

    let (first, second) = tokio::join!(cache.recover_session(), cache.recover_session());

    assert!(first);
    assert!(!second);
    assert_eq!(backend.session_calls(), 1);
    assert!(!cache.is_recovering());
    assert_eq!(cache.get_cached_session().unwrap().user_id(), Some("user-1"));
}

#[tokio::test]
async fn test_recovery_with_stale_backup_clears_everything() {
    let store = Arc::new(MemoryStore::new());
    store.set(BACKUP_KEY, &backup_written_ago("user-1", Duration::hours(25))).unwrap();
    store.set("user_role_user-1", "vendor").unwrap();
    let cache = TestFixtures::session_cache(Arc::new(MockBackend::new()), store.clone());

    assert!(!cache.recover_session().await);

    assert!(store.is_empty());
    assert_eq!(cache.get_cached_user_role("user-1"), None);
}

#[tokio::test]
async fn test_recovery_with_recent_backup_leaves_state() {
    let store = Arc::new(MemoryStore::new());
    store.set(BACKUP_KEY, &backup_written_ago("user-1", Duration::hours(2))).unwrap();
    store.set("user_role_user-1", "vendor").unwrap();
    let cache = TestFixtures::session_cache(Arc::new(MockBackend::new()), store.clone());

    assert!(!cache.recover_session().await);

    assert_eq!(store.len(), 2);
    assert_eq!(cache.backup_record().unwrap().user_id, "user-1");
    assert_eq!(cache.get_cached_user_role("user-1"), Some(Role::Vendor));
}

#[tokio::test]
async fn test_recovery_backend_error_keeps_stale_backup() {
    let store = Arc::new(MemoryStore::new());
    store.set(BACKUP_KEY, &backup_written_ago("user-1", Duration::hours(48))).unwrap();
    let cache = TestFixtures::session_cache(
        Arc::new(MockBackend::new().with_session_error()),
        store.clone(),
    );

    assert!(!cache.recover_session().await);
    assert!(cache.backup_record().is_some());
}

#[tokio::test]
async fn test_failed_refresh_keeps_cached_session() {
    let backend = Arc::new(MockBackend::new());
    let cache = TestFixtures::session_cache(backend.clone(), Arc::new(MemoryStore::new()));
    let session = TestFixtures::session("user-1");
    cache.cache_session(session.clone());

    assert!(!cache.force_refresh().await);

    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(cache.get_cached_session(), Some(session));
}

#[tokio::test]
async fn test_successful_refresh_replaces_cached_session() {
    let refreshed = TestFixtures::session_expiring_in("user-1", Duration::hours(2));
    let backend = Arc::new(MockBackend::new().with_refresh(refreshed.clone()));
    let cache = TestFixtures::session_cache(backend, Arc::new(MemoryStore::new()));
    cache.cache_session(TestFixtures::session_expiring_in("user-1", Duration::seconds(10)));

    assert!(cache.force_refresh().await);

    assert_eq!(cache.get_cached_session(), Some(refreshed));
}

#[test]
fn test_roles_survive_restart_with_encrypted_file_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vowsession").join("backup.json");

    {
        let store = Arc::new(FileStore::new(&path).with_encryption_secret("s3cret"));
        let cache = TestFixtures::session_cache(Arc::new(MockBackend::new()), store);
        cache.cache_session(TestFixtures::session("user-1"));
        cache.cache_user_role("user-1", Role::Vendor);
    }

    let store = Arc::new(FileStore::new(&path).with_encryption_secret("s3cret"));
    let cache = TestFixtures::session_cache(Arc::new(MockBackend::new()), store);
    assert_eq!(cache.get_cached_user_role("user-1"), Some(Role::Vendor));
    assert_eq!(cache.backup_record().unwrap().user_id, "user-1");
    assert!(cache.get_cached_session().is_none());
}
