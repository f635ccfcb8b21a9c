use chrono::Duration;
use std::sync::{Arc, Mutex};
use vowsession::{
    models::{Role, User},
    storage::{BackupStore, MemoryStore},
    testing::{mock::MockBackend, TestFixtures},
    ServiceContainer,
};

type Seen = Arc<Mutex<Vec<Option<User>>>>;

fn record_notifications(orchestrator: &vowsession::AuthOrchestrator) -> Seen {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    orchestrator.subscribe(move |user, _session| {
        sink.lock().unwrap().push(user.cloned());
    });
    seen
}

#[tokio::test(start_paused = true)]
async fn test_restore_materializes_user_and_notifies() {
    let backend = Arc::new(
        MockBackend::new()
            .with_session(TestFixtures::session("user-1"))
            .with_role("user-1", Role::Couple),
    );
    let orchestrator = TestFixtures::orchestrator(backend.clone());
    let seen = record_notifications(&orchestrator);

    let user = orchestrator.restore_session().await.unwrap();

    assert_eq!(user.id, "user-1");
    assert_eq!(user.email, "user-1@example.com");
    assert_eq!(user.role, Role::Couple);
    assert_eq!(user.partner_name.as_deref(), Some("Sam"));
    assert_eq!(seen.lock().unwrap().as_slice(), &[Some(user.clone())]);
    assert!(orchestrator.cache().get_cached_session().is_some());
    assert_eq!(orchestrator.cache().get_cached_user_role("user-1"), Some(Role::Couple));
}

#[tokio::test(start_paused = true)]
async fn test_restore_without_session_notifies_signed_out() {
    let backend = Arc::new(MockBackend::new());
    let orchestrator = TestFixtures::orchestrator(backend.clone());
    let seen = record_notifications(&orchestrator);

    assert!(orchestrator.restore_session().await.is_none());

    assert_eq!(seen.lock().unwrap().as_slice(), &[None]);
    assert_eq!(backend.find_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_restore_refreshes_session_inside_margin() {
    let backend = Arc::new(
        MockBackend::new()
            .with_session(TestFixtures::session_expiring_in("user-1", Duration::seconds(30)))
            .with_refresh(TestFixtures::session("user-1"))
            .with_role("user-1", Role::Vendor),
    );
    let orchestrator = TestFixtures::orchestrator(backend.clone());

    let user = orchestrator.restore_session().await.unwrap();

    assert_eq!(user.role, Role::Vendor);
    assert_eq!(backend.refresh_calls(), 1);
    let cached = orchestrator.cache().get_cached_session().unwrap();
    assert!(orchestrator.cache().is_session_valid(Some(&cached)));
}

#[tokio::test(start_paused = true)]
async fn test_restore_gives_up_when_refresh_fails() {
    let backend = Arc::new(
        MockBackend::new()
            .with_session(TestFixtures::session_expiring_in("user-1", Duration::seconds(30)))
            .with_role("user-1", Role::Vendor),
    );
    let orchestrator = TestFixtures::orchestrator(backend.clone());

    assert!(orchestrator.restore_session().await.is_none());
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.find_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_recovered_session_inside_margin_is_refreshed() {
    let backend = Arc::new(
        MockBackend::new()
            .with_session_from_call(
                2,
                TestFixtures::session_expiring_in("user-1", Duration::seconds(30)),
            )
            .with_refresh(TestFixtures::session("user-1"))
            .with_role("user-1", Role::Couple),
    );
    let orchestrator = TestFixtures::orchestrator(backend.clone());

    let user = orchestrator.restore_session().await.unwrap();

    assert_eq!(user.id, "user-1");
    assert_eq!(backend.session_calls(), 2);
    assert_eq!(backend.refresh_calls(), 1);
    let cached = orchestrator.cache().get_cached_session().unwrap();
    assert!(orchestrator.cache().is_session_valid(Some(&cached)));
}

#[tokio::test(start_paused = true)]
async fn test_create_user_with_role_carries_vendor_profile() {
    let backend = Arc::new(MockBackend::new().with_current_user(TestFixtures::vendor_user("v-9")));
    let orchestrator = TestFixtures::orchestrator(backend.clone());

    let user = orchestrator
        .create_user_with_role(Some(&TestFixtures::vendor_user("v-9")))
        .await
        .unwrap();

    assert!(user.is_vendor());
    assert_eq!(user.business_name.as_deref(), Some("Petal & Stem Florals"));
    assert_eq!(backend.stored_role("v-9"), Some(Role::Vendor));
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_clears_state_even_when_backend_fails() {
    let store = Arc::new(MemoryStore::new());
    let backend = Arc::new(
        MockBackend::new()
            .with_session(TestFixtures::session("user-1"))
            .with_role("user-1", Role::Couple)
            .with_sign_out_error(),
    );
    let orchestrator = TestFixtures::orchestrator_with_store(backend.clone(), store.clone());
    orchestrator.restore_session().await.unwrap();
    let seen = record_notifications(&orchestrator);

    orchestrator.sign_out().await;

    assert_eq!(backend.sign_out_calls(), 1);
    assert!(store.keys().unwrap().is_empty());
    assert!(orchestrator.cache().get_cached_session().is_none());
    assert_eq!(seen.lock().unwrap().as_slice(), &[None]);
}

#[tokio::test(start_paused = true)]
async fn test_container_wires_a_working_orchestrator() {
    let backend = Arc::new(
        MockBackend::new()
            .with_session(TestFixtures::session("user-1"))
            .with_current_user(TestFixtures::couple_user("user-1")),
    );
    let container = ServiceContainer::new(TestFixtures::settings(), backend.clone());

    let user = container.orchestrator().restore_session().await.unwrap();

    assert_eq!(user.role, Role::Couple);
    assert_eq!(backend.stored_role("user-1"), Some(Role::Couple));
    container.orchestrator().cleanup();
    assert!(container.orchestrator().is_cleaned_up());
}
