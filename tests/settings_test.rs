use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;
use vowsession::{
    authentication::RetryPolicy, session::SessionCacheConfig, settings::VowSettings,
    SessionServiceFactory,
};

const OVERRIDE_VARS: &[&str] = &[
    "VOWSESSION_SECRETS_DIR",
    "BACKEND_URL",
    "BACKEND_ANON_KEY",
    "SESSION_EXPIRY_MARGIN_SECS",
    "ROLE_RETRY_MAX_ATTEMPTS",
    "STORAGE_PATH",
];

fn clear_overrides() {
    for var in OVERRIDE_VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_secrets_dir_settings_with_env_precedence() {
    clear_overrides();
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("Settings.toml"),
        r#"
[backend]
url = "https://project.example.co"
anon_key = "file-key"

[session]
expiry_margin_secs = 30

[retry]
max_attempts = 4
"#,
    )
    .unwrap();
    env::set_var("VOWSESSION_SECRETS_DIR", dir.path());
    env::set_var("ROLE_RETRY_MAX_ATTEMPTS", "2");

    let settings = VowSettings::load().unwrap();
    clear_overrides();

    assert_eq!(settings.backend.url, "https://project.example.co");
    assert_eq!(settings.backend.get_anon_key(), "file-key");
    assert_eq!(settings.session.expiry_margin_secs, 30);
    assert_eq!(settings.session.backup_max_age_hours, 24);
    assert_eq!(settings.retry.max_attempts, 2);
    assert_eq!(settings.backend.role_table, "user_roles");
}

#[test]
#[serial]
fn test_invalid_numeric_override_is_ignored() {
    clear_overrides();
    env::set_var("SESSION_EXPIRY_MARGIN_SECS", "soon");

    let mut settings = VowSettings::default();
    VowSettings::apply_env_overrides(&mut settings);
    clear_overrides();

    assert_eq!(settings.session.expiry_margin_secs, 60);
}

#[test]
#[serial]
fn test_settings_drive_service_configuration() {
    clear_overrides();
    let dir = TempDir::new().unwrap();
    let backup_path = dir.path().join("backup.json");
    env::set_var("SESSION_EXPIRY_MARGIN_SECS", "300");
    env::set_var("STORAGE_PATH", &backup_path);

    let mut settings = VowSettings::default();
    VowSettings::apply_env_overrides(&mut settings);
    clear_overrides();

    let config = SessionCacheConfig::from_settings(&settings.session);
    assert_eq!(config.expiry_margin, chrono::Duration::minutes(5));
    assert_eq!(RetryPolicy::from_settings(&settings.retry), RetryPolicy::default());

    let store = SessionServiceFactory::create_store(&settings.storage);
    store.set("user_role_u1", "couple").unwrap();
    assert!(backup_path.exists());
}

#[test]
fn test_malformed_settings_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Settings.toml");
    fs::write(&path, "[retry]\nmax_attempts = \"three\"\n").unwrap();

    assert!(VowSettings::from_toml_file(&path).is_err());
}
