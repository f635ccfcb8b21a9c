use serde::{Deserialize, Serialize};
use std::fs;

/// Default durable key holding the session backup record
pub const DEFAULT_BACKUP_KEY: &str = "wedding_session_backup";

/// Default durable key prefix for cached roles (`user_role_<id>`)
pub const DEFAULT_ROLE_KEY_PREFIX: &str = "user_role_";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VowSettings {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL of the hosted backend project
    pub url: String,
    /// Public (anon) API key sent with every request
    pub anon_key: String,
    /// Environment variable name that overrides `anon_key`
    pub anon_key_env: Option<String>,
    /// Table holding one role row per user
    pub role_table: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// A session expiring within this many seconds is treated as invalid
    pub expiry_margin_secs: u64,
    /// Backup records older than this are treated as expired during recovery
    pub backup_max_age_hours: u64,
    pub backup_key: String,
    pub role_key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageSettings {
    /// Path of the durable backup file. Empty keeps backups in memory only.
    pub path: String,
    /// Secret used to encrypt stored values. Empty stores plaintext.
    pub encryption_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            anon_key_env: None,
            role_table: "user_roles".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            expiry_margin_secs: 60,
            backup_max_age_hours: 24,
            backup_key: DEFAULT_BACKUP_KEY.to_string(),
            role_key_prefix: DEFAULT_ROLE_KEY_PREFIX.to_string(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 3000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl VowSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read or parsed
    /// - TOML parsing fails
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_env_file();

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);
        settings.logging.init_logger();

        Ok(settings)
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `VOWSESSION_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read
    /// - TOML parsing fails
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = Self::default();

        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_toml_file(&default_config_path)?;
            log::info!("✓ Loaded base settings from {}", default_config_path.display());
        }

        if let Ok(secrets_dir) = std::env::var("VOWSESSION_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_toml_file(&secrets_path)?;
                log::info!("✓ Overriding settings from {}", secrets_path.display());
            } else {
                log::info!(
                    "ℹ VOWSESSION_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse a settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for these settings
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let toml_content = fs::read_to_string(path)?;
        Ok(basic_toml::from_str(&toml_content)?)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_backend_env_overrides(&mut settings.backend);
        Self::apply_session_env_overrides(&mut settings.session);
        Self::apply_retry_env_overrides(&mut settings.retry);
        Self::apply_storage_env_overrides(&mut settings.storage);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    fn apply_backend_env_overrides(backend_settings: &mut BackendSettings) {
        if let Ok(url) = std::env::var("BACKEND_URL") {
            backend_settings.url = url;
        }
        if let Ok(anon_key) = std::env::var("BACKEND_ANON_KEY") {
            backend_settings.anon_key = anon_key;
        }
        if let Ok(role_table) = std::env::var("BACKEND_ROLE_TABLE") {
            backend_settings.role_table = role_table;
        }
        Self::apply_numeric_env_override(
            "BACKEND_REQUEST_TIMEOUT_SECS",
            &mut backend_settings.request_timeout_secs,
        );
    }

    /// Apply environment overrides for session settings
    pub fn apply_session_env_overrides(session_settings: &mut SessionSettings) {
        Self::apply_numeric_env_override(
            "SESSION_EXPIRY_MARGIN_SECS",
            &mut session_settings.expiry_margin_secs,
        );
        Self::apply_numeric_env_override(
            "SESSION_BACKUP_MAX_AGE_HOURS",
            &mut session_settings.backup_max_age_hours,
        );
    }

    /// Apply environment overrides for role retry settings
    pub fn apply_retry_env_overrides(retry_settings: &mut RetrySettings) {
        if let Ok(value_str) = std::env::var("ROLE_RETRY_MAX_ATTEMPTS") {
            if let Ok(value) = value_str.parse::<u32>() {
                retry_settings.max_attempts = value;
            }
        }
        Self::apply_numeric_env_override("ROLE_RETRY_BASE_DELAY_MS", &mut retry_settings.base_delay_ms);
        Self::apply_numeric_env_override("ROLE_RETRY_MAX_DELAY_MS", &mut retry_settings.max_delay_ms);
    }

    fn apply_storage_env_overrides(storage_settings: &mut StorageSettings) {
        if let Ok(path) = std::env::var("STORAGE_PATH") {
            storage_settings.path = path;
        }
        if let Ok(secret) = std::env::var("STORAGE_ENCRYPTION_SECRET") {
            storage_settings.encryption_secret = secret;
        }
    }

    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    /// Helper function to apply numeric environment variable overrides
    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }
}

impl LoggingSettings {
    /// Logger filtered by `level`, read as an `env_logger` directive list
    /// (`"warn"`, `"vowsession=debug,reqwest=warn"`)
    #[must_use]
    pub fn build_logger(&self) -> env_logger::Logger {
        env_logger::Builder::new().parse_filters(&self.level).build()
    }

    /// Install the `level`-filtered logger process-wide
    ///
    /// A logger installed earlier (e.g. by a host application) is kept.
    pub fn init_logger(&self) {
        if env_logger::Builder::new().parse_filters(&self.level).try_init().is_err() {
            log::debug!("Logger already initialized, keeping existing logger");
        }
    }
}

impl BackendSettings {
    /// Get the anon key, checking environment variable first, then falling back to direct value
    #[must_use]
    pub fn get_anon_key(&self) -> String {
        if let Some(env_var) = &self.anon_key_env {
            if let Ok(value) = std::env::var(env_var) {
                return value;
            }
        }
        self.anon_key.clone()
    }
}
