// Centralized logging for the session and role lifecycle
use crate::models::Role;
use crate::authentication::resolver::RoleSource;
use log::{debug, info, warn};
use std::time::Duration;

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log a failed role resolution attempt and the wait before the next one
    pub fn log_role_attempt_failed(
        user_id: &str,
        attempt: u32,
        max_attempts: u32,
        error: &dyn std::fmt::Display,
        next_delay: Option<Duration>,
    ) {
        match next_delay {
            Some(delay) => warn!(
                "🔁 Role lookup for {user_id} failed (attempt {attempt}/{max_attempts}): {error}; retrying in {}ms",
                delay.as_millis()
            ),
            None => warn!(
                "❌ Role lookup for {user_id} failed (attempt {attempt}/{max_attempts}): {error}; retries exhausted"
            ),
        }
    }

    /// Log the outcome of role resolution
    pub fn log_role_resolved(user_id: &str, role: Role, source: RoleSource, attempts: u32) {
        match source {
            RoleSource::Cache => debug!("Role for {user_id} served from cache: {role}"),
            RoleSource::Table => {
                debug!("Role for {user_id} read from role table: {role} (attempt {attempts})");
            }
            RoleSource::Created => {
                info!("✅ Provisioned role '{role}' for new user {user_id} (attempt {attempts})");
            }
            RoleSource::Fallback => {
                warn!("⚠️  Role table unavailable for {user_id}; using metadata-derived role '{role}'");
            }
        }
    }

    /// Log a best-effort durable storage failure that was swallowed
    pub fn log_storage_failure(operation: &str, key: &str, error: &dyn std::fmt::Display) {
        warn!("Durable storage {operation} failed for '{key}': {error}");
    }

    /// Log session recovery outcome
    pub fn log_recovery_outcome(recovered: bool, detail: &str) {
        if recovered {
            info!("🔄 Session recovered: {detail}");
        } else {
            info!("🔒 Session not recovered: {detail}");
        }
    }
}
