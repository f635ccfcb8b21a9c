//! Role Resolver
//!
//! Maps a user id to exactly one [`Role`]. Returning users are served by a
//! single role-table read; a missing row is the normal first-login case and
//! is answered by provisioning a role derived from the provider metadata.
//! Transient failures are retried with linear, capped backoff, and when all
//! attempts are spent a metadata-derived role is returned without writing it.
//! Resolution therefore always yields a role and never fails.

use crate::backend::{Backend, BackendError};
use crate::models::{Role, RoleRecord};
use crate::session::SessionCache;
use crate::settings::RetrySettings;
use crate::utils::logging::LoggingHelper;
use std::sync::Arc;
use std::time::Duration;

/// Bounded retry with linear backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(3000),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from settings; at least one attempt is always made
    #[must_use]
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }

    /// Wait after failed attempt `attempt` (1-based): `min(base × attempt, max)`
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt).min(self.max_delay)
    }
}

/// Where a resolved role came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource {
    /// Session cache hit, no backend call made
    Cache,
    /// Existing role row
    Table,
    /// Row provisioned by this resolution
    Created,
    /// Derived from metadata after every attempt failed; nothing written
    Fallback,
}

/// Outcome of a role resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleResolution {
    pub role: Role,
    pub source: RoleSource,
    /// Attempts made against the role table (0 for cache hits)
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolveState {
    Attempting(u32),
    Backoff(u32),
    Fallback,
}

pub struct RoleResolver {
    backend: Arc<dyn Backend>,
    policy: RetryPolicy,
    cache: Option<Arc<SessionCache>>,
}

impl RoleResolver {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy,
            cache: None,
        }
    }

    /// Short-circuit repeated lookups through the session cache's role map
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<SessionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Resolve the user's role; always returns a role
    pub async fn fetch_user_role_with_retry(&self, user_id: &str) -> Role {
        self.resolve(user_id).await.role
    }

    /// Resolve the user's role, reporting where it came from
    pub async fn resolve(&self, user_id: &str) -> RoleResolution {
        if let Some(role) = self
            .cache
            .as_ref()
            .and_then(|cache| cache.get_cached_user_role(user_id))
        {
            LoggingHelper::log_role_resolved(user_id, role, RoleSource::Cache, 0);
            return RoleResolution {
                role,
                source: RoleSource::Cache,
                attempts: 0,
            };
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut state = ResolveState::Attempting(1);
        let resolution = loop {
            state = match state {
                ResolveState::Attempting(attempt) => match self.attempt(user_id).await {
                    Ok((role, source)) => {
                        break RoleResolution {
                            role,
                            source,
                            attempts: attempt,
                        }
                    }
                    Err(e) if attempt < max_attempts => {
                        let delay = self.policy.backoff_for(attempt);
                        LoggingHelper::log_role_attempt_failed(
                            user_id,
                            attempt,
                            max_attempts,
                            &e,
                            Some(delay),
                        );
                        ResolveState::Backoff(attempt)
                    }
                    Err(e) => {
                        LoggingHelper::log_role_attempt_failed(
                            user_id,
                            attempt,
                            max_attempts,
                            &e,
                            None,
                        );
                        ResolveState::Fallback
                    }
                },
                ResolveState::Backoff(attempt) => {
                    tokio::time::sleep(self.policy.backoff_for(attempt)).await;
                    ResolveState::Attempting(attempt + 1)
                }
                ResolveState::Fallback => break self.fallback(user_id, max_attempts).await,
            };
        };

        LoggingHelper::log_role_resolved(
            user_id,
            resolution.role,
            resolution.source,
            resolution.attempts,
        );

        // A fallback role was never confirmed by the table; caching it would
        // pin a guess for later lookups
        if resolution.source != RoleSource::Fallback {
            if let Some(cache) = &self.cache {
                cache.cache_user_role(user_id, resolution.role);
            }
        }
        resolution
    }

    /// One read-then-create-on-miss pass
    async fn attempt(&self, user_id: &str) -> Result<(Role, RoleSource), BackendError> {
        if let Some(role) = self.backend.find_role(user_id).await? {
            return Ok((role, RoleSource::Table));
        }

        let role = self.metadata_role(user_id).await?;
        match self.backend.insert_role(&RoleRecord::new(user_id, role)).await {
            Ok(()) => Ok((role, RoleSource::Created)),
            Err(BackendError::Conflict(message)) => {
                // Another client provisioned the row first; its role wins
                log::debug!("Role row for {user_id} created concurrently, re-reading");
                self.backend
                    .find_role(user_id)
                    .await?
                    .map(|winner| (winner, RoleSource::Table))
                    .ok_or(BackendError::Conflict(message))
            }
            Err(e) => Err(e),
        }
    }

    /// Default role from the current user's metadata
    async fn metadata_role(&self, user_id: &str) -> Result<Role, BackendError> {
        let provider_user = self.backend.get_current_user().await?;
        if provider_user.id != user_id {
            return Err(BackendError::IdentityMismatch {
                expected: user_id.to_string(),
                actual: provider_user.id,
            });
        }
        Ok(provider_user.user_metadata.default_role())
    }

    async fn fallback(&self, user_id: &str, attempts: u32) -> RoleResolution {
        let role = match self.metadata_role(user_id).await {
            Ok(role) => role,
            Err(e) => {
                log::warn!("Metadata unavailable for {user_id} ({e}); defaulting to '{}'", Role::default());
                Role::default()
            }
        };
        RoleResolution {
            role,
            source: RoleSource::Fallback,
            attempts,
        }
    }
}
