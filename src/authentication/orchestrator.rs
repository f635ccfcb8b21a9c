//! Auth Orchestrator - the identity lifecycle entry point
//!
//! The `AuthOrchestrator` composes the [`SessionCache`] and the
//! [`RoleResolver`] into a single `User` materialization step and is the only
//! object application code calls on login, logout and session restore.
//!
//! ## Organization
//!
//! 1. **Construction** - wiring and accessors
//! 2. **Materialization** - `create_user_with_role`, `restore_session`
//! 3. **Lifecycle hooks** - listeners, `notify_auth_change`, `sign_out`, `cleanup`
//! 4. **Tab coordination** - `is_master`, `tab_id`

use crate::authentication::resolver::RoleResolver;
use crate::backend::Backend;
use crate::models::{ProviderUser, Session, User};
use crate::session::SessionCache;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Callback invoked on every identity or session transition
pub type AuthListener = dyn Fn(Option<&User>, Option<&Session>) + Send + Sync;

/// Handle returned by [`AuthOrchestrator::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct AuthOrchestrator {
    backend: Arc<dyn Backend>,
    cache: Arc<SessionCache>,
    resolver: RoleResolver,
    listeners: Mutex<Vec<(ListenerId, Arc<AuthListener>)>>,
    next_listener_id: AtomicU64,
    tab_id: String,
    torn_down: AtomicBool,
}

// =============================================================================
// 1. Construction
// =============================================================================

impl AuthOrchestrator {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, cache: Arc<SessionCache>, resolver: RoleResolver) -> Self {
        Self {
            backend,
            cache,
            resolver,
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            tab_id: Uuid::new_v4().to_string(),
            torn_down: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    #[must_use]
    pub const fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<(ListenerId, Arc<AuthListener>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// 2. Materialization
// =============================================================================

impl AuthOrchestrator {
    /// Resolve the role for a provider user and assemble the `User`
    ///
    /// Returns `None` when there is no identifiable provider user; callers
    /// treat that as "show login".
    pub async fn create_user_with_role(&self, provider_user: Option<&ProviderUser>) -> Option<User> {
        let Some(provider_user) = provider_user.filter(|user| !user.id.is_empty()) else {
            log::warn!("Cannot materialize user: no provider identity available");
            return None;
        };

        let role = self
            .resolver
            .fetch_user_role_with_retry(&provider_user.id)
            .await;
        Some(User::from_provider(provider_user, role))
    }

    /// Application-start flow: backend session → role → cache → notify
    ///
    /// A backend session inside the expiry margin is refreshed once. Without
    /// any live session the cache's recovery path runs. Listeners are always
    /// notified of the outcome.
    pub async fn restore_session(&self) -> Option<User> {
        let Some(session) = self.current_valid_session().await else {
            self.notify_auth_change(None, None);
            return None;
        };

        self.cache.cache_session(session.clone());
        let user = self.create_user_with_role(session.user.as_ref()).await;
        match &user {
            Some(user) => {
                log::info!("Session restored for {} ({})", user.id, user.role);
                self.notify_auth_change(Some(user), Some(&session));
            }
            None => self.notify_auth_change(None, None),
        }
        user
    }

    async fn current_valid_session(&self) -> Option<Session> {
        let live = match self.backend.get_session().await {
            Ok(session) => session,
            Err(e) => {
                log::warn!("Could not read backend session: {e}");
                None
            }
        };

        let candidate = match live {
            Some(session) => session,
            None => {
                if !self.cache.recover_session().await {
                    return None;
                }
                self.cache.get_cached_session()?
            }
        };
        self.usable_or_refreshed(candidate).await
    }

    /// Accept a session outside the expiry margin, otherwise refresh it once
    async fn usable_or_refreshed(&self, session: Session) -> Option<Session> {
        if self.cache.is_session_valid(Some(&session)) {
            return Some(session);
        }
        log::debug!("Session expires within the safety margin, refreshing");
        if !self.cache.force_refresh().await {
            return None;
        }
        self.cache
            .get_cached_session()
            .filter(|refreshed| self.cache.is_session_valid(Some(refreshed)))
    }
}

// =============================================================================
// 3. Lifecycle hooks
// =============================================================================

impl AuthOrchestrator {
    /// Register a listener for identity transitions
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(Option<&User>, Option<&Session>) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let listener: Arc<AuthListener> = Arc::new(listener);
        self.listeners().push((id, listener));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Inform every listener, in registration order, of an identity transition
    ///
    /// Listeners run outside the registry lock so they may (un)subscribe.
    /// No-op after [`cleanup`](Self::cleanup).
    pub fn notify_auth_change(&self, user: Option<&User>, session: Option<&Session>) {
        if self.torn_down.load(Ordering::Acquire) {
            return;
        }
        let snapshot: Vec<Arc<AuthListener>> = self
            .listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(user, session);
        }
    }

    /// Revoke the backend session, wipe cached state and notify listeners
    pub async fn sign_out(&self) {
        if let Err(e) = self.backend.sign_out().await {
            log::warn!("Backend sign-out failed, clearing local state anyway: {e}");
        }
        self.cache.clear_session_data();
        self.notify_auth_change(None, None);
    }

    /// Release listeners at teardown; safe to call more than once
    pub fn cleanup(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.listeners().clear();
        log::debug!("Auth orchestrator for tab {} cleaned up", self.tab_id);
    }

    #[must_use]
    pub fn is_cleaned_up(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }
}

// =============================================================================
// 4. Tab coordination
// =============================================================================

impl AuthOrchestrator {
    /// Whether this instance leads across tabs
    ///
    /// Single-instance stub: always the leader. Leader election would hook in here.
    #[must_use]
    pub const fn is_master(&self) -> bool {
        true
    }

    /// Identifier of this instance, random per orchestrator
    #[must_use]
    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }
}
