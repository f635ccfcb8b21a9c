//! Session validation utilities
//!
//! Pure predicates the session cache and orchestrator delegate to.

use crate::models::Session;
use chrono::{DateTime, Duration, Utc};

/// Safety margin applied when checking session expiry, in seconds
pub const DEFAULT_EXPIRY_MARGIN_SECS: i64 = 60;

/// Check whether a session can still be used at `now`
///
/// # Returns
/// * `false` if there is no session or it carries no user
/// * `true` iff the session expires strictly later than `now + margin`
/// * `false` if `now + margin` is not representable
#[must_use]
pub fn is_session_valid_at(session: Option<&Session>, now: DateTime<Utc>, margin: Duration) -> bool {
    let Some(session) = session else {
        return false;
    };
    if session.user_id().is_none() {
        return false;
    }
    now.checked_add_signed(margin)
        .is_some_and(|deadline| session.expires_at > deadline)
}

/// Check a session against the current time and the default 60 second margin
#[must_use]
pub fn is_session_valid(session: Option<&Session>) -> bool {
    is_session_valid_at(
        session,
        Utc::now(),
        Duration::seconds(DEFAULT_EXPIRY_MARGIN_SECS),
    )
}

/// Seconds left before the session expires, negative once expired
#[must_use]
pub fn seconds_until_expiry(session: &Session, now: DateTime<Utc>) -> i64 {
    session.expires_at.signed_duration_since(now).num_seconds()
}
