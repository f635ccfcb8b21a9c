use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A user's fixed category, governing which application surface they use
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Couple,
    Vendor,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Couple => "couple",
            Self::Vendor => "vendor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored or provider-supplied role string is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "couple" => Ok(Self::Couple),
            "vendor" => Ok(Self::Vendor),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Provider-supplied profile metadata
///
/// The provider stores this as a free-form JSON object. Known keys are read
/// leniently: a value of the wrong JSON type is treated as absent instead of
/// failing the whole document. Unknown keys are kept in `extra`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserMetadata {
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub is_vendor: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub partner_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub wedding_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl UserMetadata {
    /// Role to provision for a user that has no role row yet
    #[must_use]
    pub fn default_role(&self) -> Role {
        if self.is_vendor == Some(true) || self.role.as_deref() == Some(Role::Vendor.as_str()) {
            Role::Vendor
        } else {
            Role::Couple
        }
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Some(flag),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

fn metadata_or_default<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<UserMetadata, D::Error> {
    Ok(Option::<UserMetadata>::deserialize(deserializer)?.unwrap_or_default())
}

/// The identity provider's view of the signed-in user
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "metadata_or_default")]
    pub user_metadata: UserMetadata,
}

impl ProviderUser {
    #[must_use]
    pub fn new(id: &str, email: Option<&str>, user_metadata: UserMetadata) -> Self {
        Self {
            id: id.to_string(),
            email: email.map(ToString::to_string),
            user_metadata,
        }
    }
}

/// A time-bounded proof of authentication issued by the backend
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub user: Option<ProviderUser>,
}

impl Session {
    /// Identifier of the session's user, `None` when the session carries no usable user
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|user| user.id.as_str())
            .filter(|id| !id.is_empty())
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.user.as_ref().and_then(|user| user.email.as_deref())
    }
}

/// Best-effort durable mirror of session metadata, used only as a recovery hint
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub cached_at: DateTime<Utc>,
}

impl BackupRecord {
    /// Build a backup record for a session, `None` if the session has no user id
    #[must_use]
    pub fn from_session(session: &Session, cached_at: DateTime<Utc>) -> Option<Self> {
        let user_id = session.user_id()?;
        Some(Self {
            user_id: user_id.to_string(),
            email: session.email().map(ToString::to_string),
            expires_at: session.expires_at,
            cached_at,
        })
    }

    /// Whether the record was written more than `max_age` before `now`
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.cached_at) > max_age
    }
}

/// One row of the role table
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RoleRecord {
    pub user_id: String,
    pub role: Role,
}

impl RoleRecord {
    #[must_use]
    pub fn new(user_id: &str, role: Role) -> Self {
        Self {
            user_id: user_id.to_string(),
            role,
        }
    }
}

/// Materialized identity handed to the rest of the application
///
/// Derived fresh from the provider user and the resolved role on every
/// resolution; never stored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub partner_name: Option<String>,
    pub wedding_date: Option<String>,
    pub role: Role,
    pub business_name: Option<String>,
}

impl User {
    #[must_use]
    pub fn from_provider(provider_user: &ProviderUser, role: Role) -> Self {
        let metadata = &provider_user.user_metadata;
        Self {
            id: provider_user.id.clone(),
            email: provider_user.email.clone().unwrap_or_default(),
            name: metadata.name.clone(),
            partner_name: metadata.partner_name.clone(),
            wedding_date: metadata.wedding_date.clone(),
            role,
            business_name: metadata.business_name.clone(),
        }
    }

    #[must_use]
    pub fn is_vendor(&self) -> bool {
        self.role == Role::Vendor
    }
}
