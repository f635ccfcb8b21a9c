//! HTTP backend client
//!
//! Talks to a hosted backend-as-a-service exposing a GoTrue style auth API
//! under `auth/v1/` and a PostgREST style table API under `rest/v1/`. Like
//! the hosted client library, it keeps the current token pair in memory;
//! `get_session` reports that pair without a network round trip.

use super::{AuthBackend, BackendError, RoleTable};
use crate::models::{ProviderUser, Role, RoleRecord, Session};
use crate::settings::BackendSettings;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use url::Url;

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<ProviderUser>,
}

impl TokenResponse {
    /// Absolute expiry wins over relative; a response with neither (or with
    /// out-of-range values) is already expired
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| {
                self.expires_in
                    .and_then(Duration::try_seconds)
                    .and_then(|lifetime| now.checked_add_signed(lifetime))
            })
            .unwrap_or(now);

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    role: Role,
}

/// Backend client over HTTP
pub struct RestBackend {
    client: Client,
    base_url: Url,
    anon_key: String,
    role_table: String,
    session: RwLock<Option<Session>>,
}

impl RestBackend {
    /// Create a backend client from settings
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The backend URL is missing or invalid
    /// - No anon key is configured
    /// - The HTTP client cannot be built
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        let anon_key = settings.get_anon_key();
        if anon_key.is_empty() {
            return Err(BackendError::Configuration(
                "Backend anon key is not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| BackendError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: Self::normalize_base_url(&settings.url)?,
            anon_key,
            role_table: settings.role_table.clone(),
            session: RwLock::new(None),
        })
    }

    /// Parse the base URL, making sure relative joins keep its path
    fn normalize_base_url(raw: &str) -> Result<Url, BackendError> {
        if raw.trim().is_empty() {
            return Err(BackendError::Configuration(
                "Backend URL is not configured".to_string(),
            ));
        }
        let with_slash = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{raw}/")
        };
        Url::parse(&with_slash)
            .map_err(|e| BackendError::Configuration(format!("Invalid backend URL '{raw}': {e}")))
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::Configuration(format!("Invalid endpoint '{path}': {e}")))
    }

    fn role_query_path(&self, user_id: &str) -> String {
        format!(
            "rest/v1/{}?user_id=eq.{}&select=role",
            self.role_table,
            urlencoding::encode(user_id)
        )
    }

    /// Install a session obtained elsewhere (e.g. restored by the host application)
    pub async fn set_session(&self, session: Session) {
        *self.session.write().await = Some(session);
    }

    /// Sign in with email and password, storing the resulting session
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the backend cannot be reached
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let url = self.endpoint("auth/v1/token?grant_type=password")?;
        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let token: TokenResponse = check_status(response).await?.json().await?;
        let session = token.into_session(Utc::now());

        log::info!("Signed in as {email}");
        self.set_session(session.clone()).await;
        Ok(session)
    }

    /// Attach the API key and a bearer token (user token when signed in, anon key otherwise)
    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map_or_else(|| self.anon_key.clone(), |s| s.access_token.clone());
        request.header("apikey", &self.anon_key).bearer_auth(token)
    }

    async fn access_token(&self) -> Result<String, BackendError> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or_else(|| BackendError::Unauthorized("No active session".to_string()))
    }
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(BackendError::from_status(status.as_u16(), message))
}

#[async_trait]
impl AuthBackend for RestBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.session.read().await.clone())
    }

    async fn refresh_session(&self) -> Result<Session, BackendError> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
            .ok_or_else(|| BackendError::Unauthorized("No refresh token available".to_string()))?;

        let url = self.endpoint("auth/v1/token?grant_type=refresh_token")?;
        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let token: TokenResponse = check_status(response).await?.json().await?;
        let session = token.into_session(Utc::now());

        self.set_session(session.clone()).await;
        Ok(session)
    }

    async fn get_current_user(&self) -> Result<ProviderUser, BackendError> {
        let token = self.access_token().await?;
        let url = self.endpoint("auth/v1/user")?;
        let response = self
            .client
            .get(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        // Local session is dropped even if revocation fails
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };
        let url = self.endpoint("auth/v1/logout")?;
        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(session.access_token)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RoleTable for RestBackend {
    async fn find_role(&self, user_id: &str) -> Result<Option<Role>, BackendError> {
        let url = self.endpoint(&self.role_query_path(user_id))?;
        let request = self.authorized(self.client.get(url)).await;
        let rows: Vec<RoleRow> = check_status(request.send().await?).await?.json().await?;
        Ok(rows.into_iter().next().map(|row| row.role))
    }

    async fn insert_role(&self, record: &RoleRecord) -> Result<(), BackendError> {
        let url = self.endpoint(&format!("rest/v1/{}", self.role_table))?;
        let request = self
            .authorized(self.client.post(url))
            .await
            .header("Prefer", "return=minimal")
            .json(record);
        check_status(request.send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> BackendSettings {
        BackendSettings {
            url: "https://project.example.co".to_string(),
            anon_key: "anon-key".to_string(),
            ..BackendSettings::default()
        }
    }

    #[test]
    fn test_new_requires_url_and_key() {
        let mut settings = test_settings();
        settings.url = String::new();
        assert!(matches!(
            RestBackend::new(&settings),
            Err(BackendError::Configuration(_))
        ));

        let mut settings = test_settings();
        settings.anon_key = String::new();
        assert!(matches!(
            RestBackend::new(&settings),
            Err(BackendError::Configuration(_))
        ));
    }

    #[test]
    fn test_endpoints_keep_base_path() {
        let mut settings = test_settings();
        settings.url = "https://gateway.example.co/project".to_string();
        let backend = RestBackend::new(&settings).unwrap();

        let url = backend.endpoint("auth/v1/user").unwrap();
        assert_eq!(url.as_str(), "https://gateway.example.co/project/auth/v1/user");
    }

    #[test]
    fn test_role_query_encodes_user_id() {
        let backend = RestBackend::new(&test_settings()).unwrap();
        let url = backend.endpoint(&backend.role_query_path("a b&c")).unwrap();

        assert_eq!(url.path(), "/rest/v1/user_roles");
        assert_eq!(url.query(), Some("user_id=eq.a%20b%26c&select=role"));
    }

    #[test]
    fn test_token_response_expiry() {
        let now = Utc::now();
        let relative: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600
        }))
        .unwrap();
        let session = relative.into_session(now);
        assert_eq!(session.expires_at, now + Duration::seconds(3600));
        assert_eq!(session.refresh_token.as_deref(), Some("r"));

        let absolute: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "expires_in": 3600,
            "expires_at": 1_700_000_000,
            "user": { "id": "u1", "email": "a@b.c", "user_metadata": { "isVendor": true } }
        }))
        .unwrap();
        let session = absolute.into_session(now);
        assert_eq!(session.expires_at.timestamp(), 1_700_000_000);
        assert_eq!(session.user_id(), Some("u1"));
    }

    #[test]
    fn test_out_of_range_expiry_is_already_expired() {
        let now = Utc::now();
        for body in [
            json!({ "access_token": "a", "expires_in": i64::MAX }),
            json!({ "access_token": "a", "expires_in": i64::MIN }),
            json!({ "access_token": "a", "expires_at": i64::MAX }),
        ] {
            let token: TokenResponse = serde_json::from_value(body).unwrap();
            assert_eq!(token.into_session(now).expires_at, now);
        }
    }

    #[tokio::test]
    async fn test_session_state_is_local() {
        let backend = RestBackend::new(&test_settings()).unwrap();
        assert!(backend.get_session().await.unwrap().is_none());
        assert!(matches!(
            backend.refresh_session().await,
            Err(BackendError::Unauthorized(_))
        ));

        let session = Session {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + Duration::hours(1),
            user: None,
        };
        backend.set_session(session.clone()).await;
        assert_eq!(backend.get_session().await.unwrap(), Some(session));
    }
}
