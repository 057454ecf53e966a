//! Google OAuth 2.0 user authorization.
//!
//! Each chat user authorizes separately through the consent screen. The
//! callback code is exchanged for tokens which are cached per user in
//! process memory only, so a restart requires users to authorize again.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::auth::AuthorizationGate;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope limited to files created by this app.
pub const DRIVE_SCOPES: &[&str] = &["https://www.googleapis.com/auth/drive.file"];

/// Configuration for the Google OAuth client.
#[derive(Debug, Clone)]
pub struct GoogleAuthConfig {
    /// OAuth client ID
    pub client_id: Option<String>,
    /// OAuth client secret
    pub client_secret: Option<String>,
    /// Where Google sends the user back with `code` and `state`
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
}

impl Default for GoogleAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: "http://localhost:8080/oauth/callback".to_string(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }
}

impl GoogleAuthConfig {
    /// Load configuration from environment variables.
    pub fn from_env(default_redirect_uri: &str) -> Self {
        Self {
            client_id: non_empty_env("GOOGLE_CLIENT_ID"),
            client_secret: non_empty_env("GOOGLE_CLIENT_SECRET"),
            redirect_uri: non_empty_env("GOOGLE_REDIRECT_URI")
                .unwrap_or_else(|| default_redirect_uri.to_string()),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: non_empty_env("GOOGLE_TOKEN_URL")
                .unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
        }
    }

    /// Both client id and secret are required for the code exchange.
    pub fn is_valid(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum GoogleAuthError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("invalid token response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("user not authorized: {0}")]
    NotAuthorized(String),
}

#[derive(Debug, Clone)]
struct UserTokens {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
    #[allow(dead_code)]
    token_type: Option<String>,
    #[allow(dead_code)]
    scope: Option<String>,
}

/// Per-user Google OAuth state.
#[derive(Debug, Clone)]
pub struct GoogleOAuthGate {
    config: Arc<GoogleAuthConfig>,
    client: reqwest::Client,
    tokens: Arc<RwLock<HashMap<String, UserTokens>>>,
}

impl GoogleOAuthGate {
    pub fn new(config: GoogleAuthConfig) -> Result<Self, GoogleAuthError> {
        if !config.is_valid() {
            return Err(GoogleAuthError::MissingCredentials(
                "GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET must be set".to_string(),
            ));
        }
        Ok(Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
            tokens: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Get a valid access token for `user_id`, refreshing if necessary.
    pub async fn access_token(&self, user_id: &str) -> Result<String, GoogleAuthError> {
        let refresh_token = {
            let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
            let entry = tokens
                .get(user_id)
                .ok_or_else(|| GoogleAuthError::NotAuthorized(user_id.to_string()))?;
            // 60 second buffer before expiration
            if entry.expires_at > Instant::now() + Duration::from_secs(60) {
                return Ok(entry.access_token.clone());
            }
            entry.refresh_token.clone()
        };

        let refresh_token = refresh_token.ok_or_else(|| {
            GoogleAuthError::MissingCredentials(format!(
                "access token expired and no refresh token for {}",
                user_id
            ))
        })?;
        self.refresh_via_oauth(user_id, &refresh_token).await
    }

    async fn refresh_via_oauth(
        &self,
        user_id: &str,
        refresh_token: &str,
    ) -> Result<String, GoogleAuthError> {
        debug!("Refreshing Google OAuth token for {}", user_id);
        let response = self
            .request_token(&[
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;
        let access_token = response.access_token.clone();
        // Google omits the refresh token on refresh responses; keep the old one.
        self.store_tokens(
            user_id,
            response,
            Some(refresh_token.to_string()),
        );
        Ok(access_token)
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthTokenResponse, GoogleAuthError> {
        self.request_token(&[
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn request_token(
        &self,
        params: &[(&str, &str)],
    ) -> Result<OAuthTokenResponse, GoogleAuthError> {
        let client_id = self.config.client_id.as_deref().unwrap_or_default();
        let client_secret = self.config.client_secret.as_deref().unwrap_or_default();
        let mut form = vec![("client_id", client_id), ("client_secret", client_secret)];
        form.extend_from_slice(params);

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("OAuth token request failed: {} - {}", status, body);
            return Err(GoogleAuthError::TokenExchangeFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str::<OAuthTokenResponse>(&body)?)
    }

    fn store_tokens(
        &self,
        user_id: &str,
        response: OAuthTokenResponse,
        fallback_refresh: Option<String>,
    ) {
        let expires_in = u64::try_from(response.expires_in).unwrap_or(0);
        let entry = UserTokens {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(fallback_refresh),
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        };
        self.tokens
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.to_string(), entry);
    }
}

#[async_trait]
impl AuthorizationGate for GoogleOAuthGate {
    fn is_authorized(&self, user_id: &str) -> bool {
        self.tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(user_id)
    }

    fn authorization_url(&self, user_id: &str) -> String {
        let client_id = self.config.client_id.as_deref().unwrap_or_default();
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&state={}",
            self.config.auth_url,
            urlencoding::encode(client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&DRIVE_SCOPES.join(" ")),
            urlencoding::encode(user_id)
        )
    }

    async fn complete_authorization(&self, code: &str, user_id: &str) -> bool {
        match self.exchange_code(code).await {
            Ok(response) => {
                self.store_tokens(user_id, response, None);
                info!("Google authorization completed for user {}", user_id);
                true
            }
            Err(err) => {
                error!("Google authorization failed for user {}: {}", user_id, err);
                false
            }
        }
    }
}
