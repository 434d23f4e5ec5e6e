use crate::error::{DirectoryError, DirectoryResult};
use crate::models::settings::Credentials;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Raw result of one client-credentials exchange.
#[derive(Debug, Deserialize, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: i64,
}

/// App access token plus the instant after which it must not be handed out.
#[derive(Debug, Clone)]
pub struct AppToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AppToken {
    fn is_usable(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange(&self, credentials: &Credentials) -> DirectoryResult<TokenGrant>;
}

/// `POST /oauth2/token` with `grant_type=client_credentials`.
pub struct HelixCredentialExchange {
    http: Client,
    auth_url: String,
}

impl HelixCredentialExchange {
    pub fn new(http: Client, auth_url: impl Into<String>) -> Self {
        Self {
            http,
            auth_url: auth_url.into(),
        }
    }
}

#[async_trait]
impl CredentialExchange for HelixCredentialExchange {
    async fn exchange(&self, credentials: &Credentials) -> DirectoryResult<TokenGrant> {
        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self.http.post(&self.auth_url).form(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::UpstreamAuth {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Process-wide app token cache. Construct once and share through an `Arc`.
///
/// The cache lock is held across the exchange, so callers that arrive while
/// no valid token exists wait for the single in-flight exchange instead of
/// starting their own.
pub struct TokenManager {
    credentials: Option<Credentials>,
    exchange: Arc<dyn CredentialExchange>,
    safety_margin: ChronoDuration,
    cached: Mutex<Option<AppToken>>,
}

impl TokenManager {
    pub fn new(
        credentials: Option<Credentials>,
        exchange: Arc<dyn CredentialExchange>,
        safety_margin_secs: i64,
    ) -> Self {
        Self {
            credentials,
            exchange,
            safety_margin: ChronoDuration::seconds(safety_margin_secs),
            cached: Mutex::new(None),
        }
    }

    fn credentials(&self) -> DirectoryResult<&Credentials> {
        self.credentials.as_ref().ok_or_else(|| {
            DirectoryError::AuthConfig(format!(
                "set {} and {}",
                crate::models::settings::CLIENT_ID_VAR,
                crate::models::settings::CLIENT_SECRET_VAR
            ))
        })
    }

    pub fn client_id(&self) -> DirectoryResult<&str> {
        Ok(self.credentials()?.client_id.as_str())
    }

    /// Return the cached token, exchanging credentials for a new one when the
    /// cached one is missing or inside the safety margin.
    pub async fn get_token(&self) -> DirectoryResult<AppToken> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_usable(Utc::now()) {
                return Ok(token.clone());
            }
            debug!("[TokenManager] Cached token is inside the safety margin, refreshing");
        }

        let credentials = self.credentials()?;
        let grant = match self.exchange.exchange(credentials).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!("[TokenManager] Token exchange failed: {}", e);
                return Err(e);
            }
        };

        let token = AppToken {
            access_token: grant.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(grant.expires_in) - self.safety_margin,
        };
        info!(
            "[TokenManager] Obtained app token, valid until {}",
            token.expires_at.to_rfc3339()
        );

        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token so the next call performs a fresh exchange.
    pub async fn invalidate(&self) {
        if self.cached.lock().await.take().is_some() {
            info!("[TokenManager] Cached token invalidated");
        }
    }
}
