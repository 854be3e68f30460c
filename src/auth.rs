//! App-only (client-credentials) token acquisition with an in-process cache.
//!
//! [`TokenProvider`] owns the single cached [`AccessToken`] of a run. The Graph client holds it
//! behind an `Arc` and asks for a token before every call; the provider only goes back to the
//! identity platform when the cached token is missing, about to expire, or was rejected.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{Credentials, RetryPolicy, Settings};
use crate::contract::{HttpRequest, HttpTransport};
use crate::error::AuthError;

pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

#[derive(Clone, PartialEq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    /// Still usable at `now` if it outlives the safety `margin`.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: ChronoDuration) -> bool {
        now + margin < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

pub struct TokenProvider {
    transport: Arc<dyn HttpTransport>,
    token_url: String,
    client_id: String,
    client_secret: String,
    margin: ChronoDuration,
    retry: RetryPolicy,
    timeout: Duration,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: &Credentials,
        settings: &Settings,
    ) -> Self {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            settings.authority_host.trim_end_matches('/'),
            credentials.tenant_id
        );
        Self {
            transport,
            token_url,
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            margin: ChronoDuration::seconds(settings.token_refresh_margin_secs),
            retry: settings.retry.clone(),
            timeout: Duration::from_secs(settings.http_timeout_secs),
            cached: Mutex::new(None),
        }
    }

    /// Returns the cached token while it is valid, otherwise performs a client-credentials grant.
    ///
    /// The cache lock is held across the grant, so concurrent callers wait for one refresh
    /// instead of starting their own.
    pub async fn get_token(&self) -> Result<AccessToken, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(Utc::now(), self.margin) {
                debug!(expires_at = %token.expires_at, "Reusing cached access token");
                return Ok(token.clone());
            }
            debug!(expires_at = %token.expires_at, "Cached access token expired");
        }

        let token = self.acquire().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drops the cached token if it is still the one that was `rejected`.
    /// A token that a concurrent caller already replaced is left alone.
    pub async fn invalidate(&self, rejected: &AccessToken) {
        let mut cached = self.cached.lock().await;
        if cached.as_ref() == Some(rejected) {
            info!("Invalidating rejected access token");
            *cached = None;
        }
    }

    async fn acquire(&self) -> Result<AccessToken, AuthError> {
        let form = vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), self.client_id.clone()),
            ("client_secret".to_string(), self.client_secret.clone()),
            ("scope".to_string(), GRAPH_SCOPE.to_string()),
        ];

        let mut last_reason = String::new();
        for attempt in 1..=self.retry.max_attempts {
            let request =
                HttpRequest::post_form(&self.token_url, form.clone()).timeout(self.timeout);
            let mut retry_after = None;

            match self.transport.send(request).await {
                Ok(resp) if resp.is_success() => return self.parse_token(&resp.body),
                Ok(resp) if resp.status == 429 || resp.status >= 500 => {
                    warn!(status = resp.status, attempt, "Token endpoint unavailable");
                    last_reason = format!("HTTP {}", resp.status);
                    retry_after = resp.retry_after();
                }
                Ok(resp) => {
                    let detail = serde_json::from_slice::<TokenResponse>(&resp.body)
                        .ok()
                        .and_then(|t| t.error_description.or(t.error))
                        .unwrap_or_else(|| format!("HTTP {}", resp.status));
                    warn!(status = resp.status, "Token endpoint rejected credentials");
                    return Err(AuthError::Rejected(detail));
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Token endpoint unreachable");
                    last_reason = e.to_string();
                }
            }

            if attempt < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay_for(attempt, retry_after)).await;
            }
        }

        Err(AuthError::Unreachable {
            attempts: self.retry.max_attempts,
            reason: last_reason,
        })
    }

    fn parse_token(&self, body: &[u8]) -> Result<AccessToken, AuthError> {
        let payload: TokenResponse =
            serde_json::from_slice(body).map_err(|e| AuthError::Malformed(e.to_string()))?;
        if let Some(error) = payload.error {
            return Err(AuthError::Rejected(
                payload.error_description.unwrap_or(error),
            ));
        }
        let value = payload
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Malformed("missing access_token".to_string()))?;
        let expires_in = payload
            .expires_in
            .ok_or_else(|| AuthError::Malformed("missing expires_in".to_string()))?;

        let expires_at = Utc::now() + ChronoDuration::seconds(expires_in);
        info!(%expires_at, "Acquired Graph access token");
        Ok(AccessToken { value, expires_at })
    }
}
