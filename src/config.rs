use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ConfigError;

pub const TENANT_ID: &str = "TENANT_ID";
pub const CLIENT_ID: &str = "CLIENT_ID";
pub const CLIENT_SECRET: &str = "CLIENT_SECRET";
pub const SITE_ID: &str = "MS_SP_ID";

/// App-only identity and the SharePoint site it scrapes.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub site_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("site_id", &self.site_id)
            .finish()
    }
}

impl Credentials {
    /// Resolves each variable through `lookup`; blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVar(key))
        };

        Ok(Credentials {
            tenant_id: required(TENANT_ID)?,
            client_id: required(CLIENT_ID)?,
            client_secret: required(CLIENT_SECRET)?,
            site_id: required(SITE_ID)?,
        })
    }
}

/// Bounded retry for rate limiting (429), server errors (5xx) and transport failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries immediately; used by tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay before the attempt following `attempt` (1-based). A server-provided
    /// `Retry-After` wins over exponential backoff; both are clamped to `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let max = Duration::from_millis(self.max_delay_ms);
        let backoff = retry_after.unwrap_or_else(|| {
            let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
            Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
        });
        backoff.min(max)
    }
}

/// Tunables with defaults; everything here is optional in the YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub token_refresh_margin_secs: i64,
    pub retry: RetryPolicy,
    pub page_size: u32,
    pub skip_existing: bool,
    pub authority_host: String,
    pub graph_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data"),
            http_timeout_secs: 30,
            token_refresh_margin_secs: 60,
            retry: RetryPolicy::default(),
            page_size: 200,
            skip_existing: false,
            authority_host: "https://login.microsoftonline.com".to_string(),
            graph_base_url: "https://graph.microsoft.com/v1.0".to_string(),
        }
    }
}

impl Settings {
    pub fn pages_dir(&self) -> PathBuf {
        self.output_dir.join("pages")
    }

    pub fn files_dir(&self) -> PathBuf {
        self.output_dir.join("files")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "retry.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "http_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.token_refresh_margin_secs < 0 {
            return Err(ConfigError::Invalid {
                key: "token_refresh_margin_secs",
                reason: "must not be negative".to_string(),
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "page_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Everything a run needs: who we are and how to behave.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub settings: Settings,
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            output_dir = %self.settings.output_dir.display(),
            site_id = %self.credentials.site_id,
            max_attempts = self.settings.retry.max_attempts,
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}
