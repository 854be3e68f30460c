//! Thin Microsoft Graph layer: authorization, retries and pagination.
//!
//! Every call asks the [`TokenProvider`] for a token and attaches it as a bearer header.
//! Response handling is uniform:
//!
//! - `2xx`: returned to the caller.
//! - `401`: the token is invalidated, re-acquired once and the call retried once; a second
//!   `401` becomes [`AuthError::Unauthorized`].
//! - `429` / `5xx` / transport failure: retried under the [`RetryPolicy`], honouring
//!   `Retry-After`; exhaustion becomes [`GraphError::Transient`].
//! - any other status: [`GraphError::Status`].
//!
//! Collection endpoints are exposed through [`GraphClient::paginate`], which follows
//! `@odata.nextLink` and yields the flattened `value` items as a lazy stream.

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::TokenProvider;
use crate::config::{RetryPolicy, Settings};
use crate::contract::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{AuthError, GraphError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Bearer,
    /// Pre-authenticated URLs such as `@microsoft.graph.downloadUrl`.
    None,
}

#[derive(Debug, Deserialize)]
struct CollectionPage {
    #[serde(default)]
    value: Vec<Value>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

pub struct GraphClient {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenProvider>,
    base_url: String,
    retry: RetryPolicy,
    timeout: Duration,
}

impl GraphClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<TokenProvider>,
        settings: &Settings,
    ) -> Self {
        Self {
            transport,
            tokens,
            base_url: settings.graph_base_url.trim_end_matches('/').to_string(),
            retry: settings.retry.clone(),
            timeout: Duration::from_secs(settings.http_timeout_secs),
        }
    }

    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    /// Absolute URL for `path` (relative to the Graph base, or already absolute) plus query `params`.
    pub fn url_for(&self, path: &str, params: &[(&str, &str)]) -> Result<String, GraphError> {
        let raw = if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };
        if params.is_empty() {
            return Ok(raw);
        }
        reqwest::Url::parse_with_params(&raw, params)
            .map(String::from)
            .map_err(|e| GraphError::Url(format!("{raw}: {e}")))
    }

    /// GET a single JSON document.
    pub async fn get_json(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, GraphError> {
        let url = self.url_for(path, params)?;
        let resp = self.execute(&url, Auth::Bearer).await?;
        serde_json::from_slice(&resp.body).map_err(|e| GraphError::Decode(e.to_string()))
    }

    /// GET raw bytes from an authenticated Graph endpoint (e.g. `/content`).
    pub async fn get_binary(&self, url: &str) -> Result<Vec<u8>, GraphError> {
        let url = self.url_for(url, &[])?;
        Ok(self.execute(&url, Auth::Bearer).await?.body)
    }

    /// GET raw bytes from a pre-authenticated download URL, without a bearer token.
    pub async fn get_binary_preauthenticated(&self, url: &str) -> Result<Vec<u8>, GraphError> {
        Ok(self.execute(url, Auth::None).await?.body)
    }

    /// Lazily walks a collection endpoint, following `@odata.nextLink` until exhausted.
    ///
    /// The stream is finite and not restartable; calling this again re-issues the first request.
    /// After the first error the stream ends.
    pub fn paginate(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> BoxStream<'_, Result<Value, GraphError>> {
        let first = match self.url_for(path, params) {
            Ok(url) => url,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        stream::try_unfold(Some(first), move |next| async move {
            let Some(url) = next else {
                return Ok::<_, GraphError>(None);
            };
            let resp = self.execute(&url, Auth::Bearer).await?;
            let page: CollectionPage = serde_json::from_slice(&resp.body)
                .map_err(|e| GraphError::Decode(e.to_string()))?;
            debug!(
                items = page.value.len(),
                more = page.next_link.is_some(),
                "Fetched collection page"
            );
            Ok::<_, GraphError>(Some((page.value, page.next_link)))
        })
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<Value, GraphError>)))
        .try_flatten()
        .boxed()
    }

    async fn execute(&self, url: &str, auth: Auth) -> Result<HttpResponse, GraphError> {
        let mut refreshed = false;
        let mut attempt = 0u32;

        loop {
            let token = match auth {
                Auth::Bearer => Some(self.tokens.get_token().await?),
                Auth::None => None,
            };
            let mut request = HttpRequest::get(url)
                .header("Accept", "application/json")
                .timeout(self.timeout);
            if let Some(token) = &token {
                request = request.bearer(&token.value);
            }

            let (status, retry_after) = match self.transport.send(request).await {
                Ok(resp) if resp.is_success() => return Ok(resp),
                Ok(resp) if resp.status == 401 => match token {
                    Some(rejected) if !refreshed => {
                        warn!("Graph API returned 401, refreshing token and retrying once");
                        self.tokens.invalidate(&rejected).await;
                        refreshed = true;
                        continue;
                    }
                    Some(_) => return Err(GraphError::Auth(AuthError::Unauthorized)),
                    None => {
                        return Err(GraphError::Status {
                            status: 401,
                            message: "pre-authenticated URL was rejected".to_string(),
                        })
                    }
                },
                Ok(resp) if resp.status == 429 || resp.status >= 500 => {
                    (Some(resp.status), resp.retry_after())
                }
                Ok(resp) => {
                    return Err(GraphError::Status {
                        status: resp.status,
                        message: error_message(&resp),
                    })
                }
                Err(e) => {
                    warn!(error = %e, "Graph request failed in transport");
                    (None, None)
                }
            };

            attempt += 1;
            if attempt >= self.retry.max_attempts {
                warn!(?status, attempts = attempt, "Giving up on Graph request");
                return Err(GraphError::Transient { status, attempts: attempt });
            }
            let delay = self.retry.delay_for(attempt, retry_after);
            warn!(
                ?status,
                attempt,
                max_attempts = self.retry.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Retrying Graph request"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Graph wraps failures as `{"error": {"code": .., "message": ..}}`.
fn error_message(resp: &HttpResponse) -> String {
    serde_json::from_slice::<Value>(&resp.body)
        .ok()
        .and_then(|v| {
            let err = v.get("error")?;
            let code = err.get("code").and_then(Value::as_str).unwrap_or("error");
            let message = err.get("message").and_then(Value::as_str).unwrap_or("");
            Some(format!("{code}: {message}"))
        })
        .unwrap_or_else(|| resp.body_text().chars().take(200).collect())
}
