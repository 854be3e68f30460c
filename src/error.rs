//! Error types for sharepoint-scrape.
//!
//! Fatal conditions (`ConfigError`, `AuthError`) abort a run. `GraphError` is scoped to a single
//! remote call, `ItemError` to a single page or file; both are recovered at the smallest
//! enclosing unit and counted in the run summary.

use thiserror::Error;

/// Missing or invalid configuration, detected before any network call.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("required environment variable {0} is missing or empty")]
    MissingVar(&'static str),

    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config YAML: {0}")]
    Parse(String),

    #[error("invalid configuration value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Token acquisition or refresh failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("token endpoint rejected the client credentials: {0}")]
    Rejected(String),

    #[error("token endpoint unreachable after {attempts} attempts: {reason}")]
    Unreachable { attempts: u32, reason: String },

    #[error("malformed token response: {0}")]
    Malformed(String),

    #[error("Graph API rejected a freshly acquired token (401)")]
    Unauthorized,
}

/// Failure below HTTP semantics: connect, timeout, body read.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// Outcome of a single Graph call that did not succeed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Graph API still failing after {attempts} attempts (last status {status:?})")]
    Transient { status: Option<u16>, attempts: u32 },

    #[error("Graph API error (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("invalid request URL: {0}")]
    Url(String),

    #[error("failed to decode Graph response: {0}")]
    Decode(String),
}

/// Text extraction failure for a single page body.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("text extraction failed: {0}")]
pub struct ExtractError(pub String);

/// A single page or file that could not be produced.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("filesystem error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ItemError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        ItemError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Conditions that move a run into the `Failed` state.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("failed to initialise HTTP client: {0}")]
    Http(#[from] TransportError),

    #[error("could not resolve {what}: {source}")]
    Unresolved {
        what: String,
        #[source]
        source: GraphError,
    },
}

impl From<GraphError> for RunError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::Auth(auth) => RunError::Auth(auth),
            other => RunError::Unresolved {
                what: "Graph resource".to_string(),
                source: other,
            },
        }
    }
}
