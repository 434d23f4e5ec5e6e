use thiserror::Error;

/// Failures surfaced by the token manager, the page fetchers and the
/// aggregation pipeline. Every failure is scoped to one request or load.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Twitch credentials are not configured: {0}")]
    AuthConfig(String),

    #[error("Token exchange rejected with status {status}: {body}")]
    UpstreamAuth { status: u16, body: String },

    #[error("Stream query rejected with status {status}: {body}")]
    UpstreamFetch { status: u16, body: String },

    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Error body relayed by the proxy endpoint, with the proxy's own kind.
    #[error("{message}")]
    Remote {
        status: u16,
        kind: String,
        message: String,
    },

    #[error("Load was superseded by a newer category selection")]
    Superseded,
}

impl DirectoryError {
    /// Machine-readable kind, used as the `error` field of proxy responses.
    pub fn kind(&self) -> &str {
        match self {
            DirectoryError::AuthConfig(_) => "auth_config",
            DirectoryError::UpstreamAuth { .. } => "upstream_auth",
            DirectoryError::UpstreamFetch { .. } => "upstream_fetch",
            DirectoryError::Network(_) => "network",
            DirectoryError::Decode(_) => "decode",
            DirectoryError::Remote { kind, .. } => kind,
            DirectoryError::Superseded => "superseded",
        }
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;
