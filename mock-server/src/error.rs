use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid stub: {0}")]
    InvalidStub(String),

    #[error("admin response body: {0}")]
    Body(#[from] axum::Error),

    #[error("failed to load mappings: {0}")]
    Mappings(#[from] serde_json::Error),
}
