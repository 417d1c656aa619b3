use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("missing configuration: {0}")]
    Configuration(String),

    #[error("authorization required; obtain a code at: {authorize_url}")]
    AuthRequired { authorize_url: String },

    #[error("token endpoint returned {status}: {body}")]
    TokenExchange {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unexpected status {status} from {url}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unexpected response shape: {0}")]
    ApiShape(&'static str),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}
