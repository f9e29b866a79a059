use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GoogleApiError>;

#[derive(Debug, Error)]
pub enum GoogleApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Token expired or revoked")]
    AuthExpired,

    #[error("Token not found at {0}; authorize the account and save token.json first")]
    TokenNotFound(PathBuf),

    #[error("Invalid credentials file {path}: {reason}")]
    InvalidCredentials { path: PathBuf, reason: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for GoogleApiError {
    fn from(err: reqwest::Error) -> Self {
        GoogleApiError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for GoogleApiError {
    fn from(err: serde_json::Error) -> Self {
        GoogleApiError::Parse(err.to_string())
    }
}

/// Map a non-success response into an error, consuming the body.
pub(crate) async fn error_for_response(resp: reqwest::Response) -> GoogleApiError {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return GoogleApiError::AuthExpired;
    }
    let message = resp.text().await.unwrap_or_default();
    GoogleApiError::Api {
        status: status.as_u16(),
        message,
    }
}
