use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserSessionError>;

#[derive(Debug, Error)]
pub enum BrowserSessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No Chrome profile signed in as {0}")]
    ProfileNotFound(String),

    #[error("No free debugging port in {start}..{end}")]
    NoFreePort { start: u16, end: u16 },

    #[error("Failed to launch Chrome: {0}")]
    Launch(String),

    #[error("Debugging endpoint {endpoint} unreachable after {attempts} attempts")]
    DebuggerUnreachable { endpoint: String, attempts: u32 },

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error("Timed out loading {0}")]
    Timeout(String),
}

impl From<chromiumoxide::error::CdpError> for BrowserSessionError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserSessionError::Cdp(err.to_string())
    }
}

impl From<serde_json::Error> for BrowserSessionError {
    fn from(err: serde_json::Error) -> Self {
        BrowserSessionError::Parse(err.to_string())
    }
}
