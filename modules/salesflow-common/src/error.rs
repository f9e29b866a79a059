use thiserror::Error;

#[derive(Error, Debug)]
pub enum SalesflowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lead store error: {0}")]
    Store(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{service} is not configured (set {key})")]
    NotConfigured {
        service: &'static str,
        key: &'static str,
    },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
