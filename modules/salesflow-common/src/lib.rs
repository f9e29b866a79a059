pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, SmtpConfig};
pub use error::SalesflowError;
pub use types::*;
