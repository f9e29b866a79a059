//! Google REST clients for the reply-review and scheduling stages.
//!
//! - auth: token.json load + refresh (Python google-auth compatible)
//! - gmail: Gmail API v1 (search, full body, mark read)
//! - calendar: Calendar API v3 (window listing, event insert with Meet)

pub mod auth;
pub mod calendar;
pub mod error;
pub mod gmail;
pub mod retry;

pub use auth::{is_token_expired, ClientCredentials, GoogleAuth, GoogleToken, SCOPES};
pub use calendar::{CalendarClient, CalendarEvent, EventTime, NewEvent};
pub use error::{GoogleApiError, Result};
pub use gmail::{GmailClient, MessageRef};
pub use retry::{send_with_retry, RetryPolicy};
