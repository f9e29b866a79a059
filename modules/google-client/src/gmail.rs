//! Gmail API v1: search, read and mark messages.

use std::sync::Arc;

use serde::Deserialize;

use crate::auth::GoogleAuth;
use crate::error::{error_for_response, Result};
use crate::retry::{send_with_retry, RetryPolicy};

const GMAIL_API_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

/// Id pair returned by a message search.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    email_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullMessage {
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payload {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    body: Option<PayloadBody>,
    #[serde(default)]
    parts: Vec<Payload>,
}

#[derive(Debug, Deserialize)]
struct PayloadBody {
    #[serde(default)]
    data: Option<String>,
}

// ============================================================================
// GmailClient
// ============================================================================

pub struct GmailClient {
    auth: Arc<GoogleAuth>,
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl GmailClient {
    pub fn new(auth: Arc<GoogleAuth>) -> Self {
        Self {
            auth,
            http: reqwest::Client::new(),
            base_url: GMAIL_API_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Address of the authorized mailbox. Doubles as a connectivity check.
    pub async fn profile_email(&self) -> Result<String> {
        let token = self.auth.access_token().await?;
        let resp = send_with_retry(
            self.http
                .get(format!("{}/profile", self.base_url))
                .bearer_auth(token),
            &self.retry,
        )
        .await?;
        if !resp.status().is_success() {
            return Err(error_for_response(resp).await);
        }
        let profile: ProfileResponse = resp.json().await?;
        Ok(profile.email_address)
    }

    /// Messages matching a Gmail search query, newest first.
    pub async fn search(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>> {
        let token = self.auth.access_token().await?;
        let resp = send_with_retry(
            self.http
                .get(format!("{}/messages", self.base_url))
                .bearer_auth(token)
                .query(&[("q", query), ("maxResults", &max_results.to_string())]),
            &self.retry,
        )
        .await?;
        if !resp.status().is_success() {
            return Err(error_for_response(resp).await);
        }
        let list: MessageListResponse = resp.json().await?;
        tracing::debug!(query, found = list.messages.len(), "Gmail search");
        Ok(list.messages)
    }

    /// Decoded body text, `text/plain` preferred over `text/html`.
    /// `Ok(None)` when the message has no text part.
    pub async fn message_body(&self, message_id: &str) -> Result<Option<String>> {
        let token = self.auth.access_token().await?;
        let resp = send_with_retry(
            self.http
                .get(format!("{}/messages/{}", self.base_url, message_id))
                .bearer_auth(token)
                .query(&[("format", "full")]),
            &self.retry,
        )
        .await?;
        if !resp.status().is_success() {
            return Err(error_for_response(resp).await);
        }
        let message: FullMessage = resp.json().await?;
        let Some(payload) = message.payload else {
            return Ok(None);
        };
        Ok(find_body(&payload, "text/plain").or_else(|| find_body(&payload, "text/html")))
    }

    /// Remove the UNREAD label.
    pub async fn mark_read(&self, message_id: &str) -> Result<()> {
        let token = self.auth.access_token().await?;
        let resp = send_with_retry(
            self.http
                .post(format!("{}/messages/{}/modify", self.base_url, message_id))
                .bearer_auth(token)
                .json(&serde_json::json!({ "removeLabelIds": ["UNREAD"] })),
            &self.retry,
        )
        .await?;
        if !resp.status().is_success() {
            return Err(error_for_response(resp).await);
        }
        Ok(())
    }
}

fn find_body(payload: &Payload, mime: &str) -> Option<String> {
    // Single-part messages carry the body on the root with a text/* type.
    if payload.mime_type == mime {
        if let Some(text) = payload
            .body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .and_then(decode_url_safe_base64)
        {
            return Some(text);
        }
    }
    payload.parts.iter().find_map(|part| find_body(part, mime))
}

/// Gmail uses URL-safe base64; padding is present on some messages, absent on others.
fn decode_url_safe_base64(data: &str) -> Option<String> {
    use base64::Engine;
    let trimmed = data.trim_end_matches('=');
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(trimmed)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
