//! OAuth token persistence and refresh.
//!
//! The token file format is the one written by Google's Python auth library
//! (`token` + `refresh_token` + `client_id` + `expiry`), so an authorization
//! done with any of Google's installed-app quickstarts can be reused here.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{GoogleApiError, Result};

/// Scopes the pipeline needs: reading/modifying mail and writing calendar events.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/calendar",
];

// ============================================================================
// Token + credentials file shapes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleToken {
    #[serde(alias = "access_token")]
    pub token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// `credentials.json` for a Desktop App OAuth client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientCredentials {
    pub installed: InstalledAppCredentials,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstalledAppCredentials {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub token_uri: String,
}

impl ClientCredentials {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| GoogleApiError::InvalidCredentials {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Expired, unparseable, or within a minute of expiry.
pub fn is_token_expired(token: &GoogleToken) -> bool {
    let Some(expiry) = token.expiry.as_deref() else {
        return true;
    };
    match parse_expiry(expiry) {
        Some(at) => at <= Utc::now() + chrono::Duration::seconds(60),
        None => true,
    }
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Python sometimes writes a naive UTC timestamp.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

// ============================================================================
// GoogleAuth
// ============================================================================

/// Holds the current token and refreshes it on demand.
pub struct GoogleAuth {
    token_path: PathBuf,
    token: Mutex<GoogleToken>,
    http: reqwest::Client,
}

impl GoogleAuth {
    /// Load `token.json`, backfilling the client secret from `credentials.json`
    /// when the token was saved without one.
    pub fn load(token_path: impl Into<PathBuf>, credentials_path: Option<&Path>) -> Result<Self> {
        let token_path = token_path.into();
        if !token_path.exists() {
            return Err(GoogleApiError::TokenNotFound(token_path));
        }
        let content = std::fs::read_to_string(&token_path)?;
        let mut token: GoogleToken = serde_json::from_str(&content)?;

        if let Some(path) = credentials_path.filter(|p| p.exists()) {
            let creds = ClientCredentials::load(path)?;
            if token.client_secret.is_none() && creds.installed.client_id == token.client_id {
                token.client_secret = creds.installed.client_secret;
            }
        }

        let missing: Vec<&str> = SCOPES
            .iter()
            .copied()
            .filter(|s| !token.scopes.is_empty() && !token.scopes.iter().any(|t| t == s))
            .collect();
        if !missing.is_empty() {
            tracing::warn!(?missing, "Google token lacks scopes; some calls may be rejected");
        }

        Ok(Self::from_token(token, token_path))
    }

    pub fn from_token(token: GoogleToken, token_path: impl Into<PathBuf>) -> Self {
        Self {
            token_path: token_path.into(),
            token: Mutex::new(token),
            http: reqwest::Client::new(),
        }
    }

    /// A valid bearer token, refreshing and persisting it first if needed.
    pub async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if is_token_expired(&guard) {
            let refreshed = self.refresh(&guard).await?;
            self.save(&refreshed)?;
            *guard = refreshed;
        }
        Ok(guard.token.clone())
    }

    async fn refresh(&self, token: &GoogleToken) -> Result<GoogleToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or(GoogleApiError::AuthExpired)?;

        let mut form = vec![
            ("client_id", token.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        if let Some(secret) = token.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let resp = self.http.post(&token.token_uri).form(&form).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            let lowered = body.to_lowercase();
            if (status.as_u16() == 400 || status.as_u16() == 401)
                && lowered.contains("invalid_grant")
            {
                return Err(GoogleApiError::AuthExpired);
            }
            return Err(GoogleApiError::RefreshFailed(format!("HTTP {status}: {body}")));
        }

        let parsed: serde_json::Value = serde_json::from_str(&body)?;
        let access_token = parsed["access_token"]
            .as_str()
            .ok_or_else(|| GoogleApiError::RefreshFailed("no access_token in response".into()))?;
        let expires_in = parsed["expires_in"].as_i64().unwrap_or(3600);

        let mut refreshed = token.clone();
        refreshed.token = access_token.to_string();
        refreshed.expiry = Some((Utc::now() + chrono::Duration::seconds(expires_in)).to_rfc3339());

        info!("Refreshed Google access token");
        Ok(refreshed)
    }

    fn save(&self, token: &GoogleToken) -> Result<()> {
        let json = serde_json::to_string_pretty(token)?;
        std::fs::write(&self.token_path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token(expiry: Option<String>, token_uri: &str) -> GoogleToken {
        GoogleToken {
            token: "ya29.old".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            token_uri: token_uri.to_string(),
            client_id: "client.apps.googleusercontent.com".to_string(),
            client_secret: Some("secret".to_string()),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            expiry,
            account: None,
        }
    }

    #[test]
    fn python_token_format_parses() {
        let json = r#"{
            "token": "ya29.python",
            "refresh_token": "1//r",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "cid",
            "client_secret": "s",
            "scopes": ["https://www.googleapis.com/auth/calendar"],
            "expiry": "2030-02-08T12:00:00.000000Z"
        }"#;
        let parsed: GoogleToken = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.token, "ya29.python");
        assert!(!is_token_expired(&parsed));
    }

    #[test]
    fn naive_and_missing_expiry() {
        let uri = "https://oauth2.googleapis.com/token";
        assert!(is_token_expired(&token(None, uri)));
        assert!(is_token_expired(&token(Some("2001-01-01T00:00:00".into()), uri)));
        assert!(!is_token_expired(&token(Some("2099-01-01T00:00:00.5".into()), uri)));
        assert!(is_token_expired(&token(Some("garbage".into()), uri)));
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.new",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let auth = GoogleAuth::from_token(
            token(None, &format!("{}/token", server.uri())),
            &token_path,
        );

        assert_eq!(auth.access_token().await.unwrap(), "ya29.new");
        // Second call uses the cached, now-valid token.
        assert_eq!(auth.access_token().await.unwrap(), "ya29.new");

        let saved: GoogleToken =
            serde_json::from_str(&std::fs::read_to_string(&token_path).unwrap()).unwrap();
        assert_eq!(saved.token, "ya29.new");
        assert!(!is_token_expired(&saved));
    }

    #[tokio::test]
    async fn revoked_refresh_token_is_auth_expired() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let auth = GoogleAuth::from_token(
            token(None, &format!("{}/token", server.uri())),
            dir.path().join("token.json"),
        );
        assert!(matches!(
            auth.access_token().await,
            Err(GoogleApiError::AuthExpired)
        ));
    }

    #[test]
    fn load_reports_missing_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("token.json");
        assert!(matches!(
            GoogleAuth::load(&missing, None),
            Err(GoogleApiError::TokenNotFound(_))
        ));
    }

    #[test]
    fn load_backfills_client_secret_from_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let creds_path = dir.path().join("credentials.json");
        let mut t = token(Some("2099-01-01T00:00:00Z".into()), "https://oauth2.googleapis.com/token");
        t.client_secret = None;
        std::fs::write(&token_path, serde_json::to_string(&t).unwrap()).unwrap();
        std::fs::write(
            &creds_path,
            r#"{"installed":{"client_id":"client.apps.googleusercontent.com","client_secret":"from-file","token_uri":"https://oauth2.googleapis.com/token"}}"#,
        )
        .unwrap();

        let auth = GoogleAuth::load(&token_path, Some(&creds_path)).unwrap();
        let guard = auth.token.try_lock().unwrap();
        assert_eq!(guard.client_secret.as_deref(), Some("from-file"));
    }
}
