use serde::Deserialize;

/// Hunter wraps every payload in `{"data": ..., "meta": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrors {
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

/// Result of `GET /v2/domain-search`.
#[derive(Debug, Clone, Deserialize)]
pub struct DomainSearch {
    pub domain: Option<String>,
    pub organization: Option<String>,
    #[serde(default)]
    pub emails: Vec<HunterEmail>,
}

/// One address Hunter associates with the domain.
#[derive(Debug, Clone, Deserialize)]
pub struct HunterEmail {
    pub value: String,
    /// "personal" or "generic".
    #[serde(rename = "type")]
    pub email_type: Option<String>,
    #[serde(default)]
    pub confidence: u8,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
}

impl DomainSearch {
    /// First address in Hunter's own ranking.
    pub fn first_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .map(|e| e.value.trim())
            .find(|v| !v.is_empty())
    }
}
