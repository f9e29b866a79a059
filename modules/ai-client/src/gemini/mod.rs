pub(crate) mod types;

use tracing::debug;

use crate::error::{AiError, Result};
use types::{GenerateContentRequest, GenerateContentResponse};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_FLASH_MODEL: &str = "gemini-2.5-flash";

// =============================================================================
// Gemini
// =============================================================================

/// Google Gemini `generateContent` client.
#[derive(Clone)]
pub struct Gemini {
    api_key: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
    http: reqwest::Client,
}

impl Gemini {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_API_URL.to_string(),
            temperature: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Generate text for a single user prompt.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = GenerateContentRequest::user_prompt(prompt, self.temperature);

        debug!(model = %self.model, "Gemini generateContent request");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateContentResponse = response.json().await?;
        body.text().ok_or(AiError::EmptyResponse("gemini"))
    }
}
