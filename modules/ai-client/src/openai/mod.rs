mod client;
pub(crate) mod types;

use crate::error::{AiError, Result};

use client::{OpenAiClient, OPENAI_API_URL};

/// DeepSeek serves the OpenAI chat-completions wire format.
pub const DEEPSEEK_API_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT_MODEL: &str = "deepseek-chat";

// =============================================================================
// OpenAi
// =============================================================================

/// Chat-completions client for OpenAI and any provider speaking its protocol.
#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_API_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// DeepSeek chat model on its OpenAI-compatible endpoint.
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self::new(api_key, DEEPSEEK_CHAT_MODEL).with_base_url(DEEPSEEK_API_URL)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn client(&self) -> OpenAiClient {
        OpenAiClient::new(self.http.clone(), &self.api_key, &self.base_url)
    }

    /// Single user-turn completion, no system message.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let request = types::ChatRequest::new(&self.model).message(types::WireMessage::user(prompt));

        self.client()
            .chat(&request)
            .await?
            .first_content()
            .ok_or(AiError::EmptyResponse("chat completion"))
    }
}
