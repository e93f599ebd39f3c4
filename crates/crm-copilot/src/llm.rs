//! Language-model client.
//!
//! A single chat-completion round-trip against the OpenAI API. The
//! `LanguageModel` trait is the seam the pipeline mocks in tests; the real
//! implementation is a thin reqwest client with bearer auth. Single attempt,
//! no retry, transport-default timeout only.

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Result;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4";

/// One chat-completion request: a fixed system prompt plus a single user
/// turn. `json_only` constrains the reply to a single JSON object (used by
/// the classifier).
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub json_only: bool,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.7,
            json_only: false,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn json_only(mut self) -> Self {
        self.json_only = true;
        self
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model's reply text. Empty content comes back as an empty
    /// string; callers decide what to do with it.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

/// Chat-completions client.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let messages = vec![
            ApiMessage {
                role: "system",
                content: &request.system,
            },
            ApiMessage {
                role: "user",
                content: &request.user,
            },
        ];

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
        });
        if request.json_only {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error ({}): {}", status, text).into());
        }

        let parsed: ApiResponse = response.json().await?;
        Ok(parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}
