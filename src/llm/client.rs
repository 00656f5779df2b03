//! OpenAI chat-completions client.

use crate::config::OpenAiConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Completion failures.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Invalid API key")]
    InvalidApiKey,
}

/// A text-completion oracle: system prompt + user content in, short text out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionOracle: Send + Sync {
    /// Returns the reply trimmed and lowercased.
    async fn complete(&self, system: &str, user: &str, temperature: f32)
        -> Result<String, LlmError>;
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI client with a fixed model and seed.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
    seed: u64,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            seed: config.seed,
        })
    }
}

#[async_trait]
impl CompletionOracle for OpenAiClient {
    #[instrument(skip(self, system, user), fields(model = %self.model))]
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            stream: false,
            seed: self.seed,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => LlmError::InvalidApiKey,
                429 => LlmError::RateLimited,
                _ => LlmError::Api(format!("Status {}: {}", status, body)),
            });
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        debug!(reply = %content, "Completion received");
        Ok(content.trim().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(&OpenAiConfig {
            api_key: "sk-test".to_string(),
            base_url: server.uri(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_request_carries_seed_and_temperature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "temperature": 0.5,
                "seed": 50,
                "stream": false,
                "messages": [
                    { "role": "system", "content": "be terse" },
                    { "role": "user", "content": "Ticker Symbol: AAPL News: up" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "  Yes\n" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .complete("be terse", "Ticker Symbol: AAPL News: up", 0.5)
            .await
            .unwrap();

        assert_eq!(reply, "yes");
    }

    #[tokio::test]
    async fn test_status_codes_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("s", "u", 1.0).await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited));
    }

    #[tokio::test]
    async fn test_empty_choices_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("s", "u", 1.0).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }
}
