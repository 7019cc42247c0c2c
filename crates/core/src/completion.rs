use crate::embeddings::{join_endpoint, DEFAULT_OLLAMA_URL};
use crate::error::CompletionError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_CHAT_MODEL: &str = "llama3.2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout: Duration,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.2,
            top_p: 0.8,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct SamplingOptions {
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: SamplingOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Non-streaming client for an Ollama-compatible `/api/chat` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaChat {
    client: Client,
    endpoint: Url,
    options: ChatOptions,
}

impl OllamaChat {
    pub fn new(options: ChatOptions) -> Result<Self, CompletionError> {
        let endpoint = join_endpoint(&options.base_url, "api/chat")?;
        let client = Client::builder().timeout(options.timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            options,
        })
    }
}

fn reply_from_body(body: &str) -> Result<String, CompletionError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|_| CompletionError::MissingContent)?;
    parsed
        .message
        .and_then(|message| message.content)
        .ok_or(CompletionError::MissingContent)
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        debug!(model = %self.options.model, messages = messages.len(), "requesting completion");

        let request = ChatRequest {
            model: &self.options.model,
            messages,
            stream: false,
            options: SamplingOptions {
                temperature: self.options.temperature,
                top_p: self.options.top_p,
            },
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    CompletionError::Timeout {
                        endpoint: self.endpoint.to_string(),
                    }
                } else {
                    CompletionError::Http(error)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CompletionError::Status {
                status: status.as_u16(),
                details: body,
            });
        }

        reply_from_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_matches_the_chat_wire_format() {
        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let request = ChatRequest {
            model: "llama3.2",
            messages: &messages,
            stream: false,
            options: SamplingOptions {
                temperature: 0.25,
                top_p: 0.75,
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "llama3.2");
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
        assert_eq!(value["options"]["temperature"], 0.25);
        assert_eq!(value["options"]["top_p"], 0.75);
    }

    #[test]
    fn reply_is_read_from_message_content() {
        let body = r#"{"model":"llama3.2","message":{"role":"assistant","content":"Plan the agenda first."},"done":true}"#;
        assert_eq!(reply_from_body(body).unwrap(), "Plan the agenda first.");
    }

    #[test]
    fn missing_content_is_an_error() {
        assert!(matches!(
            reply_from_body(r#"{"message":{"role":"assistant"}}"#),
            Err(CompletionError::MissingContent)
        ));
        assert!(matches!(
            reply_from_body("<html>gateway</html>"),
            Err(CompletionError::MissingContent)
        ));
    }

    #[tokio::test]
    async fn unreachable_chat_service_is_an_error() {
        let chat = OllamaChat::new(ChatOptions {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
            ..ChatOptions::default()
        })
        .unwrap();

        let result = chat.complete(&[ChatMessage::user("hello")]).await;
        assert!(result.is_err());
    }
}
