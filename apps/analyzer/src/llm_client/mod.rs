/// LLM Client — the single point of entry for all chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may call the model API directly.
/// The analysis pipeline talks to `ChatTransport`; `LlmClient` is the
/// production implementation against a DeepSeek (OpenAI-compatible) endpoint.
///
/// This client makes exactly one HTTP call per `complete`. Retrying is the
/// orchestrator's job, not the transport's.
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmConfig;

pub mod prompts;

const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key rejected (status {status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Insufficient account balance (status {status}): {message}")]
    InsufficientBalance { status: u16, message: String },

    #[error("Rate limited by provider: {message}")]
    RateLimited { message: String },

    #[error("Could not reach the model API: {0}")]
    Transport(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Could not decode the API response: {0}")]
    Decode(String),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// One chat-completion round trip: system + user prompt in, reply text out.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Extracts the reply text of the first choice, if it is non-empty.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// The chat-completion client used by the analysis pipeline.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatTransport for LlmClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request_body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: TEMPERATURE,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            return Err(classify_status(status, &body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        if let Some(usage) = &chat.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        chat.text()
            .map(str::to_owned)
            .ok_or(LlmError::EmptyContent)
    }
}

/// Maps a non-2xx response onto a semantic error kind.
///
/// Priority: auth, then billing, then rate limit, then everything else.
/// The body is inspected too because some gateways wrap provider failures
/// in a generic status.
pub fn classify_status(status: StatusCode, body: &str) -> LlmError {
    let code = status.as_u16();
    let message = provider_message(body);
    let lowered = body.to_lowercase();

    if code == 401 || lowered.contains("unauthorized") {
        LlmError::Unauthorized {
            status: code,
            message,
        }
    } else if code == 402 || lowered.contains("insufficient balance") {
        LlmError::InsufficientBalance {
            status: code,
            message,
        }
    } else if code == 429 {
        LlmError::RateLimited { message }
    } else {
        LlmError::Api {
            status: code,
            message,
        }
    }
}

/// Prefers the provider's `error.message`, falling back to the raw body.
fn provider_message(body: &str) -> String {
    let message = serde_json::from_str::<ProviderError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    if message.is_empty() {
        "unknown error".to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> StatusCode {
        StatusCode::from_u16(code).unwrap()
    }

    #[test]
    fn test_classify_401_is_unauthorized() {
        let err = classify_status(status(401), r#"{"error":{"message":"bad key"}}"#);
        assert!(matches!(err, LlmError::Unauthorized { status: 401, ref message } if message == "bad key"));
    }

    #[test]
    fn test_classify_unauthorized_body_wins_over_status() {
        let err = classify_status(status(400), "Unauthorized request");
        assert!(matches!(err, LlmError::Unauthorized { status: 400, .. }));
    }

    #[test]
    fn test_classify_402_is_billing() {
        let err = classify_status(status(402), "");
        assert!(matches!(err, LlmError::InsufficientBalance { status: 402, .. }));
    }

    #[test]
    fn test_classify_insufficient_balance_body() {
        let body = r#"{"error":{"message":"Insufficient Balance"}}"#;
        let err = classify_status(status(400), body);
        assert!(matches!(err, LlmError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_classify_auth_before_billing() {
        let err = classify_status(status(402), "unauthorized: insufficient balance");
        assert!(matches!(err, LlmError::Unauthorized { .. }));
    }

    #[test]
    fn test_classify_429_is_rate_limited() {
        let err = classify_status(status(429), "slow down");
        assert!(matches!(err, LlmError::RateLimited { .. }));
    }

    #[test]
    fn test_classify_500_is_api_error_with_raw_body() {
        let err = classify_status(status(500), "upstream exploded");
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_body_gets_placeholder_message() {
        let err = classify_status(status(503), "   ");
        assert!(err.to_string().contains("unknown error"));
    }

    #[test]
    fn test_response_text_reads_first_choice() {
        let json = r#"{"choices":[{"message":{"content":"{\"a\":1}"}}],"usage":{"prompt_tokens":3,"completion_tokens":4}}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_response_text_empty_content_is_none() {
        let json = r#"{"choices":[{"message":{"content":"  "}}]}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), None);

        let json = r#"{"choices":[]}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), None);
    }

    #[test]
    fn test_request_body_wire_shape() {
        let body = ChatRequest {
            model: "deepseek-chat",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "sys",
                },
                ChatMessage {
                    role: "user",
                    content: "usr",
                },
            ],
            temperature: TEMPERATURE,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "deepseek-chat");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "usr");
        assert_eq!(value["response_format"]["type"], "json_object");
        assert!((value["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    mod wire {
        use std::net::SocketAddr;
        use std::time::Duration;

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;
        use tokio::task::JoinHandle;

        use super::super::*;

        fn client_for(addr: SocketAddr) -> LlmClient {
            let config = LlmConfig {
                api_key: "sk-test".to_string(),
                api_url: format!("http://{addr}/v1/chat/completions"),
                model: "deepseek-chat".to_string(),
                token_limit: 128_000,
                request_timeout: Duration::from_secs(5),
                max_attempts: 3,
            };
            LlmClient::new(&config).unwrap()
        }

        /// Serves a single canned HTTP response and hands back the raw request.
        async fn serve_once(
            status_line: &'static str,
            body: &'static str,
        ) -> (SocketAddr, JoinHandle<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();

            let handle = tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                    if request_complete(&request) {
                        break;
                    }
                }

                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
                String::from_utf8_lossy(&request).into_owned()
            });

            (addr, handle)
        }

        fn request_complete(raw: &[u8]) -> bool {
            let text = String::from_utf8_lossy(raw);
            let Some(header_end) = text.find("\r\n\r\n") else {
                return false;
            };
            let content_length = text[..header_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            raw.len() >= header_end + 4 + content_length
        }

        fn request_body(raw: &str) -> serde_json::Value {
            let (_, body) = raw.split_once("\r\n\r\n").unwrap();
            serde_json::from_str(body).unwrap()
        }

        #[tokio::test]
        async fn test_complete_sends_bearer_and_json_body() {
            let (addr, server) = serve_once(
                "200 OK",
                r#"{"choices":[{"message":{"content":"{\"a\":1}"}}],"usage":{"prompt_tokens":3,"completion_tokens":4}}"#,
            )
            .await;

            let reply = client_for(addr).complete("sys", "usr").await.unwrap();
            assert_eq!(reply, "{\"a\":1}");

            let raw = server.await.unwrap();
            assert!(raw.starts_with("POST /v1/chat/completions"));
            assert!(raw.to_lowercase().contains("authorization: bearer sk-test"));

            let body = request_body(&raw);
            assert_eq!(body["model"], "deepseek-chat");
            assert_eq!(body["messages"][0]["role"], "system");
            assert_eq!(body["messages"][0]["content"], "sys");
            assert_eq!(body["messages"][1]["role"], "user");
            assert_eq!(body["messages"][1]["content"], "usr");
            assert_eq!(body["response_format"]["type"], "json_object");
        }

        #[tokio::test]
        async fn test_blank_content_is_empty_content() {
            let (addr, _server) =
                serve_once("200 OK", r#"{"choices":[{"message":{"content":"   "}}]}"#).await;
            let err = client_for(addr).complete("sys", "usr").await.unwrap_err();
            assert!(matches!(err, LlmError::EmptyContent));
        }

        #[tokio::test]
        async fn test_missing_content_is_empty_content() {
            let (addr, _server) = serve_once("200 OK", r#"{"choices":[{"message":{}}]}"#).await;
            let err = client_for(addr).complete("sys", "usr").await.unwrap_err();
            assert!(matches!(err, LlmError::EmptyContent));
        }

        #[tokio::test]
        async fn test_undecodable_success_body_is_decode_error() {
            let (addr, _server) = serve_once("200 OK", "<html>gateway</html>").await;
            let err = client_for(addr).complete("sys", "usr").await.unwrap_err();
            assert!(matches!(err, LlmError::Decode(_)));
        }

        #[tokio::test]
        async fn test_error_status_is_classified() {
            let (addr, _server) = serve_once(
                "402 Payment Required",
                r#"{"error":{"message":"Insufficient Balance"}}"#,
            )
            .await;
            let err = client_for(addr).complete("sys", "usr").await.unwrap_err();
            assert!(matches!(
                err,
                LlmError::InsufficientBalance { status: 402, ref message } if message == "Insufficient Balance"
            ));
        }

        #[tokio::test]
        async fn test_refused_connection_is_transport_error() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);

            let err = client_for(addr).complete("sys", "usr").await.unwrap_err();
            assert!(matches!(err, LlmError::Transport(_)));
        }
    }
}
