use super::streaming::SseAccumulator;
use super::{ChatModel, ChatRequest};
use crate::config::ModelConfig;
use crate::error::CompletionError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for OpenAI-compatible chat-completion endpoints.
///
/// The API key is passed in explicitly; nothing is read from the
/// environment at call time.
#[derive(Clone)]
pub struct OpenAiClient {
    http_client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    streaming: bool,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("streaming", &self.streaming)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            streaming: false,
        }
    }

    /// Build a client from model settings and an already resolved key
    pub fn from_config(config: &ModelConfig, api_key: impl Into<String>) -> Self {
        Self::new(api_key)
            .with_base_url(&config.base_url)
            .with_timeout(Duration::from_secs(config.request_timeout_secs))
            .with_streaming(config.streaming)
    }

    /// Set a custom base URL (for Azure, proxies, local servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Reuse an existing reqwest client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Request streamed responses and accumulate them
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, body: &WireRequest<'_>) -> Result<reqwest::Response, CompletionError> {
        let response = self
            .http_client
            .post(self.completions_url())
            .timeout(self.timeout)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                ::log::warn!("Chat completion request failed: {}", e);
                CompletionError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            ::log::warn!("Chat completion API error {}: {}", status, error_text);
            return Err(CompletionError::Api(format!("{}: {}", status, error_text)));
        }
        Ok(response)
    }

    async fn complete_once(&self, request: &ChatRequest) -> Result<String, CompletionError> {
        let response = self
            .send(&WireRequest {
                request,
                stream: None,
            })
            .await?;

        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;
        if body.trim().is_empty() {
            return Err(CompletionError::Empty);
        }
        let raw: ChatResponseRaw =
            serde_json::from_str(&body).map_err(|e| CompletionError::Parse(e.to_string()))?;

        if let Some(usage) = &raw.usage {
            ::log::debug!(
                "Token usage: {} prompt, {} completion",
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }

        raw.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(CompletionError::Empty)
    }

    async fn complete_streamed(&self, request: &ChatRequest) -> Result<String, CompletionError> {
        let response = self
            .send(&WireRequest {
                request,
                stream: Some(true),
            })
            .await?;

        let mut stream = response.bytes_stream();
        let mut accumulator = SseAccumulator::new();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| CompletionError::Network(e.to_string()))?;
            if accumulator.push(&bytes)? {
                break;
            }
        }
        accumulator.finish()
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, CompletionError> {
        let start = std::time::Instant::now();

        let content = if self.streaming {
            self.complete_streamed(&request).await?
        } else {
            self.complete_once(&request).await?
        };

        ::log::debug!(
            "Chat completion with {} took {} ms",
            request.model,
            start.elapsed().as_millis()
        );

        if content.trim().is_empty() {
            return Err(CompletionError::Empty);
        }
        Ok(content)
    }
}

/// Request body as sent on the wire
#[derive(Serialize)]
struct WireRequest<'a> {
    #[serde(flatten)]
    request: &'a ChatRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HttpFixture, loopback_client};

    #[test]
    fn test_client_builder() {
        let client = OpenAiClient::new("sk-test")
            .with_base_url("https://custom.api.com/v1/")
            .with_streaming(true);

        assert_eq!(client.api_key, "sk-test");
        assert_eq!(client.base_url(), "https://custom.api.com/v1");
        assert_eq!(
            client.completions_url(),
            "https://custom.api.com/v1/chat/completions"
        );
        assert!(client.streaming);
    }

    #[test]
    fn test_from_config() {
        let config = ModelConfig {
            base_url: "http://localhost:11434/v1".to_string(),
            request_timeout_secs: 5,
            streaming: true,
            ..ModelConfig::default()
        };
        let client = OpenAiClient::from_config(&config, "key");
        assert_eq!(client.base_url(), "http://localhost:11434/v1");
        assert_eq!(client.timeout, Duration::from_secs(5));
        assert!(client.streaming);
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = OpenAiClient::new("sk-secret");
        assert!(!format!("{:?}", client).contains("sk-secret"));
    }

    #[test]
    fn test_wire_request_flattens() {
        let request = ChatRequest::system_user("m", "s", "u");
        let json = serde_json::to_value(WireRequest {
            request: &request,
            stream: Some(true),
        })
        .unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_null_content_parses() {
        let raw: ChatResponseRaw =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(raw.choices[0].message.content.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let client = OpenAiClient::new("k")
            .with_base_url("http://127.0.0.1:9/v1")
            .with_timeout(Duration::from_secs(2));
        let result = client.complete(ChatRequest::system_user("m", "s", "u")).await;
        assert!(matches!(result, Err(CompletionError::Network(_))));
    }

    async fn fixture_client(status: u16, content_type: &str, body: &str) -> (HttpFixture, OpenAiClient) {
        let server = HttpFixture::serve(status, content_type, body.to_string()).await;
        let client = OpenAiClient::new("sk-test")
            .with_http_client(loopback_client())
            .with_base_url(server.url("/v1"))
            .with_timeout(Duration::from_secs(5));
        (server, client)
    }

    #[tokio::test]
    async fn test_complete_reads_first_choice() {
        let (server, client) = fixture_client(
            200,
            "application/json",
            r#"{"choices":[{"message":{"role":"assistant","content":"Acme builds trucks."}}],
                "usage":{"prompt_tokens":12,"completion_tokens":4}}"#,
        )
        .await;

        let reply = client
            .complete(ChatRequest::system_user("gpt-4o-mini", "sys", "About Acme"))
            .await
            .unwrap();
        assert_eq!(reply, "Acme builds trucks.");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("post /v1/chat/completions http/1.1"));
        assert!(requests[0].contains("authorization: bearer sk-test"));
        assert!(requests[0].contains(r#""model":"gpt-4o-mini""#));
        assert!(!requests[0].contains(r#""stream""#));
    }

    #[tokio::test]
    async fn test_null_content_is_empty() {
        let (_server, client) = fixture_client(
            200,
            "application/json",
            r#"{"choices":[{"message":{"content":null}}]}"#,
        )
        .await;
        let result = client.complete(ChatRequest::system_user("m", "s", "u")).await;
        assert!(matches!(result, Err(CompletionError::Empty)));
    }

    #[tokio::test]
    async fn test_missing_choices_and_blank_body_are_empty() {
        let (_server, client) = fixture_client(200, "application/json", r#"{"choices":[]}"#).await;
        let result = client.complete(ChatRequest::system_user("m", "s", "u")).await;
        assert!(matches!(result, Err(CompletionError::Empty)));

        let (_server, client) = fixture_client(200, "application/json", "").await;
        let result = client.complete(ChatRequest::system_user("m", "s", "u")).await;
        assert!(matches!(result, Err(CompletionError::Empty)));
    }

    #[tokio::test]
    async fn test_whitespace_reply_is_empty() {
        let (_server, client) = fixture_client(
            200,
            "application/json",
            r#"{"choices":[{"message":{"content":"  \n "}}]}"#,
        )
        .await;
        let result = client.complete(ChatRequest::system_user("m", "s", "u")).await;
        assert!(matches!(result, Err(CompletionError::Empty)));
    }

    #[tokio::test]
    async fn test_error_status_is_api_error() {
        let (_server, client) = fixture_client(
            401,
            "application/json",
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
        )
        .await;
        match client.complete(ChatRequest::system_user("m", "s", "u")).await {
            Err(CompletionError::Api(message)) => {
                assert!(message.contains("401"));
                assert!(message.contains("Incorrect API key"));
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let (_server, client) = fixture_client(200, "application/json", "<html>gateway</html>").await;
        let result = client.complete(ChatRequest::system_user("m", "s", "u")).await;
        assert!(matches!(result, Err(CompletionError::Parse(_))));
    }

    #[tokio::test]
    async fn test_streamed_reply_is_accumulated() {
        let events = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Acme builds \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"trucks.\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let (server, client) = fixture_client(200, "text/event-stream", events).await;
        let reply = client
            .with_streaming(true)
            .complete(ChatRequest::system_user("m", "s", "u"))
            .await
            .unwrap();
        assert_eq!(reply, "Acme builds trucks.");
        assert!(server.requests()[0].contains(r#""stream":true"#));
    }
}
