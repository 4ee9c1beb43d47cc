//! Completion backend for any endpoint implementing the OpenAI Chat
//! Completions API (OpenRouter by default).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::completion::{CompletionClient, CompletionRequest};
use crate::error::PlanningFailure;

const PROVIDER_NAME: &str = "open_ai_compatible";

pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: String,
        model: String,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, PlanningFailure> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlanningFailure::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            model,
            api_key,
            timeout,
        })
    }

    /// `base_url` already carries the API version (e.g. `.../api/v1`).
    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

fn truncate(text: &str) -> String {
    text.chars().take(200).collect()
}

/// Map a completed HTTP exchange to completion text.
fn parse_completion(status: u16, body: &str) -> Result<String, PlanningFailure> {
    match status {
        200..=299 => {}
        401 | 403 => {
            return Err(PlanningFailure::Service(format!(
                "{PROVIDER_NAME}: authentication failed"
            )))
        }
        429 => {
            return Err(PlanningFailure::Service(format!(
                "{PROVIDER_NAME}: rate limited"
            )))
        }
        _ => {
            return Err(PlanningFailure::Service(format!(
                "{PROVIDER_NAME}: HTTP {status}: {}",
                truncate(body)
            )))
        }
    }

    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        PlanningFailure::Malformed(format!("JSON parse error: {e}. Raw: {}", truncate(body)))
    })?;

    if let Some(error) = parsed.error {
        return Err(PlanningFailure::Service(format!(
            "{PROVIDER_NAME}: {}",
            error.message
        )));
    }

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| PlanningFailure::Malformed("Completion had no content".to_string()))
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, PlanningFailure> {
        let url = self.api_url("chat/completions");
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
        };

        debug!(url = %url, model = %self.model, "Sending completion request");

        let http_request = self.add_auth_header(self.client.post(&url).json(&body));
        let response = http_request.send().await.map_err(|e| {
            warn!(error = %e, "Completion request failed");
            if e.is_timeout() {
                PlanningFailure::Timeout(self.timeout)
            } else {
                PlanningFailure::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| PlanningFailure::Network(format!("Failed to read response body: {e}")))?;

        debug!(status, "Completion response received");
        parse_completion(status, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one HTTP response on a random local port.
    async fn serve_once(status: u16, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if buf.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status} Test\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/api/v1/")
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You plan queries.".to_string(),
            user_prompt: "How many jobs at MIT?".to_string(),
            temperature: 0.3,
        }
    }

    fn client(base_url: String) -> OpenAiCompatibleClient {
        OpenAiCompatibleClient::new(
            base_url,
            "test-model".to_string(),
            Some(SecretString::from("sk-test".to_string())),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn api_url_joins_without_double_slash() {
        let c = client("https://openrouter.ai/api/v1/".to_string());
        assert_eq!(
            c.api_url("/chat/completions"),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn parse_success_body() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"answer\":\"hi\"}"}}]}"#;
        assert_eq!(parse_completion(200, body).unwrap(), r#"{"answer":"hi"}"#);
    }

    #[test]
    fn parse_status_errors() {
        assert!(matches!(
            parse_completion(401, ""),
            Err(PlanningFailure::Service(m)) if m.contains("authentication")
        ));
        assert!(matches!(
            parse_completion(429, ""),
            Err(PlanningFailure::Service(m)) if m.contains("rate limited")
        ));
        assert!(matches!(
            parse_completion(503, "model unavailable"),
            Err(PlanningFailure::Service(m)) if m.contains("503") && m.contains("model unavailable")
        ));
    }

    #[test]
    fn parse_error_object_in_success_body() {
        let body = r#"{"error":{"message":"quota exceeded","code":402}}"#;
        assert_eq!(
            parse_completion(200, body),
            Err(PlanningFailure::Service(format!(
                "{PROVIDER_NAME}: quota exceeded"
            )))
        );
    }

    #[test]
    fn parse_malformed_bodies() {
        assert!(matches!(
            parse_completion(200, "<html>"),
            Err(PlanningFailure::Malformed(_))
        ));
        assert!(matches!(
            parse_completion(200, r#"{"choices":[]}"#),
            Err(PlanningFailure::Malformed(_))
        ));
        assert!(matches!(
            parse_completion(200, r#"{"choices":[{"message":{"content":"  "}}]}"#),
            Err(PlanningFailure::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn complete_against_local_server() {
        let url = serve_once(
            200,
            r#"{"choices":[{"message":{"content":"There are 12 postings."}}]}"#,
        )
        .await;
        let text = client(url).complete(&request()).await.unwrap();
        assert_eq!(text, "There are 12 postings.");
    }

    #[tokio::test]
    async fn rate_limit_from_server_is_service_failure() {
        let url = serve_once(429, r#"{"error":{"message":"slow down"}}"#).await;
        let err = client(url).complete(&request()).await.unwrap_err();
        assert_eq!(err.kind(), "service");
    }

    #[tokio::test]
    async fn connection_refused_is_network_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = client(format!("http://{addr}/v1"))
            .complete(&request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "network");
    }
}
