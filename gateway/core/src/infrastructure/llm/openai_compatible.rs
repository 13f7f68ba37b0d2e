// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

// OpenAI-compatible Chat Completions Adapter
//
// Anti-Corruption Layer for every vendor speaking the OpenAI
// `/chat/completions` format (OpenAI, Groq, DeepSeek).

use crate::domain::llm::{ChatProvider, GenerationOptions, LLMError, ProviderKind, ProviderOutcome};
use crate::domain::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub struct OpenAiCompatibleAdapter {
    client: reqwest::Client,
    kind: ProviderKind,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Usage is informational; partial objects from compatible servers must still decode.
#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}

impl OpenAiCompatibleAdapter {
    pub fn new(
        kind: ProviderKind,
        endpoint: String,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self, LLMError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LLMError::Network(e.to_string()))?;

        Ok(Self {
            client,
            kind,
            endpoint,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model,
            timeout,
        })
    }

    async fn request(
        &self,
        api_key: &str,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<String, LLMError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: false,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 401 || status == 403 {
                LLMError::Authentication(error_text)
            } else if status == 429 {
                LLMError::RateLimit
            } else if status == 404 {
                LLMError::ModelNotFound(self.model.clone())
            } else {
                LLMError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| self.decode_error(e))?;

        if let Some(usage) = &body.usage {
            debug!(
                provider = %self.kind,
                prompt_tokens = ?usage.prompt_tokens,
                completion_tokens = ?usage.completion_tokens,
                "completion usage"
            );
        }

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LLMError::Provider("No response from model".into()))
    }

    fn transport_error(&self, e: reqwest::Error) -> LLMError {
        if e.is_timeout() {
            LLMError::Timeout(self.timeout)
        } else {
            LLMError::Network(e.to_string())
        }
    }

    fn decode_error(&self, e: reqwest::Error) -> LLMError {
        if e.is_timeout() {
            LLMError::Timeout(self.timeout)
        } else {
            LLMError::Provider(format!("Failed to parse response: {}", e))
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> ProviderOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return ProviderOutcome::Unavailable;
        };
        ProviderOutcome::from_result(self.request(api_key, messages, options).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn adapter(url: String, key: Option<&str>) -> OpenAiCompatibleAdapter {
        adapter_with_timeout(url, key, Duration::from_secs(5))
    }

    fn adapter_with_timeout(
        url: String,
        key: Option<&str>,
        timeout: Duration,
    ) -> OpenAiCompatibleAdapter {
        OpenAiCompatibleAdapter::new(
            ProviderKind::OpenAi,
            url,
            key.map(str::to_string),
            "gpt-4o-mini".to_string(),
            timeout,
        )
        .unwrap()
    }

    fn conversation() -> Vec<Message> {
        vec![Message::system("كن مفيداً"), Message::user("مرحبا")]
    }

    fn completion_body(content: &str) -> String {
        json!({
            "choices": [{ "message": { "role": "assistant", "content": content }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15 }
        })
        .to_string()
    }

    #[tokio::test]
    async fn sends_bearer_request_and_extracts_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "stream": false,
                "max_tokens": 2000,
                "messages": [
                    { "role": "system", "content": "كن مفيداً" },
                    { "role": "user", "content": "مرحبا" }
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("أهلاً بك"))
            .create_async()
            .await;

        let outcome = adapter(server.url(), Some("sk-test"))
            .complete(&conversation(), &GenerationOptions::default())
            .await;

        assert!(matches!(outcome, ProviderOutcome::Completed(ref t) if t == "أهلاً بك"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_key_skips_the_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .expect(0)
            .create_async()
            .await;

        let provider = adapter(server.url(), Some("  "));
        assert!(!provider.is_configured());
        let outcome = provider
            .complete(&conversation(), &GenerationOptions::default())
            .await;

        assert!(matches!(outcome, ProviderOutcome::Unavailable));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn maps_error_statuses() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let outcome = adapter(server.url(), Some("sk-test"))
            .complete(&conversation(), &GenerationOptions::default())
            .await;

        assert!(matches!(outcome, ProviderOutcome::Failed(LLMError::RateLimit)));
    }

    #[tokio::test]
    async fn empty_content_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(completion_body(""))
            .create_async()
            .await;

        let outcome = adapter(server.url(), Some("sk-test"))
            .complete(&conversation(), &GenerationOptions::default())
            .await;

        assert!(matches!(outcome, ProviderOutcome::Failed(LLMError::EmptyCompletion)));
    }

    #[tokio::test]
    async fn malformed_payload_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": "nope"}"#)
            .create_async()
            .await;

        let outcome = adapter(server.url(), Some("sk-test"))
            .complete(&conversation(), &GenerationOptions::default())
            .await;

        assert!(matches!(outcome, ProviderOutcome::Failed(LLMError::Provider(_))));
    }

    #[tokio::test]
    async fn identical_input_yields_identical_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(completion_body("ثابت"))
            .expect(2)
            .create_async()
            .await;

        let provider = adapter(server.url(), Some("sk-test"));
        let options = GenerationOptions::default();
        let first = provider.complete(&conversation(), &options).await;
        let second = provider.complete(&conversation(), &options).await;

        match (first, second) {
            (ProviderOutcome::Completed(a), ProviderOutcome::Completed(b)) => assert_eq!(a, b),
            other => panic!("expected two completions, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn partial_usage_does_not_discard_the_reply() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{ "message": { "role": "assistant", "content": "hello" } }],
                    "usage": { "total_tokens": 5 }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let outcome = adapter(server.url(), Some("sk-test"))
            .complete(&conversation(), &GenerationOptions::default())
            .await;

        assert!(matches!(outcome, ProviderOutcome::Completed(ref t) if t == "hello"));
    }

    #[tokio::test]
    async fn stalled_body_reports_timeout() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_chunked_body(|w| {
                std::io::Write::write_all(&mut *w, b"{\"choices\": [")?;
                std::thread::sleep(Duration::from_millis(1500));
                std::io::Write::write_all(&mut *w, b"]}")
            })
            .create_async()
            .await;

        let outcome = adapter_with_timeout(server.url(), Some("sk-test"), Duration::from_millis(300))
            .complete(&conversation(), &GenerationOptions::default())
            .await;

        assert!(
            matches!(outcome, ProviderOutcome::Failed(LLMError::Timeout(_))),
            "got {outcome:?}"
        );
    }
}
