// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

// HuggingFace Inference API Adapter
//
// Anti-Corruption Layer for text-generation models on the hosted inference
// API. The endpoint is the full model URL. Only the newest user message is
// sent; the model echoes it back, so the echo is stripped from the reply.

use crate::domain::llm::{ChatProvider, GenerationOptions, LLMError, ProviderKind, ProviderOutcome};
use crate::domain::message::{last_user_text, Message};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct HuggingFaceAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Serialize)]
struct InferenceParameters {
    max_length: u32,
    temperature: f32,
    do_sample: bool,
}

#[derive(Deserialize)]
struct Generation {
    #[serde(default)]
    generated_text: Option<String>,
}

impl HuggingFaceAdapter {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> Result<Self, LLMError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LLMError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            timeout,
        })
    }

    async fn request(
        &self,
        api_key: &str,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<String, LLMError> {
        let input = last_user_text(messages)
            .ok_or_else(|| LLMError::InvalidInput("conversation has no user message".into()))?;

        let request = InferenceRequest {
            inputs: input,
            parameters: InferenceParameters {
                max_length: options.max_length,
                temperature: options.temperature,
                do_sample: true,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e, |e| LLMError::Network(e.to_string())))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(if status == 401 || status == 403 {
                LLMError::Authentication(error_text)
            } else {
                LLMError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let generations: Vec<Generation> = response
            .json()
            .await
            .map_err(|e| {
                self.classify(e, |e| LLMError::Provider(format!("Failed to parse response: {}", e)))
            })?;

        let generated = generations
            .into_iter()
            .next()
            .and_then(|g| g.generated_text)
            .ok_or_else(|| LLMError::Provider("No generation returned".into()))?;

        Ok(generated.replace(input, "").trim().to_string())
    }

    fn classify(&self, e: reqwest::Error, other: impl FnOnce(reqwest::Error) -> LLMError) -> LLMError {
        if e.is_timeout() {
            LLMError::Timeout(self.timeout)
        } else {
            other(e)
        }
    }
}

#[async_trait]
impl ChatProvider for HuggingFaceAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
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

    fn adapter(url: String) -> HuggingFaceAdapter {
        HuggingFaceAdapter::new(url, Some("hf-test".to_string()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn sends_only_latest_user_text_and_strips_echo() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("authorization", "Bearer hf-test")
            .match_body(Matcher::PartialJson(json!({
                "inputs": "how are you",
                "parameters": { "max_length": 200, "do_sample": true }
            })))
            .with_status(200)
            .with_body(json!([{ "generated_text": "how are you  I am fine." }]).to_string())
            .create_async()
            .await;

        let messages = vec![
            Message::system("system prompt"),
            Message::user("earlier"),
            Message::assistant("reply"),
            Message::user("how are you"),
        ];
        let outcome = adapter(format!("{}/", server.url()))
            .complete(&messages, &GenerationOptions::default())
            .await;

        assert!(matches!(outcome, ProviderOutcome::Completed(ref t) if t == "I am fine."));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn echo_only_generation_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(json!([{ "generated_text": "hello" }]).to_string())
            .create_async()
            .await;

        let outcome = adapter(format!("{}/", server.url()))
            .complete(&[Message::user("hello")], &GenerationOptions::default())
            .await;

        assert!(matches!(outcome, ProviderOutcome::Failed(LLMError::EmptyCompletion)));
    }

    #[tokio::test]
    async fn model_loading_error_object_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(503)
            .with_body(r#"{"error":"Model is currently loading"}"#)
            .create_async()
            .await;

        let outcome = adapter(format!("{}/", server.url()))
            .complete(&[Message::user("hello")], &GenerationOptions::default())
            .await;

        assert!(matches!(outcome, ProviderOutcome::Failed(LLMError::Provider(_))));
    }

    #[tokio::test]
    async fn without_key_is_unavailable() {
        let provider = HuggingFaceAdapter::new(
            "http://127.0.0.1:9/".to_string(),
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        let outcome = provider
            .complete(&[Message::user("hello")], &GenerationOptions::default())
            .await;
        assert!(matches!(outcome, ProviderOutcome::Unavailable));
    }

    #[tokio::test]
    async fn stalled_generation_reports_timeout() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_chunked_body(|w| {
                std::io::Write::write_all(&mut *w, b"[{\"generated_text\": ")?;
                std::thread::sleep(Duration::from_millis(1500));
                std::io::Write::write_all(&mut *w, b"\"late\"}]")
            })
            .create_async()
            .await;

        let provider = HuggingFaceAdapter::new(
            format!("{}/", server.url()),
            Some("hf-test".to_string()),
            Duration::from_millis(300),
        )
        .unwrap();
        let outcome = provider
            .complete(&[Message::user("hello")], &GenerationOptions::default())
            .await;

        assert!(
            matches!(outcome, ProviderOutcome::Failed(LLMError::Timeout(_))),
            "got {outcome:?}"
        );
    }
}
