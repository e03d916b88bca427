//! OpenAI-compatible streaming backend
//!
//! Speaks the `/chat/completions` SSE protocol shared by OpenAI, OpenRouter,
//! Ollama (`/v1`), LM Studio and vLLM.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::{ChatRequest, ChatRole, ChunkEvent, ChunkSender, ModelBackend, SseDataBuffer, TokenUsage};
use crate::config::BackendConfig;
use crate::error::{GauntletError, GauntletResult};

/// Connection timeout for the HTTP client; response time is bounded by the turn timers
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend for any OpenAI-compatible chat completion endpoint
pub struct OpenAiCompatibleBackend {
    name: String,
    base_url: String,
    api_key: Option<String>,
    temperature: Option<f32>,
    /// Model id -> name the endpoint knows it by
    model_names: HashMap<String, String>,
    http_client: Client,
}

impl OpenAiCompatibleBackend {
    /// Create a backend for an endpoint
    pub fn new(name: impl Into<String>, config: &BackendConfig) -> GauntletResult<Self> {
        let http_client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GauntletError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key(),
            temperature: config.temperature,
            model_names: HashMap::new(),
            http_client,
        })
    }

    /// Map a model id to the name used by the endpoint
    pub fn with_model_name(mut self, model_id: impl Into<String>, remote: impl Into<String>) -> Self {
        self.model_names.insert(model_id.into(), remote.into());
        self
    }

    fn remote_model<'a>(&'a self, model_id: &'a str) -> &'a str {
        self.model_names
            .get(model_id)
            .map(String::as_str)
            .unwrap_or(model_id)
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(json!({ "role": ChatRole::System.to_string(), "content": request.system_prompt }));
        for message in &request.history {
            messages.push(json!({ "role": message.role.to_string(), "content": message.content }));
        }
        messages.push(json!({ "role": "user", "content": request.message }));

        let mut body = json!({
            "model": self.remote_model(&request.model),
            "messages": messages,
            "stream": true,
            "stream_options": { "include_usage": true },
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Translate one SSE payload into chunk events
    ///
    /// Returns `true` once the stream is finished.
    fn handle_payload(payload: &str, chunks: &ChunkSender, usage: &mut Option<TokenUsage>) -> bool {
        if payload.trim() == "[DONE]" {
            let _ = chunks.send(ChunkEvent::Done(*usage));
            return true;
        }

        let Ok(data) = serde_json::from_str::<Value>(payload) else {
            tracing::debug!(payload, "Ignoring unparseable stream payload");
            return false;
        };

        if let Some(error) = data.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            let _ = chunks.send(ChunkEvent::Error(message));
            return true;
        }

        if let Some(u) = data.get("usage").filter(|u| !u.is_null()) {
            *usage = Some(TokenUsage {
                prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as u32,
            });
        }

        if let Some(content) = data["choices"]
            .get(0)
            .and_then(|choice| choice["delta"]["content"].as_str())
            .filter(|c| !c.is_empty())
        {
            // Receiver gone means the turn already ended
            if chunks.send(ChunkEvent::Content(content.to_string())).is_err() {
                return true;
            }
        }
        false
    }

    async fn stream_response(&self, request: ChatRequest, chunks: ChunkSender) -> GauntletResult<()> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(&request);

        let response = self
            .authorize(self.http_client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(GauntletError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(GauntletError::from_backend_message(format!(
                "{} returned status {}: {}",
                self.name, status, error_text
            )));
        }

        let mut buffer = SseDataBuffer::new();
        let mut usage = None;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| GauntletError::from_backend_message(format!("stream error: {}", e)))?;
            for payload in buffer.feed(&bytes) {
                if Self::handle_payload(&payload, &chunks, &mut usage) {
                    return Ok(());
                }
            }
        }

        if let Some(payload) = buffer.finish() {
            if Self::handle_payload(&payload, &chunks, &mut usage) {
                return Ok(());
            }
        }

        // Some servers close the stream without a [DONE] marker
        let _ = chunks.send(ChunkEvent::Done(usage));
        Ok(())
    }
}

#[async_trait]
impl ModelBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, request, chunks, cancel), fields(backend = %self.name, model = %request.model))]
    async fn send_chat(
        &self,
        request: ChatRequest,
        chunks: ChunkSender,
        cancel: CancellationToken,
    ) -> GauntletResult<()> {
        tokio::select! {
            result = self.stream_response(request, chunks) => result,
            _ = cancel.cancelled() => Err(GauntletError::Cancelled),
        }
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        match self.authorize(self.http_client.get(&url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(backend = %self.name, error = %e, "Availability probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChatMessage, chunk_channel};

    fn backend() -> OpenAiCompatibleBackend {
        let config = BackendConfig {
            base_url: "http://localhost:11434/v1/".to_string(),
            api_key_env: None,
            temperature: Some(0.2),
        };
        OpenAiCompatibleBackend::new("ollama", &config)
            .unwrap()
            .with_model_name("llama3", "llama3:8b")
    }

    #[test]
    fn test_request_body_layout() {
        let backend = backend();
        let request = ChatRequest {
            model: "llama3".to_string(),
            system_prompt: "sys".to_string(),
            history: vec![ChatMessage {
                role: ChatRole::Assistant,
                content: "earlier".to_string(),
            }],
            message: "now".to_string(),
        };

        let body = backend.request_body(&request);
        assert_eq!(body["model"], "llama3:8b");
        assert_eq!(body["stream"], true);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["content"], "now");
        assert_eq!(backend.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn test_payload_translation() {
        let (tx, mut rx) = chunk_channel();
        let mut usage = None;

        let delta = r#"{"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert!(!OpenAiCompatibleBackend::handle_payload(delta, &tx, &mut usage));
        let usage_only = r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":1}}"#;
        assert!(!OpenAiCompatibleBackend::handle_payload(usage_only, &tx, &mut usage));
        assert!(OpenAiCompatibleBackend::handle_payload("[DONE]", &tx, &mut usage));

        assert_eq!(rx.try_recv().unwrap(), ChunkEvent::Content("Hi".to_string()));
        assert_eq!(
            rx.try_recv().unwrap(),
            ChunkEvent::Done(Some(TokenUsage {
                prompt_tokens: 3,
                completion_tokens: 1
            }))
        );
    }

    #[test]
    fn test_error_payload() {
        let (tx, mut rx) = chunk_channel();
        let mut usage = None;
        let payload = r#"{"error":{"message":"model not loaded"}}"#;
        assert!(OpenAiCompatibleBackend::handle_payload(payload, &tx, &mut usage));
        assert_eq!(
            rx.try_recv().unwrap(),
            ChunkEvent::Error("model not loaded".to_string())
        );
    }
}
