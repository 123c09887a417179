//! Streaming chat completions from an OpenAI-compatible endpoint.
//!
//! The request is sent lazily when the stream is first polled. The response
//! body is decoded as server-sent events; each `data:` payload carries one
//! delta and `data: [DONE]` ends the stream.

use crate::defaults;
use crate::llm::generator::{Generator, TextStream, error_fragment};
use futures_util::StreamExt;
use futures_util::stream::{self, Stream};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::fmt::Display;

/// Connection and sampling settings.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: defaults::OPENAI_BASE_URL.to_string(),
            api_key: None,
            model: defaults::OPENAI_MODEL.to_string(),
            temperature: defaults::TEMPERATURE,
            max_tokens: defaults::MAX_TOKENS,
            system_prompt: None,
        }
    }
}

/// Generator backed by the `/chat/completions` API with `stream: true`.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    settings: OpenAiSettings,
}

impl OpenAiGenerator {
    pub fn new(settings: OpenAiSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, prompt: &str) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &self.settings.system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        json!({
            "model": self.settings.model,
            "messages": messages,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
            "stream": true,
        })
    }
}

impl Generator for OpenAiGenerator {
    fn generate(&self, prompt: &str) -> TextStream {
        let mut request = self.client.post(self.endpoint()).json(&self.request_body(prompt));
        if let Some(key) = self.settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }
        tracing::debug!(model = %self.settings.model, "starting completion stream");

        stream::once(async move {
            request
                .send()
                .await
                .and_then(|response| response.error_for_status())
        })
        .flat_map(|result| match result {
            Ok(response) => decode_event_stream(response.bytes_stream()).boxed(),
            Err(e) => {
                tracing::warn!("completion request failed: {}", e);
                stream::iter([error_fragment(&e.to_string())]).boxed()
            }
        })
        .boxed()
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }
}

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SseEvent {
    Delta(String),
    Done,
    Failed(String),
}

/// Incremental line decoder for an SSE body.
#[derive(Debug, Default)]
struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    /// Consumes a body chunk and returns the events completed by it.
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_line(line.trim_end_matches(['\n', '\r'])) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload == "[DONE]" {
        return Some(SseEvent::Done);
    }

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => return Some(SseEvent::Failed(format!("malformed event: {}", e))),
    };
    if let Some(message) = value.pointer("/error/message").and_then(Value::as_str) {
        return Some(SseEvent::Failed(message.to_string()));
    }
    value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(|text| SseEvent::Delta(text.to_string()))
}

/// Turns a raw SSE body into text fragments, ending with an error fragment
/// if the body fails or reports an error.
fn decode_event_stream<S, B, E>(body: S) -> impl Stream<Item = String> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    struct State<S> {
        body: std::pin::Pin<Box<S>>,
        decoder: SseDecoder,
        ready: VecDeque<String>,
        finished: bool,
    }

    let state = State {
        body: Box::pin(body),
        decoder: SseDecoder::default(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.ready.pop_front() {
                return Some((fragment, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    for event in state.decoder.push(chunk.as_ref()) {
                        match event {
                            SseEvent::Delta(text) => state.ready.push_back(text),
                            SseEvent::Done => {
                                state.finished = true;
                                break;
                            }
                            SseEvent::Failed(message) => {
                                state.ready.push_back(error_fragment(&message));
                                state.finished = true;
                                break;
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    state.ready.push_back(error_fragment(&e.to_string()));
                    state.finished = true;
                }
                None => state.finished = true,
            }
        }
    })
}
