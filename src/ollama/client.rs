// ABOUTME: HTTP client for an Ollama-compatible server — model listing and streaming chat.
// ABOUTME: Consumes the /api/chat NDJSON stream and emits text deltas through a callback.

use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;

use crate::ollama::error::TransportError;
use crate::ollama::stream::LineDecoder;
use crate::session::Message;

/// One model entry from `/api/tags`.
///
/// Absent fields default instead of failing: the listing is informational and
/// a sparse server response should never block chatting.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub details: ModelDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelDetails {
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub families: Vec<String>,
    #[serde(default)]
    pub parameter_size: String,
    #[serde(default)]
    pub quantization_level: String,
}

/// Sampling parameters forwarded to the server per request.
#[derive(Debug, Clone, Copy)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// One decoded line of the chat stream.
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

/// API client for an Ollama-compatible server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

/// Normalize a user-entered server address: trim whitespace, assume `http://`
/// when no scheme is given, strip any trailing slash.
pub fn normalize_server_address(address: &str) -> String {
    let trimmed = address.trim();
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };
    with_scheme.trim_end_matches('/').to_string()
}

impl OllamaClient {
    /// Create a client for the given server address.
    pub fn new(server_address: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: normalize_server_address(server_address),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the models the server has available.
    ///
    /// Any failure — unreachable host, non-2xx status, unparseable body —
    /// surfaces as `TransportError::Connection`.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, TransportError> {
        let url = format!("{}/api/tags", self.base_url);
        log::debug!("fetching model list from {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Connection(format!(
                "server returned {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        log::info!("server reports {} models", tags.models.len());
        Ok(tags.models)
    }

    /// Stream one chat completion, invoking `on_delta` for every text delta.
    ///
    /// The wire format is newline-delimited JSON: each line optionally carries
    /// `message.content` and a `done` flag. `done: true` ends the stream
    /// successfully. Lines that fail to parse are skipped, not fatal. Partial
    /// trailing lines are buffered by the `LineDecoder` until completed by a
    /// later chunk.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: &SamplingOptions,
        mut on_delta: impl FnMut(&str),
    ) -> Result<(), TransportError> {
        let url = format!("{}/api/chat", self.base_url);
        log::debug!("starting chat stream against {} with model {}", url, model);

        let body = json!({
            "model": model,
            "messages": messages,
            "stream": true,
            "options": {
                "temperature": options.temperature,
                "top_k": options.top_k,
                "top_p": options.top_p,
            },
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Stream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Stream(format!(
                "server returned {}",
                response.status()
            )));
        }

        let mut byte_stream = response.bytes_stream();
        let mut decoder = LineDecoder::new();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk.map_err(|e| TransportError::Stream(e.to_string()))?;

            for line in decoder.push(&chunk) {
                let parsed: ChatChunk = match serde_json::from_str(&line) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        log::warn!("skipping malformed stream line: {}", e);
                        continue;
                    }
                };

                if let Some(message) = parsed.message {
                    if !message.content.is_empty() {
                        on_delta(&message.content);
                    }
                }

                if parsed.done {
                    log::debug!("chat stream signalled done");
                    return Ok(());
                }
            }
        }

        // Body ended without a done marker — treat as a successful close.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_without_scheme_gets_http() {
        assert_eq!(
            normalize_server_address("localhost:11434"),
            "http://localhost:11434"
        );
    }

    #[test]
    fn trailing_slash_is_stripped() {
        assert_eq!(
            normalize_server_address("http://localhost:11434/"),
            "http://localhost:11434"
        );
    }

    #[test]
    fn https_scheme_is_preserved() {
        assert_eq!(
            normalize_server_address("  https://ollama.example.com/  "),
            "https://ollama.example.com"
        );
    }

    #[test]
    fn chat_chunk_with_content_parses() {
        let line = r#"{"model":"llama3","message":{"role":"assistant","content":"Hi"},"done":false}"#;
        let chunk: ChatChunk = serde_json::from_str(line).unwrap();
        assert_eq!(chunk.message.unwrap().content, "Hi");
        assert!(!chunk.done);
    }

    #[test]
    fn chat_chunk_done_without_message_parses() {
        let line = r#"{"model":"llama3","done":true,"total_duration":12345}"#;
        let chunk: ChatChunk = serde_json::from_str(line).unwrap();
        assert!(chunk.message.is_none());
        assert!(chunk.done);
    }

    #[test]
    fn tags_response_defaults_missing_fields() {
        let body = r#"{"models":[{"name":"llama3:8b"}]}"#;
        let tags: TagsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(tags.models.len(), 1);
        assert_eq!(tags.models[0].name, "llama3:8b");
        assert_eq!(tags.models[0].details.parameter_size, "");
    }

    #[test]
    fn tags_response_without_models_is_empty() {
        let tags: TagsResponse = serde_json::from_str("{}").unwrap();
        assert!(tags.models.is_empty());
    }
}
