// ABOUTME: Ollama transport module — HTTP client for model listing and streaming chat.
// ABOUTME: Decodes the newline-delimited JSON wire format into text deltas.

pub mod client;
pub mod error;
pub mod stream;

pub use client::{ModelDetails, ModelInfo, OllamaClient, SamplingOptions};
pub use error::TransportError;
pub use stream::LineDecoder;
