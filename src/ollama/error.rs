// ABOUTME: Transport error taxonomy — connection failures vs. mid-stream failures.
// ABOUTME: Malformed stream lines are not errors; they are skipped at the decode site.

use thiserror::Error;

/// Errors surfaced by the Ollama transport.
///
/// `Connection` means the server could not be reached at all (model listing);
/// `Stream` means a chat stream was refused or died mid-flight. Both resolve
/// to user-visible diagnostics, never a crash.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not connect to Ollama server: {0}")]
    Connection(String),

    #[error("chat stream failed: {0}")]
    Stream(String),
}
