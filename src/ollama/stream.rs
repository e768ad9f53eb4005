// ABOUTME: Transport stream reader — splits arriving byte chunks into complete lines.
// ABOUTME: Buffers any partial trailing line until the rest of it arrives.

/// Incremental newline splitter over a byte stream.
///
/// Network chunks arrive at arbitrary boundaries, so the decoder keeps raw
/// bytes and only converts complete lines to strings. A multi-byte UTF-8
/// sequence split across two chunks therefore decodes intact once its line
/// completes. Blank lines are dropped.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes and return every line completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Bytes held back waiting for a newline (for tests and diagnostics).
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}
