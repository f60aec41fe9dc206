//! Backend implementations
//!
//! One module per backend, each speaking the provider's native wire
//! format. The router picks a backend from the descriptor; everything in
//! here is stateless apart from the shared HTTP client.

pub mod ollama;
pub mod mlx;
pub mod openai;
pub mod anthropic;
pub mod google;

pub use ollama::OllamaBackend;
pub use mlx::MlxBackend;
pub use openai::OpenAiBackend;
pub use anthropic::AnthropicBackend;
pub use google::GoogleBackend;

/// Accumulates stream bytes and hands back complete lines.
///
/// Used for ollama's NDJSON and the SSE framings of the cloud providers;
/// chunks can split lines at arbitrary byte boundaries.
pub(crate) struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
    }

    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buffer.find('\n')?;
        let line = self.buffer[..pos].trim_end_matches('\r').to_string();
        self.buffer.drain(..=pos);
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_reassembles_split_lines() {
        let mut buf = LineBuffer::new();
        buf.push(b"data: {\"a\":");
        assert!(buf.next_line().is_none());
        buf.push(b" 1}\ndata: ");
        assert_eq!(buf.next_line().unwrap(), "data: {\"a\": 1}");
        assert!(buf.next_line().is_none());
        buf.push(b"[DONE]\r\n");
        assert_eq!(buf.next_line().unwrap(), "data: [DONE]");
    }
}
