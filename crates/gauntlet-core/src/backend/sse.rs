//! Buffered extraction of SSE `data:` payloads
//!
//! Network chunks do not respect line boundaries, so bytes are buffered until
//! a full line is available. Incomplete UTF-8 sequences stay in the byte
//! buffer until the rest of the character arrives.

/// Buffers raw bytes and yields complete `data:` payloads
#[derive(Debug, Default)]
pub struct SseDataBuffer {
    pending: Vec<u8>,
}

impl SseDataBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every complete `data:` payload
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(payload) = Self::parse_line(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Drain a trailing line that was not newline-terminated
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Self::parse_line(&String::from_utf8_lossy(&rest))
    }

    fn parse_line(line: &str) -> Option<String> {
        let line = line.trim_end_matches(['\r', '\n']);
        let data = line.strip_prefix("data:")?;
        let data = data.strip_prefix(' ').unwrap_or(data);
        if data.is_empty() {
            None
        } else {
            Some(data.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_across_chunks() {
        let mut buffer = SseDataBuffer::new();
        assert!(buffer.feed(b"data: {\"a\":").is_empty());
        let payloads = buffer.feed(b"1}\n\ndata: [DONE]\n");
        assert_eq!(payloads, vec!["{\"a\":1}", "[DONE]"]);
    }

    #[test]
    fn test_split_utf8_character() {
        let mut buffer = SseDataBuffer::new();
        let bytes = "data: héllo\n".as_bytes();
        let (head, tail) = bytes.split_at(8);
        assert!(buffer.feed(head).is_empty());
        assert_eq!(buffer.feed(tail), vec!["héllo"]);
    }

    #[test]
    fn test_ignores_comments_and_events() {
        let mut buffer = SseDataBuffer::new();
        let payloads = buffer.feed(b": keep-alive\nevent: delta\r\ndata: x\r\n");
        assert_eq!(payloads, vec!["x"]);
    }

    #[test]
    fn test_finish_returns_unterminated_line() {
        let mut buffer = SseDataBuffer::new();
        buffer.feed(b"data: tail");
        assert_eq!(buffer.finish().as_deref(), Some("tail"));
        assert!(buffer.finish().is_none());
    }
}
