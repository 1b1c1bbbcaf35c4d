/// Incremental decoder for the upstream SSE byte stream
///
/// The Gemini streaming endpoint (`alt=sse`) emits one JSON payload per
/// `data:` line. Network chunks can split a line anywhere, so bytes are
/// buffered until a complete line is available. Comment lines, event/id
/// fields and blank event separators are ignored.
use tracing::debug;

#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk, returning the `data:` payloads of every line
    /// completed by it, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes = self.buffer.drain(..=newline_pos).collect::<Vec<u8>>();
            if let Some(payload) = parse_data_line(&line_bytes) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Drain a trailing unterminated line once the upstream has closed.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        debug!("stream ended with {} bytes of unterminated line", self.buffer.len());
        let line_bytes = std::mem::take(&mut self.buffer);
        parse_data_line(&line_bytes)
    }
}

fn parse_data_line(line_bytes: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line_bytes);
    let line = line.trim_end_matches(['\n', '\r']);

    // Non-data fields (event:, id:, retry:), comments and blank separator
    // lines carry no payload.
    let rest = line.strip_prefix("data:")?;
    let payload = rest.strip_prefix(' ').unwrap_or(rest);
    if payload.is_empty() {
        return None;
    }
    Some(payload.to_string())
}
