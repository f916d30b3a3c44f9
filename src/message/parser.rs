//! Line framer and classifier for engine stdout

use crate::protocol::ProtocolMessage;

/// One complete line of engine output
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// A well-formed protocol message
    Message(ProtocolMessage),
    /// Anything else: banners, logs, truncated or foreign JSON
    Text(String),
}

/// Incremental line parser
///
/// Accepts arbitrarily chunked bytes and yields complete lines in order.
/// Bytes are buffered (not decoded) until a newline is seen, so a multi-byte
/// character split across chunks decodes the same as if it arrived whole.
#[derive(Debug, Default)]
pub struct LineParser {
    buffer: Vec<u8>,
}

impl LineParser {
    /// Create an empty parser
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ParsedLine> {
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete[..last_newline]
            .split(|&b| b == b'\n')
            .map(classify)
            .collect()
    }

    /// Drain the unterminated trailing fragment, if any
    pub fn flush(&mut self) -> Vec<ParsedLine> {
        let remaining = std::mem::take(&mut self.buffer);
        if remaining.is_empty() {
            return Vec::new();
        }
        vec![classify(&remaining)]
    }

    /// Bytes held back waiting for a newline
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Classify one line; blank lines come back as empty text
fn classify(raw: &[u8]) -> ParsedLine {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches('\r');

    let parsed = serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|value| ProtocolMessage::from_value(&value));

    match parsed {
        Some(message) => ParsedLine::Message(message),
        None => ParsedLine::Text(line.to_string()),
    }
}

/// Classify a whole input at once, as if pushed in one chunk and flushed
#[must_use]
pub fn parse_lines(input: &[u8]) -> Vec<ParsedLine> {
    let mut parser = LineParser::new();
    let mut out = parser.push(input);
    out.extend(parser.flush());
    out
}
