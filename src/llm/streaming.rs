//! Accumulates a server-sent-events chat completion into one string.
//!
//! Bytes are buffered until a full line is available, so multi-byte
//! characters split across network chunks decode correctly.

use crate::error::CompletionError;
use bytes::BytesMut;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct StreamChunkRaw {
    #[serde(default)]
    choices: Vec<StreamChoiceRaw>,
}

#[derive(Debug, Deserialize)]
struct StreamChoiceRaw {
    delta: DeltaRaw,
}

#[derive(Debug, Deserialize)]
struct DeltaRaw {
    #[serde(default)]
    content: Option<String>,
}

/// Collects text deltas from an SSE byte stream
#[derive(Debug, Default)]
pub struct SseAccumulator {
    buffer: BytesMut,
    text: String,
    done: bool,
}

impl SseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns true once `data: [DONE]` has been seen
    pub fn push(&mut self, bytes: &[u8]) -> Result<bool, CompletionError> {
        if self.done {
            return Ok(true);
        }
        self.buffer.extend_from_slice(bytes);

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            let line = std::str::from_utf8(&line)
                .map_err(|e| CompletionError::Parse(format!("invalid UTF-8 in stream: {}", e)))?;
            self.handle_line(line.trim())?;
            if self.done {
                break;
            }
        }
        Ok(self.done)
    }

    /// Flush any unterminated final line and return the accumulated text
    pub fn finish(mut self) -> Result<String, CompletionError> {
        if !self.done && !self.buffer.is_empty() {
            let rest = self.buffer.split();
            let line = String::from_utf8(rest.to_vec())
                .map_err(|e| CompletionError::Parse(format!("invalid UTF-8 in stream: {}", e)))?;
            self.handle_line(line.trim())?;
        }
        Ok(self.text)
    }

    fn handle_line(&mut self, line: &str) -> Result<(), CompletionError> {
        // Blank lines separate events; "event:", "id:" and comments carry no text
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();

        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        let raw: StreamChunkRaw = serde_json::from_str(data).map_err(|e| {
            CompletionError::Parse(format!(
                "failed to parse stream chunk: {} (data: {})",
                e,
                crate::parsers::text::truncate_chars(data, 200)
            ))
        })?;

        if let Some(delta) = raw.choices.into_iter().next().and_then(|c| c.delta.content) {
            self.text.push_str(&delta);
        }
        Ok(())
    }
}
