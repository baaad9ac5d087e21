// src/reading/sse.rs
//! Server-sent event framing for analysis streams

use serde::{Deserialize, Serialize};

/// Sentinel payload closing a stream.
pub const DONE_MARKER: &str = "[DONE]";

/// One decoded `data:` frame of an analysis stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    Token(String),
    Error(String),
    Done,
}

/// Payload of a relayed frame: `{"content": "..."}`, optionally with `"error": true`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentFrame {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl ContentFrame {
    pub fn token(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            error: false,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            error: true,
        }
    }

    /// Wire text of the frame including the trailing blank line.
    pub fn to_frame(&self) -> String {
        format!(
            "data: {}\n\n",
            serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
        )
    }
}

pub fn done_frame() -> String {
    format!("data: {}\n\n", DONE_MARKER)
}

/// Incremental decoder; feed raw chunks, get complete events back.
///
/// Bytes are buffered until a newline so that multi-byte characters split
/// across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.finished {
                continue;
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_relay_line(line.trim()) {
                if event == SseEvent::Done {
                    self.finished = true;
                }
                events.push(event);
            }
        }

        events
    }

    /// Flush a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if self.buffer.is_empty() || self.finished {
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        match parse_relay_line(line.trim()) {
            Some(event) => {
                if event == SseEvent::Done {
                    self.finished = true;
                }
                vec![event]
            }
            None => Vec::new(),
        }
    }
}

fn parse_relay_line(line: &str) -> Option<SseEvent> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == DONE_MARKER {
        return Some(SseEvent::Done);
    }

    let frame: ContentFrame = serde_json::from_str(data).ok()?;
    if frame.error {
        Some(SseEvent::Error(frame.content))
    } else if frame.content.is_empty() {
        None
    } else {
        Some(SseEvent::Token(frame.content))
    }
}

/// Line-oriented reader for an OpenAI-compatible upstream stream, yielding the
/// `choices[0].delta.content` text of each frame.
#[derive(Debug, Default)]
pub struct UpstreamDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

/// What an upstream frame carried.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamChunk {
    Delta(String),
    Done,
}

impl UpstreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<UpstreamChunk> {
        self.buffer.extend_from_slice(chunk);
        let mut chunks = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.finished {
                continue;
            }
            let line = String::from_utf8_lossy(&line);
            let Some(data) = line.trim().strip_prefix("data:").map(str::trim) else {
                continue;
            };

            if data == DONE_MARKER {
                self.finished = true;
                chunks.push(UpstreamChunk::Done);
                continue;
            }

            // Frames that fail to parse are skipped.
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(data) {
                let content = json["choices"][0]["delta"]["content"]
                    .as_str()
                    .unwrap_or("");
                if !content.is_empty() {
                    chunks.push(UpstreamChunk::Delta(content.to_string()));
                }
            }
        }

        chunks
    }
}
