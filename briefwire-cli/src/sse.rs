//! Incremental parser for the SSE wire format.
//!
//! Bytes arrive in arbitrary chunks; frames end at a blank line. A frame's
//! `data:` lines are joined with `\n`, comment lines (leading `:`) are
//! dropped, and unknown field names are ignored. The parser never fails;
//! malformed input yields no frame and the buffer keeps rolling.

/// One parsed wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field; SSE defaults to `message` when absent.
    pub event: String,
    /// Concatenated `data:` payload.
    pub data: String,
    /// `id:` field, when the server sets one.
    pub id: Option<String>,
}

/// Buffering frame splitter.
#[derive(Debug, Default)]
pub struct SseFrameParser {
    buffer: String,
}

impl SseFrameParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one decoded chunk and returns every frame completed by it.
    pub fn push(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.buffer.push_str(chunk);

        let mut frames = Vec::new();
        // A frame boundary is a blank line; tolerate CRLF by normalizing
        // after the split.
        while let Some(boundary) = find_boundary(&self.buffer) {
            let raw: String = self.buffer.drain(..boundary.end).collect();
            let raw = &raw[..boundary.start];
            if let Some(frame) = parse_frame(raw) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Bytes currently held without a completed frame.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

struct Boundary {
    start: usize,
    end: usize,
}

fn find_boundary(buffer: &str) -> Option<Boundary> {
    let lf = buffer.find("\n\n").map(|idx| Boundary {
        start: idx,
        end: idx + 2,
    });
    let crlf = buffer.find("\r\n\r\n").map(|idx| Boundary {
        start: idx,
        end: idx + 4,
    });

    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.start <= b.start { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn parse_frame(raw: &str) -> Option<SseFrame> {
    let mut event: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();
    let mut id: Option<String> = None;

    for line in raw.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.starts_with(':') {
            continue; // comment / keep-alive
        }

        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        } else if let Some(value) = line.strip_prefix("id:") {
            id = Some(value.trim().to_string());
        }
        // Unknown fields (including `retry:`) are ignored.
    }

    if event.is_none() && data_lines.is_empty() {
        return None;
    }

    Some(SseFrame {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data_lines.join("\n"),
        id,
    })
}
