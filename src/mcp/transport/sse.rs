//! Incremental `text/event-stream` decoding.

use tracing::warn;

/// Longest line kept. Anything past it is discarded up to the next line
/// terminator.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Splits a byte stream into lines, keeping blank lines since they dispatch
/// events. Accepts `\n`, `\r\n` and bare `\r` terminators, even when a chunk
/// boundary falls between `\r` and `\n`. A UTF-8 byte order mark at the
/// start of the stream is skipped, and lines longer than [`MAX_LINE_BYTES`]
/// are dropped.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
    skip_lf: bool,
    /// Set once the stream start has been checked for a byte order mark.
    started: bool,
    bom_matched: usize,
    oversized: bool,
}

impl SseLineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if !self.started && self.consume_bom(byte) {
                continue;
            }
            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => lines.extend(self.take_line()),
                b'\r' => {
                    lines.extend(self.take_line());
                    self.skip_lf = true;
                }
                other => self.append(other),
            }
        }
        lines
    }

    /// Returns the unterminated tail, if any, and resets the buffer.
    pub fn finish(&mut self) -> Option<String> {
        self.skip_lf = false;
        if self.buffer.is_empty() && !self.oversized {
            None
        } else {
            self.take_line()
        }
    }

    /// True when `byte` belongs to a leading byte order mark. A partial mark
    /// followed by anything else is kept as ordinary line content.
    fn consume_bom(&mut self, byte: u8) -> bool {
        if byte == UTF8_BOM[self.bom_matched] {
            self.bom_matched += 1;
            if self.bom_matched == UTF8_BOM.len() {
                self.started = true;
            }
            return true;
        }
        self.started = true;
        self.buffer.extend_from_slice(&UTF8_BOM[..self.bom_matched]);
        false
    }

    fn append(&mut self, byte: u8) {
        if self.oversized {
            return;
        }
        if self.buffer.len() >= MAX_LINE_BYTES {
            self.oversized = true;
            self.buffer = Vec::new();
            return;
        }
        self.buffer.push(byte);
    }

    fn take_line(&mut self) -> Option<String> {
        if self.oversized {
            self.oversized = false;
            warn!(limit = MAX_LINE_BYTES, "Dropping oversized SSE line");
            return None;
        }
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        Some(line)
    }
}

/// Accumulates fields into events and dispatches them on blank lines.
#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: SseLineBuffer,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    last_event_id: Option<String>,
    retry: Option<u64>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for line in self.lines.push(chunk) {
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Ends the stream. An event that never saw its terminating blank line is
    /// dropped.
    pub fn finish(&mut self) {
        let _ = self.lines.finish();
        self.reset_event();
    }

    /// Most recent `retry:` value in milliseconds.
    pub fn retry(&self) -> Option<u64> {
        self.retry
    }

    /// Id of the last dispatched event, sent back as `Last-Event-ID` on
    /// reconnect.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(millis) = value.parse::<u64>() {
                    self.retry = Some(millis);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if let Some(id) = self.id.clone() {
            self.last_event_id = Some(id);
        }
        if self.data.is_empty() {
            self.reset_event();
            return None;
        }

        let event = SseEvent {
            event: self.event.take().filter(|name| !name.is_empty()),
            data: self.data.join("\n"),
            id: self.id.take(),
        };
        self.reset_event();
        Some(event)
    }

    fn reset_event(&mut self) {
        self.event = None;
        self.data.clear();
        self.id = None;
    }
}

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}
