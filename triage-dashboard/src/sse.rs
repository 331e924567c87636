//! Decoder for the `text/event-stream` body of `/api/process-ticket`
//!
//! Chunks arrive with arbitrary boundaries. The decoder keeps a byte buffer
//! across chunks, so records and multi-byte characters split over several
//! chunks are reassembled before decoding.

use triage_dashboard_sdk::StreamEvent;

const RECORD_SEPARATOR: &[u8] = b"\n\n";

/// Incremental SSE record decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    malformed: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and decode every record it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        // CRLF framing decodes the same as LF framing
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_separator(&self.buffer) {
            let record: Vec<u8> = self.buffer.drain(..end + RECORD_SEPARATOR.len()).collect();
            if let Some(event) = self.decode_record(&record[..end]) {
                events.push(event);
            }
        }
        events
    }

    /// Decode a trailing record left when the stream closed without a blank line
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        self.decode_record(&rest)
    }

    /// Records dropped so far because their payload was not valid JSON
    pub fn malformed_count(&self) -> usize {
        self.malformed
    }

    /// Bytes waiting for a record separator
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn decode_record(&mut self, record: &[u8]) -> Option<StreamEvent> {
        let text = match std::str::from_utf8(record) {
            Ok(text) => text,
            Err(err) => {
                self.malformed += 1;
                tracing::warn!(error = %err, "dropping SSE record with invalid UTF-8");
                return None;
            }
        };

        // Heartbeats and comment-only records carry no data
        let payload = data_payload(text)?;

        match serde_json::from_str::<StreamEvent>(&payload) {
            Ok(event) => Some(event),
            Err(err) => {
                self.malformed += 1;
                tracing::warn!(
                    error = %err,
                    payload = %crate::format::truncate(&payload, 120),
                    "dropping malformed SSE record"
                );
                None
            }
        }
    }
}

fn find_separator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(RECORD_SEPARATOR.len())
        .position(|window| window == RECORD_SEPARATOR)
}

/// Joined `data:` lines of one record, or `None` when it has none
pub fn data_payload(record: &str) -> Option<String> {
    let lines: Vec<&str> = record
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Frame one record the way the backend writes it
pub fn encode_event(event: &StreamEvent) -> serde_json::Result<String> {
    serde_json::to_string(event).map(|json| format!("data: {}\n\n", json))
}
