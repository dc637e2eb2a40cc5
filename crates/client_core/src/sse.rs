//! Incremental decoder for the forge endpoint's SSE-style frame stream.
//!
//! Frames are `event: <tag>\ndata: <json>\n\n`. Chunk boundaries are
//! arbitrary, so the decoder accumulates raw bytes and only ever emits
//! complete frames; a delimiter split across two reads is found once the
//! second read lands. Buffering bytes rather than text also keeps a UTF-8
//! code point split across chunks intact.

use serde_json::Value;
use tracing::warn;

const FRAME_DELIMITER: &[u8] = b"\n\n";
const DEFAULT_EVENT: &str = "message";

/// One decoded frame: event tag plus parsed JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFrame {
    pub event: String,
    pub data: Value,
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    decode_errors: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every frame that is now complete, in
    /// arrival order. Empty chunks are valid no-ops. A malformed frame is
    /// counted and skipped; decoding continues with the next piece.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = find_subslice(&self.buffer, FRAME_DELIMITER) {
            let piece: Vec<u8> = self
                .buffer
                .drain(..pos + FRAME_DELIMITER.len())
                .take(pos)
                .collect();
            if piece.is_empty() {
                continue;
            }
            if let Some(frame) = self.decode_piece(&piece) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Malformed frames seen so far. Repeated growth indicates a protocol
    /// mismatch with the backend.
    pub fn decode_error_count(&self) -> u64 {
        self.decode_errors
    }

    /// Bytes of a trailing unterminated frame, if any. Dropped at stream end
    /// without being emitted; the frame format requires the closing
    /// delimiter.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    fn decode_piece(&mut self, piece: &[u8]) -> Option<StreamFrame> {
        let text = match std::str::from_utf8(piece) {
            Ok(text) => text,
            Err(err) => {
                self.decode_errors += 1;
                warn!(%err, "dropping forge frame with invalid utf-8");
                return None;
            }
        };

        let mut event: Option<&str> = None;
        let mut data: Option<&str> = None;
        for line in text.lines() {
            if event.is_none() {
                if let Some(rest) = line.strip_prefix("event: ") {
                    event = Some(rest);
                    continue;
                }
            }
            if data.is_none() {
                if let Some(rest) = line.strip_prefix("data: ") {
                    data = Some(rest);
                }
            }
        }

        let event = event.unwrap_or(DEFAULT_EVENT);
        match serde_json::from_str(data.unwrap_or_default()) {
            Ok(value) => Some(StreamFrame {
                event: event.to_string(),
                data: value,
            }),
            Err(err) => {
                self.decode_errors += 1;
                warn!(%err, event, "dropping forge frame with unparseable data payload");
                None
            }
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
