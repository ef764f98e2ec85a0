//! Byte-to-event framing shared by every wire format.
//!
//! Transports hand over bytes in arbitrary chunk boundaries. [`LineBuffer`]
//! keeps the partial trailing line across chunks so a frame is only decoded
//! once it is complete, and [`StreamDecoder`] turns those lines into
//! [`StreamEvent`]s through a format-specific [`FrameDecoder`].

use crate::backends::FrameDecoder;
use crate::stream::{FinishReason, StreamEvent};
use futures_util::{stream, Stream, StreamExt};
use std::collections::VecDeque;
use tracing::warn;

/// A single line that could not be decoded. The line is skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed frame ({reason}): {line}")]
pub struct MalformedFrame {
    pub line: String,
    pub reason: String,
}

impl MalformedFrame {
    pub fn new(line: &str, reason: impl std::fmt::Display) -> Self {
        Self {
            line: line.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Accumulates raw bytes and yields complete lines.
///
/// Bytes are kept undecoded until a newline arrives, so multi-byte UTF-8
/// sequences split across chunks survive intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every line it completed, without the
    /// terminating `\n` / `\r\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Returns the unterminated remainder at end of input, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }

    /// Number of buffered bytes not yet part of a complete line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Turns a byte stream of one response into events.
///
/// Guarantees exactly one `TurnFinished`: events after the first one are
/// dropped, and end of input without one synthesizes it.
pub struct StreamDecoder {
    lines: LineBuffer,
    frames: Box<dyn FrameDecoder>,
    finished: bool,
}

impl StreamDecoder {
    pub fn new(frames: Box<dyn FrameDecoder>) -> Self {
        Self {
            lines: LineBuffer::new(),
            frames,
            finished: false,
        }
    }

    /// Feeds one transport chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        for line in self.lines.push(chunk) {
            self.decode_into(&line, &mut out);
            if self.finished {
                break;
            }
        }
        out
    }

    /// Signals end of input.
    pub fn end(&mut self) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        if let Some(line) = self.lines.finish() {
            self.decode_into(&line, &mut out);
        }
        if !self.finished {
            self.finished = true;
            out.push(StreamEvent::finished(self.frames.implicit_finish()));
        }
        out
    }

    /// Terminates the sequence after a transport failure.
    pub fn fail(&mut self, message: impl Into<String>) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        vec![StreamEvent::finished(FinishReason::Error(message.into()))]
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn decode_into(&mut self, line: &str, out: &mut Vec<StreamEvent>) {
        match self.frames.decode_line(line) {
            Ok(events) => {
                for event in events {
                    let finish = event.is_finish();
                    out.push(event);
                    if finish {
                        self.finished = true;
                        break;
                    }
                }
            }
            Err(err) => {
                let preview: String = err.line.chars().take(120).collect();
                warn!(line = %preview, reason = %err.reason, "Skipping malformed frame");
            }
        }
    }
}

struct DecodeState<S> {
    bytes: S,
    decoder: StreamDecoder,
    queue: VecDeque<StreamEvent>,
    drained: bool,
}

/// Lazily decodes a transport byte stream into events.
///
/// The returned stream is finite and ends right after its single
/// `TurnFinished`. A transport error ends it with `TurnFinished(error)`.
pub fn decode_stream<S, B, E>(
    bytes: S,
    decoder: StreamDecoder,
) -> impl Stream<Item = StreamEvent> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    let state = DecodeState {
        bytes,
        decoder,
        queue: VecDeque::new(),
        drained: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.queue.pop_front() {
                return Some((event, st));
            }
            if st.drained {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => st.queue.extend(st.decoder.push(chunk.as_ref())),
                Some(Err(e)) => {
                    warn!(error = %e, "Stream read error");
                    st.queue
                        .extend(st.decoder.fail(format!("stream read error: {e}")));
                }
                None => st.queue.extend(st.decoder.end()),
            }
            if st.decoder.is_finished() {
                st.drained = true;
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_line_waits_for_newline() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        assert_eq!(buf.pending_len(), 10);
        let lines = buf.push(b":1}\n\ndata: [DO");
        assert_eq!(lines, vec!["data: {\"a\":1}".to_string(), String::new()]);
        assert_eq!(buf.finish().as_deref(), Some("data: [DO"));
        assert!(buf.finish().is_none());
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push(b"one\r\ntwo\r\n"), vec!["one", "two"]);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let text = "température ☁\n".as_bytes();
        let mut buf = LineBuffer::new();
        let mut lines = Vec::new();
        for byte in text {
            lines.extend(buf.push(std::slice::from_ref(byte)));
        }
        assert_eq!(lines, vec!["température ☁".to_string()]);
    }
}
