use bytes::BytesMut;
use serde_json::Value;
use tracing::{debug, warn};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";
const DELTA_POINTER: &str = "/choices/0/delta/content";

/// One logical unit recovered from the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Incremental assistant text.
    Delta(String),
    /// The `[DONE]` sentinel. Nothing after it is read.
    Done,
}

/// What a single complete line means.
#[derive(Debug, PartialEq, Eq)]
enum LineOutcome {
    Skip,
    Done,
    Delta(Option<String>),
    /// The payload did not parse. The line is held back for a later retry.
    Unparsed,
}

/// Rebuilds `data: <json>` frames from byte chunks with arbitrary
/// boundaries.
///
/// Bytes are buffered until a `\n` arrives, so multi-byte characters split
/// across chunks are decoded only once the whole line is present.
#[derive(Debug, Default)]
pub struct StreamReassembler {
    buffer: BytesMut,
    finished: bool,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `[DONE]` was seen or `finish` ran.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes currently waiting for a line terminator (or a retry).
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Appends a chunk and returns every frame it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        if self.finished {
            debug!("Dropping {} bytes received after stream end", chunk.len());
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);
        self.drain_lines()
    }

    /// Final best-effort pass over whatever is still buffered once the
    /// transport has closed. Lines that still fail to parse are discarded.
    pub fn finish(&mut self) -> Vec<StreamFrame> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let residual = std::mem::take(&mut self.buffer);
        let mut frames = Vec::new();
        for raw in residual[..].split(|b| *b == b'\n') {
            let line = String::from_utf8_lossy(raw);
            match classify(&line) {
                LineOutcome::Skip | LineOutcome::Delta(None) => {}
                LineOutcome::Delta(Some(text)) => frames.push(StreamFrame::Delta(text)),
                LineOutcome::Done => {
                    frames.push(StreamFrame::Done);
                    break;
                }
                LineOutcome::Unparsed => {
                    warn!("Discarding unparseable trailing stream line ({} bytes)", raw.len());
                }
            }
        }
        frames
    }

    fn drain_lines(&mut self) -> Vec<StreamFrame> {
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw = self.buffer.split_to(pos + 1);
            let line = String::from_utf8_lossy(&raw[..pos]);

            match classify(&line) {
                LineOutcome::Skip | LineOutcome::Delta(None) => {}
                LineOutcome::Delta(Some(text)) => frames.push(StreamFrame::Delta(text)),
                LineOutcome::Done => {
                    self.finished = true;
                    self.buffer.clear();
                    frames.push(StreamFrame::Done);
                    break;
                }
                LineOutcome::Unparsed => {
                    // Put the line back in front of the buffer and wait for more data.
                    let mut restored = BytesMut::with_capacity(raw.len() + self.buffer.len());
                    restored.extend_from_slice(&raw);
                    restored.extend_from_slice(&self.buffer);
                    self.buffer = restored;
                    debug!("Holding back unparsed stream line ({} bytes)", raw.len());
                    break;
                }
            }
        }

        frames
    }
}

fn classify(line: &str) -> LineOutcome {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() || line.starts_with(':') {
        return LineOutcome::Skip;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return LineOutcome::Skip;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return LineOutcome::Done;
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(value) => LineOutcome::Delta(
            value
                .pointer(DELTA_POINTER)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        ),
        Err(_) => LineOutcome::Unparsed,
    }
}
