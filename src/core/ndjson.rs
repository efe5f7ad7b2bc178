//! Incremental decoding of newline-delimited JSON generation records.
//!
//! The server writes one JSON object per line, but the transport is free to
//! split or merge lines across reads. [`NdjsonDecoder`] buffers raw bytes
//! until a full line is available, so both a record cut in half (even in the
//! middle of a multi-byte character) and several records in one read decode
//! the same way.

use futures_util::stream::{self, Stream, StreamExt};
use memchr::memchr;
use serde_json::Value;
use tracing::debug;

use crate::api::GenerateResponse;
use crate::core::constants::MAX_ERROR_LINE_CHARS;

/// Final statistics carried by a `done: true` record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoneStats {
    pub done_reason: Option<String>,
    pub total_duration: u64,
    pub load_duration: u64,
    pub prompt_eval_count: u64,
    pub prompt_eval_duration: u64,
    pub eval_count: u64,
    pub eval_duration: u64,
}

/// A validated record from the generation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateChunk {
    /// Intermediate record; the text may be empty.
    Token(String),
    /// Terminal record. Servers usually send an empty `response` here.
    Done { response: String, stats: DoneStats },
    /// The server reported a failure in-band.
    Error(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("stream line is not valid UTF-8")]
    InvalidUtf8,
    #[error("stream line is not valid JSON ({source}): {line}")]
    InvalidJson {
        line: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("stream line has an unexpected shape ({reason}): {line}")]
    UnexpectedShape { line: String, reason: String },
}

/// Errors surfaced by [`decode_stream`]: either the underlying read failed or
/// a complete line could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum StreamReadError<E> {
    #[error("failed to read response body: {0}")]
    Read(E),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl GenerateChunk {
    /// Validate one trimmed, non-empty line.
    pub fn parse(line: &str) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(line).map_err(|source| DecodeError::InvalidJson {
                line: clip(line),
                source,
            })?;

        if !value.is_object() {
            return Err(DecodeError::UnexpectedShape {
                line: clip(line),
                reason: "expected a JSON object".to_string(),
            });
        }

        let record: GenerateResponse =
            serde_json::from_value(value).map_err(|err| DecodeError::UnexpectedShape {
                line: clip(line),
                reason: err.to_string(),
            })?;

        Ok(Self::from(record))
    }
}

impl From<GenerateResponse> for GenerateChunk {
    fn from(record: GenerateResponse) -> Self {
        let total_duration = record.total_duration().unwrap_or(0);
        if let Some(message) = record.error {
            return GenerateChunk::Error(message);
        }

        let response = record.response.unwrap_or_default();
        if record.done != Some(true) {
            return GenerateChunk::Token(response);
        }

        GenerateChunk::Done {
            response,
            stats: DoneStats {
                done_reason: record.done_reason,
                total_duration,
                load_duration: record.load_duration.unwrap_or(0),
                prompt_eval_count: record.prompt_eval_count.unwrap_or(0),
                prompt_eval_duration: record.prompt_eval_duration.unwrap_or(0),
                eval_count: record.eval_count.unwrap_or(0),
                eval_duration: record.eval_duration.unwrap_or(0),
            },
        }
    }
}

fn clip(line: &str) -> String {
    if line.chars().count() <= MAX_ERROR_LINE_CHARS {
        return line.to_string();
    }
    let mut clipped: String = line.chars().take(MAX_ERROR_LINE_CHARS).collect();
    clipped.push('…');
    clipped
}

fn decode_line(raw: &[u8]) -> Option<Result<GenerateChunk, DecodeError>> {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text,
        Err(_) => return Some(Err(DecodeError::InvalidUtf8)),
    };
    let line = text.trim();
    if line.is_empty() {
        return None;
    }
    Some(GenerateChunk::parse(line))
}

/// Pull-based line decoder. Feed it bytes as they arrive and drain records
/// with [`NdjsonDecoder::next_record`].
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete, non-blank line decoded as a chunk. `None` means more
    /// bytes are needed.
    pub fn next_record(&mut self) -> Option<Result<GenerateChunk, DecodeError>> {
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(record) = decode_line(&line[..newline_pos]) {
                return Some(record);
            }
        }
        None
    }

    /// Decode whatever is left once the body has ended. Servers normally end
    /// with a newline, but a final unterminated record is still honoured.
    pub fn finish(&mut self) -> Option<Result<GenerateChunk, DecodeError>> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest)
    }

    pub fn has_pending_bytes(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// Lazily decode a byte stream into generation chunks.
///
/// Each poll suspends on at most one underlying read. A read error ends the
/// sequence after being yielded; decode errors are yielded in place and the
/// caller decides whether to continue.
pub fn decode_stream<S, B, E>(
    body: S,
) -> impl Stream<Item = Result<GenerateChunk, StreamReadError<E>>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    stream::unfold(Some((Box::pin(body), NdjsonDecoder::new())), |state| async move {
        let (mut body, mut decoder) = state?;
        loop {
            if let Some(record) = decoder.next_record() {
                return Some((record.map_err(StreamReadError::Decode), Some((body, decoder))));
            }

            match body.next().await {
                Some(Ok(bytes)) => decoder.feed(bytes.as_ref()),
                Some(Err(err)) => return Some((Err(StreamReadError::Read(err)), None)),
                None => {
                    if decoder.has_pending_bytes() {
                        debug!("response body ended without a trailing newline");
                    }
                    return decoder
                        .finish()
                        .map(|record| (record.map_err(StreamReadError::Decode), None));
                }
            }
        }
    })
}
