//! Incremental line parser for the camera event attach stream.
//!
//! The attach response is an unbounded stream of CRLF-terminated text lines.
//! Network reads do not align with line boundaries, so each camera keeps one
//! [`EventLineParser`] for the lifetime of a connection: bytes go in as they
//! arrive, the trailing unterminated remainder stays buffered, and every
//! complete line comes back out as an [`Indication`].
//!
//! Three kinds of line matter:
//! - the HTTP status line `HTTP/1.1 200 OK`, which signals the attach is live
//! - lines starting with `Code=`, which carry `;`-separated `key=value`
//!   pairs describing one alarm event
//! - everything else (multipart boundaries, header echoes, blanks), ignored
//!
//! A malformed event line produces an [`Indication::Error`] for that line
//! only; the stream keeps parsing. No line ever aborts the connection.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::event::AlarmEvent;

/// Status line that signals a successful attach.
pub const STATUS_OK_LINE: &str = "HTTP/1.1 200 OK";

/// Prefix that marks an event record line.
pub const EVENT_MARKER: &str = "Code=";

/// Records are CRLF-terminated. A lone `\n` stays inside the line.
const LINE_TERMINATOR: &[u8] = b"\r\n";

/// One parsed outcome from a complete line.
#[derive(Debug)]
pub enum Indication {
    /// The success status line was seen; the camera is streaming.
    Connected,
    /// A well-formed event record.
    Event(AlarmEvent),
    /// An event-marker line that failed to parse. Recoverable: the line is
    /// dropped and parsing continues.
    Error(Error),
}

/// Splits a camera's byte stream into lines and decodes event records.
///
/// One instance per connection. The pending buffer persists across calls to
/// [`push`](Self::push) so records split over multiple reads reassemble
/// correctly.
#[derive(Debug)]
pub struct EventLineParser {
    camera: String,
    pending: Vec<u8>,
}

impl EventLineParser {
    /// Create a parser for the named camera. The name is stamped onto every
    /// event the parser emits.
    pub fn new(camera: impl Into<String>) -> Self {
        Self {
            camera: camera.into(),
            pending: Vec::new(),
        }
    }

    /// Feed a chunk of stream bytes, returning indications for every line
    /// the chunk completed, in stream order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Indication> {
        self.pending.extend_from_slice(chunk);

        let mut indications = Vec::new();
        let mut consumed = 0;
        while let Some(at) = find_terminator(&self.pending[consumed..]) {
            let line = decode_permissive(&self.pending[consumed..consumed + at]);
            consumed += at + LINE_TERMINATOR.len();
            if let Some(indication) = self.classify(&line) {
                indications.push(indication);
            }
        }
        if consumed > 0 {
            self.pending.drain(..consumed);
        }
        indications
    }

    /// Bytes held for the next read (the current unterminated line).
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn classify(&self, line: &str) -> Option<Indication> {
        if line == STATUS_OK_LINE {
            Some(Indication::Connected)
        } else if line.starts_with(EVENT_MARKER) {
            Some(match self.parse_record(line) {
                Ok(event) => Indication::Event(event),
                Err(err) => Indication::Error(err),
            })
        } else {
            None
        }
    }

    /// Decode one `Code=...` line into an event.
    ///
    /// Every `;`-separated segment must be exactly one `key=value` pair.
    /// Keys are lower-cased, values kept verbatim. The record must carry
    /// `code` and `action`; both publishes need them.
    fn parse_record(&self, line: &str) -> Result<AlarmEvent> {
        let mut fields = BTreeMap::new();
        for pair in line.split(';') {
            let mut parts = pair.splitn(3, '=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => {
                    fields.insert(key.to_ascii_lowercase(), value.to_string());
                }
                _ => {
                    return Err(Error::MalformedPair {
                        pair: pair.to_string(),
                        line: line.to_string(),
                    });
                }
            }
        }

        let code = require(&fields, "code", line)?;
        let action = require(&fields, "action", line)?;

        Ok(AlarmEvent {
            camera: self.camera.clone(),
            code,
            action,
            fields,
        })
    }
}

fn require(fields: &BTreeMap<String, String>, field: &'static str, line: &str) -> Result<String> {
    fields.get(field).cloned().ok_or_else(|| Error::MissingField {
        field,
        line: line.to_string(),
    })
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(LINE_TERMINATOR.len())
        .position(|w| w == LINE_TERMINATOR)
}

/// Decode bytes as UTF-8, dropping invalid sequences.
///
/// The devices occasionally emit garbage bytes inside otherwise valid lines;
/// eliding them (rather than failing or substituting U+FFFD) keeps the
/// surrounding pairs parseable.
fn decode_permissive(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(tail) => {
                out.push_str(tail);
                return out;
            }
            Err(err) => {
                let valid = err.valid_up_to();
                if let Ok(prefix) = std::str::from_utf8(&bytes[..valid]) {
                    out.push_str(prefix);
                }
                bytes = match err.error_len() {
                    Some(skip) => &bytes[valid + skip..],
                    // Truncated sequence at end of line: nothing left to keep.
                    None => &[],
                };
            }
        }
    }
}
