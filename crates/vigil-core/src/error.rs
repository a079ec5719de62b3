//! Error types for the Vigil event protocol.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding the camera event protocol.
///
/// All variants are per-line failures: the multiplexer logs them and moves
/// on to the next line. Nothing here is fatal to a camera's stream.
#[derive(Error, Debug)]
pub enum Error {
    /// An event line contained a segment that is not a single `key=value`
    /// pair (missing `=`, or more than one).
    #[error("malformed pair '{pair}' in event line '{line}'")]
    MalformedPair {
        /// The offending `;`-separated segment.
        pair: String,
        /// The full line, for log context.
        line: String,
    },

    /// An event line parsed into pairs but lacks a key every record needs.
    #[error("event line missing '{field}' key: '{line}'")]
    MissingField {
        /// The absent key (`code` or `action`).
        field: &'static str,
        /// The full line, for log context.
        line: String,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
