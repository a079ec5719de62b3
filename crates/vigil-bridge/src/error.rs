//! Error types for the bridge runtime.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or incomplete configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport failure while attaching to or reading a camera stream.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The camera sent a Digest challenge we could not parse or satisfy.
    #[error("Digest auth error: {0}")]
    DigestAuth(String),

    /// The camera rejected our Digest response with a second 401.
    #[error("Authentication rejected by camera")]
    AuthRejected,

    /// The camera answered the attach request with a non-200 status.
    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),

    /// The transport event channel closed with readers still expected. Fatal.
    #[error("Event channel closed")]
    ChannelClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The worker task panicked or was cancelled before returning.
    #[error("Worker task failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, Error>;
