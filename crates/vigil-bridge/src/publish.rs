//! Publish sinks.
//!
//! The bridge hands every accepted alarm to a [`Publisher`]. The trait is
//! the integration seam: wire it to a broker client, a message bus, or
//! anything else that accepts a topic and a payload. The implementations
//! here cover operation without a broker (structured logs, JSON lines on
//! stdout) and test capture.

use std::io::Write;

use crossbeam_channel::{Receiver, Sender};
use tracing::info;

/// Sink for (topic, payload) pairs produced by the dispatcher.
///
/// Implementations must tolerate being called from the worker task at
/// stream rate. Publishing is fire-and-forget: there is no error path
/// back into the bridge, a sink that fails should log and drop.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &str);
}

/// Emits each publication as a structured log line.
#[derive(Debug, Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish(&self, topic: &str, payload: &str) {
        info!(topic = %topic, payload = %payload, "publish");
    }
}

/// Emits each publication as one JSON object per line on stdout.
///
/// Suited for piping into another process. Write failures are ignored;
/// a broken pipe here means the consumer is gone and the bridge keeps
/// running regardless.
#[derive(Debug, Default)]
pub struct JsonlPublisher;

impl Publisher for JsonlPublisher {
    fn publish(&self, topic: &str, payload: &str) {
        let line = serde_json::json!({ "topic": topic, "payload": payload });
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = writeln!(lock, "{line}");
    }
}

/// A single published message, as captured by [`ChannelPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic: String,
    pub payload: String,
}

/// Forwards publications over an unbounded channel.
///
/// Used by tests to observe exactly what the bridge published, and usable
/// as a bridge into synchronous consumer code.
pub struct ChannelPublisher {
    tx: Sender<Publication>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, Receiver<Publication>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, topic: &str, payload: &str) {
        // Receiver dropped means nobody is listening anymore; not an error.
        let _ = self.tx.send(Publication {
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
