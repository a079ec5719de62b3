//! Turns accepted alarms into publications.

use std::sync::Arc;

use tracing::warn;

use vigil_core::AlarmEvent;

use crate::publish::Publisher;

pub struct Dispatcher {
    publisher: Arc<dyn Publisher>,
}

impl Dispatcher {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }

    /// Publishes one alarm as two messages: the action on the
    /// code-specific subtopic, then the full field map as JSON on the
    /// camera's base topic. The configured topic is used with leading
    /// and trailing slashes trimmed.
    pub fn dispatch(&self, topic: &str, event: &AlarmEvent) {
        let base = topic.trim_matches('/');
        self.publisher
            .publish(&format!("{base}/{}", event.code), &event.action);
        match event.payload_json() {
            Ok(payload) => self.publisher.publish(base, &payload),
            Err(err) => warn!(
                camera = %event.camera,
                error = %err,
                "Failed to serialize alarm payload"
            ),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
