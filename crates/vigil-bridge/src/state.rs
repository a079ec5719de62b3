//! Per-camera connection state.
//!
//! A camera is always in exactly one phase:
//!
//! ```text
//!   Connecting --> Streaming
//!       |              |
//!       +------+-------+
//!              v
//!        Disconnected --> PendingReconnect --> Connecting (respawn)
//! ```
//!
//! Two invariants hold between transitions: a reconnect deadline exists
//! iff the phase is `PendingReconnect`, and a transport handle exists
//! iff the phase is `Connecting` or `Streaming`.
//!
//! Each spawned reader gets a generation number. Events tagged with an
//! older generation belong to a reader that has already been replaced
//! and are dropped, so a slow task shutting down cannot corrupt the
//! state of its successor.

use std::time::Instant;

use tokio::task::AbortHandle;

use vigil_core::EventLineParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reader spawned, no status line seen yet.
    Connecting,
    /// Status line received; event lines are flowing.
    Streaming,
    /// No reader and no deadline. Transient within one worker iteration.
    Disconnected,
    /// No reader; a respawn is scheduled for `reconnect_at`.
    PendingReconnect,
}

pub struct ConnectionState {
    name: String,
    phase: Phase,
    handle: Option<AbortHandle>,
    reconnect_at: Option<Instant>,
    generation: u64,
    parser: EventLineParser,
}

impl ConnectionState {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            phase: Phase::Disconnected,
            handle: None,
            reconnect_at: None,
            generation: 0,
            parser: EventLineParser::new(name),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn parser_mut(&mut self) -> &mut EventLineParser {
        &mut self.parser
    }

    /// Allocates the generation for the next reader spawn.
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// True when `generation` belongs to the currently installed reader.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Installs a freshly spawned reader. Any buffered partial line from
    /// the previous connection is discarded with the old parser.
    pub fn begin_connecting(&mut self, handle: AbortHandle) {
        self.parser = EventLineParser::new(&self.name);
        self.handle = Some(handle);
        self.reconnect_at = None;
        self.phase = Phase::Connecting;
    }

    /// Marks the stream live. Returns false unless we were `Connecting`.
    pub fn mark_streaming(&mut self) -> bool {
        if self.phase == Phase::Connecting {
            self.phase = Phase::Streaming;
            true
        } else {
            false
        }
    }

    /// Tears down the active reader, if any.
    ///
    /// Returns false when there is nothing to tear down, leaving any
    /// armed reconnect deadline untouched. A close notification that
    /// races a teardown already handled is therefore a no-op.
    pub fn disconnect(&mut self) -> bool {
        if matches!(self.phase, Phase::Disconnected | Phase::PendingReconnect) {
            return false;
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.phase = Phase::Disconnected;
        true
    }

    /// Schedules a respawn at `at`.
    pub fn arm_reconnect(&mut self, at: Instant) {
        debug_assert_eq!(self.phase, Phase::Disconnected);
        self.reconnect_at = Some(at);
        self.phase = Phase::PendingReconnect;
    }

    /// True when the reconnect deadline has passed.
    pub fn reconnect_due(&self, now: Instant) -> bool {
        self.phase == Phase::PendingReconnect && self.reconnect_at.is_some_and(|at| at <= now)
    }

    /// Checks the structural invariants of the state machine.
    pub fn invariants_hold(&self) -> bool {
        let deadline_ok = self.reconnect_at.is_some() == (self.phase == Phase::PendingReconnect);
        let handle_ok =
            self.handle.is_some() == matches!(self.phase, Phase::Connecting | Phase::Streaming);
        deadline_ok && handle_ok
    }
}

// ============================================================================
// Tests
// ============================================================================
