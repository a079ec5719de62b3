//! Core types and shared utilities for the Vigil camera event bridge.
//!
//! This crate provides:
//! - The [`AlarmEvent`] model and the vendor's documented event codes
//! - [`EventLineParser`]: incremental CRLF-line decoding of attach streams
//! - [`EventFilter`]: per-camera event code whitelisting
//! - Prometheus metrics helpers
//! - Shared error types

mod error;
mod event;
mod filter;
mod parser;
pub mod metrics;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Fixed delay between a detected disconnection and the next attach attempt.
pub const RECONNECT_DELAY_SECS: u64 = 5;

/// Upper bound on the worker's readiness wait, in milliseconds. The reconnect
/// sweep and the shutdown check both run at least this often.
pub const POLL_INTERVAL_MS: u64 = 100;

pub use error::{Error, Result};
pub use event::{AlarmEvent, codes};
pub use filter::EventFilter;
pub use parser::{EVENT_MARKER, EventLineParser, Indication, STATUS_OK_LINE};
