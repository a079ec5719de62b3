//! Bridges camera alarm streams to a publish sink.
//!
//! Dahua-style cameras expose their alarm feed as a long-poll HTTP
//! endpoint guarded by Digest auth. This crate attaches to every camera
//! in the roster, keeps the connections alive, and forwards whitelisted
//! alarms to a [`Publisher`]:
//!
//! ```text
//!   camera --attach--> transport reader --bytes--> worker
//!                                                    | parse (vigil-core)
//!                                                    | filter
//!                                                    v
//!                                               dispatcher --> Publisher
//! ```
//!
//! Connections that drop are retried on a fixed delay. The worker task
//! owns all per-camera state; readers are disposable byte pumps.

pub mod config;
pub mod digest;
pub mod dispatch;
pub mod error;
pub mod mux;
pub mod publish;
pub mod state;
pub mod transport;

pub use config::{BridgeConfig, CameraConfig};
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use mux::{BridgeHandle, Multiplexer, MuxConfig, MuxStats};
pub use publish::{ChannelPublisher, JsonlPublisher, LogPublisher, Publication, Publisher};
pub use state::Phase;
