//! Prometheus metrics helpers for the Vigil bridge.
//!
//! This module provides centralized metrics initialization and the metric
//! descriptions used across Vigil components.
//!
//! # Usage
//!
//! ```rust,ignore
//! use vigil_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Initialize the Prometheus recorder
//!     let handle = init_metrics();
//!
//!     // Start the HTTP server for the /metrics endpoint
//!     start_metrics_server(9187, handle).await.unwrap();
//!
//!     // Now use metrics anywhere in your code
//!     use metrics::{counter, gauge};
//!     counter!("events_parsed_total").increment(1);
//!     gauge!("cameras_streaming").set(3.0);
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: subject (`camera_`, `events_`, `bridge_`)
//! - Suffix: unit or type (`_total`, `_bytes`)
//! - Labels: fixed vocabularies only (`reason` = startup|reconnect); camera
//!   names and event codes are never labels (unbounded cardinality)

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// This must be called once at startup before any metrics are recorded.
/// Returns a handle that can be used with [`start_metrics_server`].
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    // Register all metric descriptions upfront
    register_common_metrics();

    handle
}

/// Try to initialize the Prometheus metrics recorder.
///
/// Like [`init_metrics`] but returns `None` if the recorder is already
/// installed, instead of panicking. Useful for tests or optional metrics.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Start the Prometheus metrics HTTP server.
///
/// Serves the `/metrics` endpoint on the specified port.
/// This spawns a background task and returns immediately.
///
/// # Arguments
///
/// * `port` - TCP port to listen on (e.g., 9187)
/// * `handle` - Prometheus handle from [`init_metrics`]
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    // Spawn the server in the background
    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app).await.unwrap();
    });

    Ok(())
}

/// Register descriptions for the metrics Vigil records.
///
/// Called automatically by [`init_metrics`].
fn register_common_metrics() {
    // =========================================================================
    // Bridge lifecycle
    // =========================================================================

    describe_gauge!(
        "bridge_running",
        "Whether the bridge worker is running (1=yes, 0=no)"
    );
    describe_gauge!("cameras_configured", "Number of cameras in the roster");
    describe_gauge!(
        "cameras_streaming",
        "Number of cameras with a live attach stream"
    );

    // =========================================================================
    // Transport
    // =========================================================================

    describe_counter!(
        "camera_connects_total",
        "Attach attempts started (label: reason = startup|reconnect)"
    );
    describe_counter!(
        "camera_disconnects_total",
        "Transports that closed or errored; reasons go to the log"
    );
    describe_counter!(
        "bytes_read_total",
        "Raw bytes received across all attach streams"
    );

    // =========================================================================
    // Event pipeline
    // =========================================================================

    describe_counter!(
        "events_parsed_total",
        "Well-formed event records decoded from attach streams"
    );
    describe_counter!(
        "events_forwarded_total",
        "Events accepted by the whitelist and dispatched (two publishes each)"
    );
    describe_counter!(
        "events_filtered_total",
        "Events dropped by the per-camera whitelist"
    );
    describe_counter!(
        "parse_errors_total",
        "Event-marker lines that failed to parse (dropped, stream continues)"
    );
}
