//! Vigil camera event bridge daemon.
//!
//! Attaches to every camera in the roster and forwards whitelisted
//! alarm events to the selected publish sink.
//!
//! # Usage
//!
//! ```bash
//! # Run with the default roster file (./cameras.toml)
//! vigil-bridge
//!
//! # Custom roster and JSON-lines output
//! vigil-bridge --config /etc/vigil/cameras.toml --sink jsonl
//! ```
//!
//! # Graceful Shutdown
//!
//! The daemon handles SIGINT (Ctrl+C) for graceful shutdown:
//! 1. Stops the worker loop
//! 2. Aborts all camera readers
//! 3. Prints a summary and exits cleanly

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use metrics::gauge;
use tracing_subscriber::EnvFilter;

use vigil_core::metrics::{init_metrics, start_metrics_server};
use vigil_core::{POLL_INTERVAL_MS, RECONNECT_DELAY_SECS};

use vigil_bridge::{
    BridgeConfig, JsonlPublisher, LogPublisher, Multiplexer, MuxConfig, Publisher,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Sink {
    /// Emit publications as structured log lines.
    Log,
    /// Emit publications as JSON objects on stdout, one per line.
    Jsonl,
}

/// Vigil camera event bridge daemon.
#[derive(Parser, Debug)]
#[command(name = "vigil-bridge")]
#[command(about = "Bridges camera alarm streams to a publish sink")]
#[command(version)]
struct Args {
    /// Path to the TOML camera roster
    #[arg(long, short, default_value = "cameras.toml")]
    config: PathBuf,

    /// Publish sink
    #[arg(long, value_enum, default_value_t = Sink::Log)]
    sink: Sink,

    /// Seconds to wait before reconnecting a dropped camera
    #[arg(long, default_value_t = RECONNECT_DELAY_SECS)]
    reconnect_delay_secs: u64,

    /// Worker poll interval in milliseconds
    #[arg(long, default_value_t = POLL_INTERVAL_MS)]
    poll_interval_ms: u64,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "9187")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap())
                .add_directive("vigil_bridge=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    tracing::info!("Vigil camera event bridge starting...");

    // Initialize metrics
    if args.metrics_port > 0 {
        let metrics_handle = init_metrics();
        start_metrics_server(args.metrics_port, metrics_handle).await?;
        gauge!("bridge_running").set(1.0);
    }

    let config = BridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load roster from {}", args.config.display()))?;

    tracing::info!("Configuration:");
    tracing::info!("  Roster: {}", args.config.display());
    tracing::info!("  Sink: {:?}", args.sink);
    tracing::info!("  Reconnect delay: {}s", args.reconnect_delay_secs);
    for camera in &config.cameras {
        tracing::info!(
            "  Camera {}: {}:{} -> {} ({} event codes)",
            camera.name,
            camera.host,
            camera.port,
            camera.topic,
            camera.events.len()
        );
    }

    let publisher: Arc<dyn Publisher> = match args.sink {
        Sink::Log => Arc::new(LogPublisher),
        Sink::Jsonl => Arc::new(JsonlPublisher),
    };

    let mux_config = MuxConfig {
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        reconnect_delay: Duration::from_secs(args.reconnect_delay_secs),
        ..Default::default()
    };
    let mux = Multiplexer::new(config.cameras, publisher, mux_config)
        .context("Failed to build the bridge")?;

    // Set up graceful shutdown
    let shutdown = mux.shutdown_flag();
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, stopping gracefully...");
        shutdown.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    tracing::info!("Starting bridge...");
    let handle = mux.start();
    let stats = handle.join().await?;

    // Mark as stopped
    gauge!("bridge_running").set(0.0);

    // Print summary
    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("SHUTDOWN COMPLETE");
    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("Bytes read:        {}", stats.bytes_read);
    tracing::info!("Events parsed:     {}", stats.events_parsed);
    tracing::info!("Events forwarded:  {}", stats.events_forwarded);
    tracing::info!("Events filtered:   {}", stats.events_filtered);
    tracing::info!("Parse errors:      {}", stats.parse_errors);
    tracing::info!("Reader spawns:     {}", stats.connects);
    tracing::info!("Disconnects:       {}", stats.disconnects);

    Ok(())
}
