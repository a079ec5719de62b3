//! The bridge worker: one task multiplexing every camera stream.
//!
//! ```text
//!   reader (porch)  ---+
//!   reader (garage) ---+--> mpsc --> worker: parse -> filter -> dispatch
//!   reader (...)    ---+
//! ```
//!
//! Readers only pump raw bytes; all per-camera state (parser buffers,
//! connection phase, reconnect deadlines) is owned by the single worker
//! task, so there is no locking and a misbehaving camera cannot touch
//! another camera's state. The worker never blocks indefinitely: channel
//! receives are bounded by the poll interval, and every iteration runs
//! the reconnect sweep and checks the shutdown flag.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use vigil_core::{EventFilter, Indication, POLL_INTERVAL_MS, RECONNECT_DELAY_SECS};

use crate::config::CameraConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::publish::Publisher;
use crate::state::{ConnectionState, Phase};
use crate::transport::{self, TransportEvent};

/// Worker tuning knobs. The defaults match camera firmware behavior and
/// rarely need changing.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Upper bound on how long the worker waits for transport events
    /// before running periodic work (reconnect sweep, shutdown check).
    pub poll_interval: Duration,

    /// Fixed delay between a stream closing and the respawn attempt.
    pub reconnect_delay: Duration,

    /// Transport event channel capacity. Applies backpressure to
    /// readers if the worker falls behind.
    pub channel_capacity: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            reconnect_delay: Duration::from_secs(RECONNECT_DELAY_SECS),
            channel_capacity: 1024,
        }
    }
}

/// Counters accumulated by the worker, returned when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MuxStats {
    pub bytes_read: u64,
    pub events_parsed: u64,
    pub events_forwarded: u64,
    pub events_filtered: u64,
    pub parse_errors: u64,
    /// Reader spawns, including reconnect attempts.
    pub connects: u64,
    pub disconnects: u64,
}

struct CameraEntry {
    config: Arc<CameraConfig>,
    filter: EventFilter,
    state: ConnectionState,
}

/// Owns every camera connection and fans accepted events out to the
/// publisher via the [`Dispatcher`].
pub struct Multiplexer {
    entries: HashMap<String, CameraEntry>,
    dispatcher: Dispatcher,
    client: reqwest::Client,
    tx: mpsc::Sender<TransportEvent>,
    rx: mpsc::Receiver<TransportEvent>,
    running: Arc<AtomicBool>,
    config: MuxConfig,
    stats: MuxStats,
}

// Manual impl: `Dispatcher` holds an `Arc<dyn Publisher>`, which has no
// `Debug` bound, so the derive cannot be used.
impl fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multiplexer")
            .field("cameras", &self.entries.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Multiplexer {
    pub fn new(
        cameras: Vec<CameraConfig>,
        publisher: Arc<dyn Publisher>,
        config: MuxConfig,
    ) -> Result<Self> {
        if cameras.is_empty() {
            return Err(Error::Config("camera roster is empty".into()));
        }

        let client = transport::build_client()?;
        let (tx, rx) = mpsc::channel(config.channel_capacity);

        let mut entries = HashMap::with_capacity(cameras.len());
        for camera in cameras {
            let name = camera.name.clone();
            let entry = CameraEntry {
                filter: EventFilter::new(&camera.events),
                state: ConnectionState::new(&name),
                config: Arc::new(camera),
            };
            if entries.insert(name.clone(), entry).is_some() {
                return Err(Error::Config(format!("duplicate camera name: {name}")));
            }
        }

        Ok(Self {
            entries,
            dispatcher: Dispatcher::new(publisher),
            client,
            tx,
            rx,
            running: Arc::new(AtomicBool::new(false)),
            config,
            stats: MuxStats::default(),
        })
    }

    /// Flag that stops the worker when cleared. Wire it to a signal
    /// handler before calling [`Multiplexer::start`].
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Spawns the worker task and hands back its handle.
    ///
    /// The running flag is raised before the spawn so a `stop` issued
    /// right after `start` cannot race the worker raising it.
    pub fn start(self) -> BridgeHandle {
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);
        let worker = tokio::spawn(self.run());
        BridgeHandle { running, worker }
    }

    async fn run(mut self) -> Result<MuxStats> {
        gauge!("cameras_configured").set(self.entries.len() as f64);
        info!("Starting bridge worker for {} cameras", self.entries.len());

        let names: Vec<String> = self.entries.keys().cloned().collect();
        for name in names {
            self.spawn_reader(&name, "startup");
        }

        while self.running.load(Ordering::SeqCst) {
            match tokio::time::timeout(self.config.poll_interval, self.rx.recv()).await {
                Ok(Some(event)) => self.handle_transport_event(event),
                Ok(None) => {
                    // Unreachable while we hold a sender for respawns;
                    // if it ever fires the worker cannot continue.
                    error!("Transport event channel closed");
                    self.shutdown();
                    return Err(Error::ChannelClosed);
                }
                Err(_) => {
                    // Timeout: fall through to periodic work.
                }
            }

            self.sweep_reconnects(Instant::now());
        }

        info!("Shutdown requested, stopping bridge worker");
        self.shutdown();
        Ok(self.stats)
    }

    /// Spawns a reader for `name` under a fresh generation.
    fn spawn_reader(&mut self, name: &str, reason: &'static str) {
        let Some(entry) = self.entries.get_mut(name) else {
            return;
        };
        let generation = entry.state.next_generation();
        let task = tokio::spawn(transport::run_reader(
            self.client.clone(),
            Arc::clone(&entry.config),
            generation,
            self.tx.clone(),
        ));
        entry.state.begin_connecting(task.abort_handle());
        debug_assert!(entry.state.invariants_hold());

        self.stats.connects += 1;
        counter!("camera_connects_total", "reason" => reason).increment(1);
        debug!("Spawned reader for {} (generation {}, {})", name, generation, reason);
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Chunk {
                camera,
                generation,
                bytes,
            } => {
                let Some(entry) = self.entries.get_mut(&camera) else {
                    warn!("Transport event for unknown camera {}", camera);
                    return;
                };
                if !entry.state.is_current(generation) {
                    trace!("Dropping chunk from a replaced reader of {}", camera);
                    return;
                }

                self.stats.bytes_read += bytes.len() as u64;
                counter!("bytes_read_total").increment(bytes.len() as u64);

                let mut became_streaming = false;
                for indication in entry.state.parser_mut().push(&bytes) {
                    match indication {
                        Indication::Connected => {
                            if entry.state.mark_streaming() {
                                info!("Camera {} is streaming events", camera);
                                became_streaming = true;
                            }
                        }
                        Indication::Event(alarm) => {
                            self.stats.events_parsed += 1;
                            counter!("events_parsed_total").increment(1);
                            if entry.filter.accepts(&alarm.code) {
                                self.dispatcher.dispatch(&entry.config.topic, &alarm);
                                self.stats.events_forwarded += 1;
                                counter!("events_forwarded_total").increment(1);
                            } else {
                                trace!(
                                    "Camera {} event {} not in whitelist",
                                    camera, alarm.code
                                );
                                self.stats.events_filtered += 1;
                                counter!("events_filtered_total").increment(1);
                            }
                        }
                        Indication::Error(err) => {
                            debug!("Camera {} sent an unparseable line: {}", camera, err);
                            self.stats.parse_errors += 1;
                            counter!("parse_errors_total").increment(1);
                        }
                    }
                }
                debug_assert!(entry.state.invariants_hold());

                if became_streaming {
                    self.refresh_streaming_gauge();
                }
            }

            TransportEvent::Closed {
                camera,
                generation,
                reason,
            } => {
                let Some(entry) = self.entries.get_mut(&camera) else {
                    warn!("Close notification for unknown camera {}", camera);
                    return;
                };
                if !entry.state.is_current(generation) {
                    trace!("Dropping close notification from a replaced reader of {}", camera);
                    return;
                }
                if !entry.state.disconnect() {
                    // Already torn down; the reconnect deadline stands.
                    return;
                }

                warn!("Camera {} stream closed: {}", camera, reason);
                self.stats.disconnects += 1;
                counter!("camera_disconnects_total").increment(1);

                entry
                    .state
                    .arm_reconnect(Instant::now() + self.config.reconnect_delay);
                debug_assert!(entry.state.invariants_hold());

                self.refresh_streaming_gauge();
            }
        }
    }

    /// Respawns every camera whose reconnect deadline has passed.
    fn sweep_reconnects(&mut self, now: Instant) {
        let due: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.state.reconnect_due(now))
            .map(|(name, _)| name.clone())
            .collect();

        for name in due {
            info!("Reconnecting camera {}", name);
            self.spawn_reader(&name, "reconnect");
        }
    }

    fn refresh_streaming_gauge(&self) {
        let streaming = self
            .entries
            .values()
            .filter(|entry| entry.state.phase() == Phase::Streaming)
            .count();
        gauge!("cameras_streaming").set(streaming as f64);
    }

    fn shutdown(&mut self) {
        for entry in self.entries.values_mut() {
            if entry.state.disconnect() {
                debug!("Stopped reader for {}", entry.config.name);
            }
        }
        gauge!("cameras_streaming").set(0.0);
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Handle to a started bridge worker.
pub struct BridgeHandle {
    running: Arc<AtomicBool>,
    worker: JoinHandle<Result<MuxStats>>,
}

impl BridgeHandle {
    /// Flag that stops the worker when cleared.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Requests a stop and waits for the worker to finish.
    pub async fn stop(self) -> Result<MuxStats> {
        self.running.store(false, Ordering::SeqCst);
        self.join().await
    }

    /// Waits for the worker to finish on its own.
    pub async fn join(self) -> Result<MuxStats> {
        match self.worker.await {
            Ok(result) => result,
            Err(err) => Err(Error::Worker(err.to_string())),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
