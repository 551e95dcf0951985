//! Activity monitoring engine
//!
//! Owns the moving averages, the process snapshot, the activity log and the
//! trigger detector. Four loops run while the engine is started:
//!
//! * sampling, every `sample_interval_ms`
//! * process scan, every `process_scan_interval` seconds
//! * shutdown decision, every `trigger_interval` seconds
//! * average reset, every `average_interval_reset` seconds
//!
//! All state sits behind a single mutex that is never held across an await.
//! Each loop carries the generation it was started with; `stop()` bumps the
//! generation, so a loop body that finishes after a stop drops its result.
//! Tick bodies only act on a started engine.

use crate::activity_log::{ActivityEntry, ActivityKind, ActivityLog};
use crate::average::MovingAverage;
use crate::blackout::BlackoutSchedule;
use crate::clock::Clock;
use crate::collector::{MetricSource, ProcessInfo, ProcessLister, SessionProbe};
use crate::config::MonitorConfig;
use crate::detector::{Decision, TriggerDetector, TriggerState};
use crate::error::{Metric, MonitorError};
use crate::event::{MonitorEvent, Sample, ShutdownInitiated, ShutdownWarning, Stats};
use crate::executor::ShutdownExecutor;
use crate::snapshot::ProcessSnapshot;
use chrono::{DateTime, Local};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Assumed draw of an idle desktop (100 W), in kWh per hour of uptime.
/// Only an estimate; nothing is measured.
pub const ENERGY_KWH_PER_HOUR: f64 = 0.1;

/// A critical process above this CPU share means someone is at the machine.
const CRITICAL_PROCESS_CPU_FLOOR: f64 = 5.0;

const EXECUTOR_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_PERIOD: Duration = Duration::from_millis(10);
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running,
    ShutdownPending,
    Stopped,
}

impl EngineState {
    fn is_active(self) -> bool {
        matches!(self, EngineState::Running | EngineState::ShutdownPending)
    }
}

/// Collaborators the engine calls into.
#[derive(Clone)]
pub struct Capabilities {
    pub metrics: Arc<dyn MetricSource>,
    pub processes: Arc<dyn ProcessLister>,
    pub sessions: Arc<dyn SessionProbe>,
    pub executor: Arc<dyn ShutdownExecutor>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemReport {
    pub version: &'static str,
    pub state: EngineState,
    pub uptime_seconds: i64,
    pub start_time: DateTime<Local>,
    pub shutdown_events: u32,
    pub total_energy_saved_kwh: f64,
    pub current_stats: Stats,
    pub shutdown_pending: bool,
    pub trigger_count: u32,
    pub active_processes: usize,
    pub log_entries: usize,
}

struct Averages {
    cpu: MovingAverage,
    memory: MovingAverage,
    network_tx: MovingAverage,
    network_rx: MovingAverage,
    disk_read: MovingAverage,
    disk_write: MovingAverage,
}

impl Averages {
    fn new(window: usize) -> Self {
        Self {
            cpu: MovingAverage::new(window),
            memory: MovingAverage::new(window),
            network_tx: MovingAverage::new(window),
            network_rx: MovingAverage::new(window),
            disk_read: MovingAverage::new(window),
            disk_write: MovingAverage::new(window),
        }
    }

    fn fold(&mut self, sample: &Sample) {
        let pairs = [
            (&mut self.cpu, sample.cpu_percent),
            (&mut self.memory, sample.memory_percent),
            (&mut self.network_tx, sample.network_tx_mbps),
            (&mut self.network_rx, sample.network_rx_mbps),
            (&mut self.disk_read, sample.disk_read_mbs),
            (&mut self.disk_write, sample.disk_write_mbs),
        ];
        for (average, value) in pairs {
            if let Some(value) = value {
                average.add(value);
            }
        }
    }

    /// Memory is reported but never gates a decision.
    fn primary_ready(&self) -> bool {
        [&self.cpu, &self.network_tx, &self.network_rx, &self.disk_read, &self.disk_write]
            .iter()
            .all(|a| a.has_enough_data())
    }

    fn reset(&mut self) {
        for average in [
            &mut self.cpu,
            &mut self.memory,
            &mut self.network_tx,
            &mut self.network_rx,
            &mut self.disk_read,
            &mut self.disk_write,
        ] {
            average.reset();
        }
    }

    fn stats(&self, timestamp: DateTime<Local>) -> Stats {
        Stats {
            cpu: self.cpu.average(),
            network_tx: self.network_tx.average(),
            network_rx: self.network_rx.average(),
            disk_read: self.disk_read.average(),
            disk_write: self.disk_write.average(),
            memory: self.memory.average(),
            timestamp,
            data_points: self.cpu.len(),
        }
    }
}

struct Inner {
    config: MonitorConfig,
    state: EngineState,
    generation: u64,
    averages: Averages,
    detector: TriggerDetector,
    blackout: BlackoutSchedule,
    blackout_error: Option<MonitorError>,
    snapshot: ProcessSnapshot,
    log: ActivityLog,
    shutdown_events: u32,
    total_energy_saved: f64,
    tasks: Vec<JoinHandle<()>>,
}

impl Inner {
    fn new(config: MonitorConfig) -> Self {
        let (blackout, blackout_error) = BlackoutSchedule::parse_or_empty(&config.blackout_periods);
        if let Some(e) = &blackout_error {
            warn!("Ignoring blackout periods: {}", e);
        }
        Self {
            averages: Averages::new(config.moving_average_window),
            detector: TriggerDetector::new(config.trigger_shutdown_times),
            log: ActivityLog::new(config.max_log_entries),
            blackout,
            blackout_error,
            config,
            state: EngineState::Idle,
            generation: 0,
            snapshot: ProcessSnapshot::new(),
            shutdown_events: 0,
            total_energy_saved: 0.0,
            tasks: Vec::new(),
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    caps: Capabilities,
    events: broadcast::Sender<MonitorEvent>,
    started_at: DateTime<Local>,
}

#[derive(Debug, Clone, Copy)]
enum Tick {
    Sample,
    ProcessScan,
    Decision,
    AverageReset,
}

/// Handle to the engine. Clones share the same engine.
#[derive(Clone)]
pub struct ActivityMonitor {
    shared: Arc<Shared>,
}

/// What the decision tick needs from the locked state before it awaits anything.
struct DecisionInput {
    config: MonitorConfig,
    stats: Stats,
    blacked_out: bool,
}

struct PendingShutdown {
    countdown: Duration,
    message: String,
}

async fn bounded<T, F>(metric: Metric, limit: Duration, fetch: F) -> Result<T, MonitorError>
where
    F: Future<Output = Result<T, MonitorError>>,
{
    match tokio::time::timeout(limit, fetch).await {
        Ok(result) => result,
        Err(_) => Err(MonitorError::timeout(metric, limit)),
    }
}

fn meets_thresholds(stats: &Stats, config: &MonitorConfig) -> bool {
    let t = &config.thresholds;
    stats.cpu < t.cpu_percent
        && stats.network_tx < t.network_mbps
        && stats.network_rx < t.network_mbps
        && stats.disk_read < t.disk_mbs
        && stats.disk_write < t.disk_mbs
}

impl ActivityMonitor {
    pub fn new(config: MonitorConfig, caps: Capabilities) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let started_at = caps.clock.now();
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::new(config)),
                caps,
                events,
                started_at,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.shared.events.subscribe()
    }

    fn emit(&self, event: MonitorEvent) {
        // Err only means nobody is listening
        let _ = self.shared.events.send(event);
    }

    fn emit_error(&self, error: &MonitorError) {
        warn!("{}", error);
        self.emit(MonitorEvent::Error { kind: error.kind(), message: error.to_string() });
    }

    /// Locks the state only while `generation` is still current. Loop bodies
    /// emit while holding this guard, so nothing they send can follow `stopped`.
    fn lock_current(&self, generation: u64) -> Option<MutexGuard<'_, Inner>> {
        let inner = self.shared.inner.lock();
        (inner.generation == generation).then_some(inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.shared.inner.lock().generation == generation
    }

    /// Generation of the running engine; `None` when idle or stopped.
    fn active_generation(&self) -> Option<u64> {
        let inner = self.shared.inner.lock();
        inner.state.is_active().then_some(inner.generation)
    }

    /// Starts the timers. Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let (generation, config) = {
            let mut inner = self.shared.inner.lock();
            if inner.state.is_active() {
                return;
            }
            inner.generation += 1;
            inner.state = EngineState::Running;
            inner.detector.reset();
            inner.averages.reset();
            (inner.generation, inner.config.clone())
        };

        let tasks = vec![
            self.spawn_ticker(generation, Tick::Sample, config.sample_interval(), true),
            self.spawn_ticker(generation, Tick::ProcessScan, config.process_scan_period(), true),
            self.spawn_ticker(generation, Tick::Decision, config.decision_period(), false),
            self.spawn_ticker(generation, Tick::AverageReset, config.reset_period(), false),
        ];

        let Some(mut inner) = self.lock_current(generation) else {
            // stopped before the handles could be stored
            tasks.iter().for_each(JoinHandle::abort);
            return;
        };
        inner.tasks = tasks;
        info!(
            "Monitoring started: decision every {}s, {} low-activity checks before shutdown",
            config.trigger_interval, config.trigger_shutdown_times
        );
        // Under the lock, so no tick of this run can be seen before it
        self.emit(MonitorEvent::Started);
        if let Some(e) = &inner.blackout_error {
            self.emit_error(e);
        }
    }

    /// Halts every loop. No loop body mutates state or emits once this returns.
    pub fn stop(&self) {
        let tasks = {
            let mut inner = self.shared.inner.lock();
            if !inner.state.is_active() {
                return;
            }
            inner.generation += 1;
            inner.state = EngineState::Stopped;
            std::mem::take(&mut inner.tasks)
        };
        for task in tasks {
            task.abort();
        }
        info!("Monitoring stopped");
        self.emit(MonitorEvent::Stopped);
    }

    /// Swaps the configuration. A running engine is stopped and restarted
    /// with fresh averages and trigger state; shutdown counters are kept.
    pub fn reconfigure(&self, config: MonitorConfig) {
        let was_running = self.state().is_active();
        self.stop();
        {
            let mut inner = self.shared.inner.lock();
            let (blackout, blackout_error) = BlackoutSchedule::parse_or_empty(&config.blackout_periods);
            if let Some(e) = &blackout_error {
                warn!("Ignoring blackout periods: {}", e);
            }

            let mut log = ActivityLog::new(config.max_log_entries);
            for entry in inner.log.recent(config.max_log_entries).into_iter().rev() {
                log.record(entry.timestamp, entry.kind, entry.data);
            }

            inner.averages = Averages::new(config.moving_average_window);
            inner.detector = TriggerDetector::new(config.trigger_shutdown_times);
            inner.blackout = blackout;
            inner.blackout_error = blackout_error;
            inner.log = log;
            inner.config = config;
        }
        info!("Configuration updated");
        if was_running {
            self.start();
        }
    }

    fn spawn_ticker(&self, generation: u64, tick: Tick, period: Duration, immediate: bool) -> JoinHandle<()> {
        let monitor = self.clone();
        let period = period.max(MIN_PERIOD);
        tokio::spawn(async move {
            let first = if immediate { Instant::now() } else { Instant::now() + period };
            let mut ticker = tokio::time::interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let current = match tick {
                    Tick::Sample => monitor.sample(generation).await,
                    Tick::ProcessScan => monitor.scan_processes(generation).await,
                    Tick::Decision => monitor.decide(generation).await,
                    Tick::AverageReset => monitor.reset(generation),
                };
                if !current {
                    debug!("{:?} loop exiting after stop", tick);
                    break;
                }
            }
        })
    }

    /// Runs one sampling tick now. Does nothing unless the engine is started.
    pub async fn sample_once(&self) {
        if let Some(generation) = self.active_generation() {
            self.sample(generation).await;
        }
    }

    /// Runs one process scan now. Does nothing unless the engine is started.
    pub async fn refresh_processes(&self) {
        if let Some(generation) = self.active_generation() {
            self.scan_processes(generation).await;
        }
    }

    /// Runs one shutdown decision now. Does nothing unless the engine is started.
    pub async fn evaluate(&self) {
        if let Some(generation) = self.active_generation() {
            self.decide(generation).await;
        }
    }

    pub fn reset_averages(&self) {
        if let Some(generation) = self.active_generation() {
            self.reset(generation);
        }
    }

    async fn sample(&self, generation: u64) -> bool {
        let limit = self.shared.inner.lock().config.metric_timeout();
        let metrics = &self.shared.caps.metrics;
        let started = std::time::Instant::now();

        let (cpu, memory, network, disk) = tokio::join!(
            bounded(Metric::Cpu, limit, metrics.cpu_percent()),
            bounded(Metric::Memory, limit, metrics.memory_percent()),
            bounded(Metric::Network, limit, metrics.network_rates()),
            bounded(Metric::Disk, limit, metrics.disk_rates()),
        );

        let mut errors = Vec::new();
        let cpu = cpu.map_err(|e| errors.push(e)).ok();
        let memory = memory.map_err(|e| errors.push(e)).ok();
        let network = network.map_err(|e| errors.push(e)).ok();
        let disk = disk.map_err(|e| errors.push(e)).ok();

        let sample = Sample {
            cpu_percent: cpu,
            memory_percent: memory,
            network_tx_mbps: network.map(|n| n.tx_mbps),
            network_rx_mbps: network.map(|n| n.rx_mbps),
            disk_read_mbs: disk.map(|d| d.read_mbs),
            disk_write_mbs: disk.map(|d| d.write_mbs),
            timestamp: self.shared.caps.clock.now(),
            collection_time_ms: started.elapsed().as_millis() as u64,
        };

        let Some(mut inner) = self.lock_current(generation) else {
            return false;
        };
        inner.averages.fold(&sample);
        let data = serde_json::to_value(&sample).unwrap_or_default();
        inner.log.record(sample.timestamp, ActivityKind::SystemStats, data);
        for error in &errors {
            self.emit_error(error);
        }
        true
    }

    async fn scan_processes(&self, generation: u64) -> bool {
        let limit = self.shared.inner.lock().config.process_scan_period().max(MIN_PERIOD);
        let mut snapshot = ProcessSnapshot::new();
        let result = match tokio::time::timeout(limit, snapshot.refresh(self.shared.caps.processes.as_ref())).await {
            Ok(result) => result,
            Err(_) => Err(MonitorError::ProcessScan(format!("timed out after {}ms", limit.as_millis()))),
        };

        let Some(mut inner) = self.lock_current(generation) else {
            return false;
        };
        match result {
            Ok(()) => inner.snapshot = snapshot,
            // The previous snapshot stays in place
            Err(e) => self.emit_error(&e),
        }
        true
    }

    fn reset(&self, generation: u64) -> bool {
        let Some(mut inner) = self.lock_current(generation) else {
            return false;
        };
        inner.averages.reset();
        debug!("Moving averages reset");
        self.emit(MonitorEvent::AveragesReset);
        true
    }

    async fn decide(&self, generation: u64) -> bool {
        let input = {
            let Some(inner) = self.lock_current(generation) else {
                return false;
            };
            if !inner.averages.primary_ready() {
                return true;
            }
            let now = self.shared.caps.clock.now();
            let input = DecisionInput {
                config: inner.config.clone(),
                stats: inner.averages.stats(now),
                blacked_out: inner.blackout.is_blacked_out(&now),
            };
            debug!(
                "CPU {:.1}% | NET tx {:.2} rx {:.2} Mbps | DISK r {:.2} w {:.2} MB/s | MEM {:.1}% ({} samples)",
                input.stats.cpu,
                input.stats.network_tx,
                input.stats.network_rx,
                input.stats.disk_read,
                input.stats.disk_write,
                input.stats.memory,
                input.stats.data_points
            );
            self.emit(MonitorEvent::Stats(input.stats.clone()));
            // Once a shutdown is pending only the stats keep flowing
            if inner.state != EngineState::Running {
                return true;
            }
            input
        };

        if input.blacked_out {
            return self.apply_blackout(generation);
        }

        let low_activity = self.is_low_activity(generation, &input).await;
        let Some(pending) = self.advance(generation, low_activity, input) else {
            return false;
        };
        if let Some(pending) = pending {
            self.execute_shutdown(generation, pending).await;
        }
        self.is_current(generation)
    }

    fn apply_blackout(&self, generation: u64) -> bool {
        let Some(mut inner) = self.lock_current(generation) else {
            return false;
        };
        if inner.state != EngineState::Running {
            return true;
        }
        if let Decision::BlackedOut { previous } = inner.detector.blackout() {
            let now = self.shared.caps.clock.now();
            inner.log.record(now, ActivityKind::BlackoutPeriod, serde_json::json!({ "previous_count": previous }));
            info!("Blackout period active, cleared {} low-activity checks", previous);
            self.emit(MonitorEvent::BlackoutPeriod {
                message: "Shutdown cancelled due to blackout period".to_string(),
            });
        }
        true
    }

    /// Basic thresholds, then the advanced and process checks. Later checks
    /// only run when the earlier ones pass.
    async fn is_low_activity(&self, generation: u64, input: &DecisionInput) -> bool {
        if !meets_thresholds(&input.stats, &input.config) {
            return false;
        }

        match self.advanced_conditions(&input.config).await {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                // Fail closed: an unknown state never counts as idle
                if let Some(_inner) = self.lock_current(generation) {
                    self.emit_error(&e);
                }
                return false;
            }
        }

        if input.config.processes.enabled {
            let inner = self.shared.inner.lock();
            let hit = inner
                .snapshot
                .matches_exclusion_list(&input.config.processes.exclusion_list, input.config.processes.cpu_threshold);
            if let Some(process) = hit {
                debug!("Excluded process {} (pid {}) is active at {:.1}% CPU", process.name, process.pid, process.cpu_percent);
                return false;
            }
        }
        true
    }

    async fn advanced_conditions(&self, config: &MonitorConfig) -> Result<bool, MonitorError> {
        if config.advanced.check_sessions {
            let limit = config.decision_period().max(MIN_PERIOD);
            let sessions = match tokio::time::timeout(limit, self.shared.caps.sessions.interactive_sessions()).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(MonitorError::AdvancedCheck(format!(
                        "session check timed out after {}ms",
                        limit.as_millis()
                    )))
                }
            };
            if sessions > 1 {
                debug!("{} interactive sessions open", sessions);
                return Ok(false);
            }
        }

        if config.advanced.check_critical_processes {
            let inner = self.shared.inner.lock();
            let busy = inner
                .snapshot
                .critical_processes()
                .into_iter()
                .find(|p| p.cpu_percent > CRITICAL_PROCESS_CPU_FLOOR);
            if let Some(process) = busy {
                debug!("Critical process {} is busy at {:.1}% CPU", process.name, process.cpu_percent);
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Feeds the verdict to the detector and emits what it decided. Only a
    /// running engine counts ticks. `None` when the engine was stopped meanwhile.
    fn advance(&self, generation: u64, low_activity: bool, input: DecisionInput) -> Option<Option<PendingShutdown>> {
        let mut inner = self.lock_current(generation)?;
        if inner.state != EngineState::Running {
            return Some(None);
        }

        let now = self.shared.caps.clock.now();
        let config = input.config;
        let mut pending = None;

        match inner.detector.observe(low_activity) {
            Decision::Counted { count, initiate } => {
                let remaining_seconds = inner.detector.remaining_ticks(count) as u64 * config.trigger_interval;
                let warning = ShutdownWarning {
                    count,
                    max_count: inner.detector.threshold(),
                    remaining_seconds,
                    stats: input.stats,
                    reason: "Low system activity detected".to_string(),
                };
                info!("Low activity {}/{}, shutdown in {}s", count, warning.max_count, remaining_seconds);
                let data = serde_json::to_value(&warning).unwrap_or_default();
                inner.log.record(now, ActivityKind::ShutdownWarning, data);
                self.emit(MonitorEvent::ShutdownWarning(warning));

                if initiate {
                    inner.state = EngineState::ShutdownPending;
                    inner.shutdown_events += 1;
                    let hours = (now - self.shared.started_at).num_milliseconds().max(0) as f64 / 3_600_000.0;
                    let energy = hours * ENERGY_KWH_PER_HOUR;
                    inner.total_energy_saved += energy;

                    let initiated = ShutdownInitiated {
                        countdown_seconds: config.trigger_shutdown_countdown,
                        estimated_energy_saved_kwh: energy,
                        total_events: inner.shutdown_events,
                    };
                    info!("Shutdown initiated, countdown {}s", config.trigger_shutdown_countdown);
                    let data = serde_json::to_value(&initiated).unwrap_or_default();
                    inner.log.record(now, ActivityKind::ShutdownInitiated, data);
                    self.emit(MonitorEvent::ShutdownInitiated(initiated));

                    pending = Some(PendingShutdown {
                        countdown: Duration::from_secs(config.trigger_shutdown_countdown),
                        message: format!(
                            "System shutdown by IdleGuard v{}. Triggered after {} seconds of low activity. Estimated energy saved: {:.2} kWh",
                            VERSION,
                            config.trigger_shutdown_times as u64 * config.trigger_interval,
                            energy
                        ),
                    });
                }
            }
            Decision::ActivityResumed { previous } => {
                info!("Activity resumed after {} low-activity checks", previous);
                inner.log.record(now, ActivityKind::ActivityDetected, serde_json::json!({ "previous_count": previous }));
                self.emit(MonitorEvent::ActivityDetected);
            }
            Decision::BlackedOut { .. } | Decision::Unchanged => {}
        }
        Some(pending)
    }

    async fn execute_shutdown(&self, generation: u64, pending: PendingShutdown) {
        if !self.is_current(generation) {
            debug!("Engine stopped before the shutdown command ran");
            return;
        }
        let countdown_seconds = pending.countdown.as_secs();
        let executor = &self.shared.caps.executor;
        let result = match tokio::time::timeout(EXECUTOR_TIMEOUT, executor.execute(pending.countdown, &pending.message)).await {
            Ok(result) => result,
            Err(_) => Err(MonitorError::ShutdownExecution("shutdown command timed out".to_string())),
        };

        let Some(_inner) = self.lock_current(generation) else {
            debug!("Engine stopped while the shutdown command ran");
            return;
        };
        match result {
            Ok(()) => {
                info!("Shutdown scheduled in {}s", countdown_seconds);
                self.emit(MonitorEvent::ShutdownScheduled { countdown_seconds });
            }
            // No retry: another full trigger cycle needs a restart
            Err(e) => self.emit_error(&e),
        }
    }

    pub fn state(&self) -> EngineState {
        self.shared.inner.lock().state
    }

    pub fn trigger_state(&self) -> TriggerState {
        self.shared.inner.lock().detector.state()
    }

    pub fn config(&self) -> MonitorConfig {
        self.shared.inner.lock().config.clone()
    }

    pub fn current_stats(&self) -> Stats {
        let now = self.shared.caps.clock.now();
        self.shared.inner.lock().averages.stats(now)
    }

    pub fn recent_activity(&self, count: usize) -> Vec<ActivityEntry> {
        self.shared.inner.lock().log.recent(count)
    }

    pub fn active_processes(&self) -> Vec<ProcessInfo> {
        let inner = self.shared.inner.lock();
        inner.snapshot.active_processes(inner.config.processes.cpu_threshold)
    }

    pub fn system_report(&self) -> SystemReport {
        let now = self.shared.caps.clock.now();
        let inner = self.shared.inner.lock();
        let trigger = inner.detector.state();
        SystemReport {
            version: VERSION,
            state: inner.state,
            uptime_seconds: (now - self.shared.started_at).num_seconds().max(0),
            start_time: self.shared.started_at,
            shutdown_events: inner.shutdown_events,
            total_energy_saved_kwh: inner.total_energy_saved,
            current_stats: inner.averages.stats(now),
            shutdown_pending: trigger.shutdown_pending,
            trigger_count: trigger.consecutive_low_activity,
            active_processes: inner.snapshot.active_processes(inner.config.processes.cpu_threshold).len(),
            log_entries: inner.log.len(),
        }
    }
}
