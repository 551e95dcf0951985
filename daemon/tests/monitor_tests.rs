//! Engine behaviour against fake collaborators

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use idle_guard_daemon::{
    activity_log::ActivityKind,
    clock::Clock,
    collector::{DiskRates, MetricSource, NetworkRates, ProcessInfo, ProcessLister, SessionProbe},
    config::MonitorConfig,
    error::{ErrorKind, Metric, MonitorError},
    event::MonitorEvent,
    executor::ShutdownExecutor,
    monitor::{ActivityMonitor, Capabilities, EngineState},
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Clone, Copy)]
struct Reading {
    cpu: f64,
    network: f64,
    disk: f64,
}

const IDLE: Reading = Reading { cpu: 1.0, network: 0.01, disk: 0.01 };
const BUSY: Reading = Reading { cpu: 60.0, network: 0.01, disk: 0.01 };

#[derive(Default)]
struct FakeMetrics {
    reading: Mutex<Option<Reading>>,
    failing: Mutex<Vec<Metric>>,
    hang_cpu: Mutex<bool>,
}

impl FakeMetrics {
    fn set(&self, reading: Reading) {
        *self.reading.lock() = Some(reading);
    }

    fn check(&self, metric: Metric) -> Result<Reading, MonitorError> {
        if self.failing.lock().contains(&metric) {
            return Err(MonitorError::metric(metric, "unavailable"));
        }
        Ok(self.reading.lock().unwrap_or(IDLE))
    }
}

#[async_trait]
impl MetricSource for FakeMetrics {
    async fn cpu_percent(&self) -> Result<f64, MonitorError> {
        let hang = *self.hang_cpu.lock();
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(self.check(Metric::Cpu)?.cpu)
    }

    async fn memory_percent(&self) -> Result<f64, MonitorError> {
        self.check(Metric::Memory)?;
        Ok(30.0)
    }

    async fn network_rates(&self) -> Result<NetworkRates, MonitorError> {
        let r = self.check(Metric::Network)?;
        Ok(NetworkRates { tx_mbps: r.network, rx_mbps: r.network })
    }

    async fn disk_rates(&self) -> Result<DiskRates, MonitorError> {
        let r = self.check(Metric::Disk)?;
        Ok(DiskRates { read_mbs: r.disk, write_mbs: r.disk })
    }
}

#[derive(Default)]
struct FakeLister {
    processes: Mutex<Vec<ProcessInfo>>,
    fail: Mutex<bool>,
}

#[async_trait]
impl ProcessLister for FakeLister {
    async fn list(&self) -> Result<Vec<ProcessInfo>, MonitorError> {
        if *self.fail.lock() {
            return Err(MonitorError::ProcessScan("permission denied".into()));
        }
        Ok(self.processes.lock().clone())
    }
}

struct FakeSessions {
    result: Mutex<Result<usize, MonitorError>>,
}

#[async_trait]
impl SessionProbe for FakeSessions {
    async fn interactive_sessions(&self) -> Result<usize, MonitorError> {
        self.result.lock().clone()
    }
}

#[derive(Default)]
struct FakeExecutor {
    calls: Mutex<Vec<(Duration, String)>>,
    fail: Mutex<bool>,
}

#[async_trait]
impl ShutdownExecutor for FakeExecutor {
    async fn execute(&self, delay: Duration, message: &str) -> Result<(), MonitorError> {
        self.calls.lock().push((delay, message.to_string()));
        if *self.fail.lock() {
            return Err(MonitorError::ShutdownExecution("not permitted".into()));
        }
        Ok(())
    }
}

struct FakeClock {
    now: Mutex<DateTime<Local>>,
}

impl FakeClock {
    fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}

/// Monday 2024-01-01, local time.
fn monday_at(hour: u32, minute: u32) -> DateTime<Local> {
    let naive = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(hour, minute, 0).unwrap();
    Local.from_local_datetime(&naive).earliest().unwrap()
}

struct Harness {
    monitor: ActivityMonitor,
    events: broadcast::Receiver<MonitorEvent>,
    metrics: Arc<FakeMetrics>,
    lister: Arc<FakeLister>,
    sessions: Arc<FakeSessions>,
    executor: Arc<FakeExecutor>,
    clock: Arc<FakeClock>,
}

impl Harness {
    fn new(config: MonitorConfig) -> Self {
        let metrics = Arc::new(FakeMetrics::default());
        let lister = Arc::new(FakeLister::default());
        let sessions = Arc::new(FakeSessions { result: Mutex::new(Ok(1)) });
        let executor = Arc::new(FakeExecutor::default());
        let clock = Arc::new(FakeClock { now: Mutex::new(monday_at(20, 0)) });
        let monitor = ActivityMonitor::new(
            config,
            Capabilities {
                metrics: metrics.clone(),
                processes: lister.clone(),
                sessions: sessions.clone(),
                executor: executor.clone(),
                clock: clock.clone(),
            },
        );
        let events = monitor.subscribe();
        Self { monitor, events, metrics, lister, sessions, executor, clock }
    }

    /// Started engine with the immediate sample and scan already taken and
    /// their events drained. Timed loops stay far in the future.
    async fn running(config: MonitorConfig) -> Self {
        let mut h = Self::new(config);
        h.monitor.start();
        tokio::time::sleep(Duration::from_millis(1)).await;
        h.drain();
        h
    }

    /// Fills the averages with the current reading and runs one decision.
    async fn tick(&self) {
        for _ in 0..3 {
            self.monitor.sample_once().await;
        }
        self.monitor.evaluate().await;
    }

    /// Replaces whatever the averages hold with `reading` and runs one decision.
    async fn tick_with(&self, reading: Reading) {
        self.metrics.set(reading);
        self.monitor.reset_averages();
        self.tick().await;
    }

    fn drain(&mut self) -> Vec<MonitorEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    fn drain_named(&mut self) -> Vec<&'static str> {
        self.drain()
            .iter()
            .map(MonitorEvent::name)
            .filter(|name| !matches!(*name, "stats" | "averages-reset"))
            .collect()
    }
}

fn config() -> MonitorConfig {
    MonitorConfig { trigger_shutdown_times: 3, ..MonitorConfig::default() }
}

fn process(pid: u32, name: &str, cpu: f64) -> ProcessInfo {
    ProcessInfo { pid, name: name.to_string(), cpu_percent: cpu, memory_bytes: 1 << 20 }
}

fn count(events: &[&str], name: &str) -> usize {
    events.iter().filter(|e| **e == name).count()
}

#[tokio::test(start_paused = true)]
async fn warnings_then_exactly_one_shutdown() {
    let mut h = Harness::running(config()).await;

    h.tick_with(IDLE).await;
    h.tick_with(IDLE).await;
    let events = h.drain_named();
    assert_eq!(count(&events, "shutdown-warning"), 2);
    assert_eq!(count(&events, "shutdown-initiated"), 0);
    assert_eq!(h.monitor.trigger_state().consecutive_low_activity, 2);

    h.tick_with(IDLE).await;
    let events = h.drain_named();
    assert_eq!(events, vec!["shutdown-warning", "shutdown-initiated", "shutdown-scheduled"]);
    assert_eq!(h.monitor.state(), EngineState::ShutdownPending);

    let calls = h.executor.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, Duration::from_secs(60));
    assert!(calls[0].1.contains("15 seconds of low activity"));

    // Latched: further idle ticks neither warn nor shut down again
    h.tick_with(IDLE).await;
    let events = h.drain_named();
    assert!(events.is_empty(), "unexpected {:?}", events);
    assert_eq!(h.executor.calls.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn warning_reports_remaining_time() {
    let mut h = Harness::running(MonitorConfig { trigger_shutdown_times: 12, trigger_interval: 5, ..MonitorConfig::default() }).await;
    h.tick_with(IDLE).await;
    let warning = h
        .drain()
        .into_iter()
        .find_map(|e| match e {
            MonitorEvent::ShutdownWarning(w) => Some(w),
            _ => None,
        })
        .unwrap();
    assert_eq!(warning.count, 1);
    assert_eq!(warning.max_count, 12);
    assert_eq!(warning.remaining_seconds, 55);
}

#[tokio::test(start_paused = true)]
async fn activity_resets_the_count() {
    let mut h = Harness::running(config()).await;
    h.tick_with(IDLE).await;
    h.tick_with(IDLE).await;
    h.drain();

    h.tick_with(BUSY).await;
    assert_eq!(h.drain_named(), vec!["activity-detected"]);
    assert_eq!(h.monitor.trigger_state().consecutive_low_activity, 0);

    // No partial credit: a full run is needed again
    h.tick_with(IDLE).await;
    h.tick_with(IDLE).await;
    let events = h.drain_named();
    assert_eq!(count(&events, "shutdown-initiated"), 0);
    assert_eq!(h.monitor.trigger_state().consecutive_low_activity, 2);
}

#[tokio::test(start_paused = true)]
async fn busy_system_from_the_start_emits_nothing() {
    let mut h = Harness::running(config()).await;
    h.tick_with(BUSY).await;
    h.tick_with(BUSY).await;
    assert!(h.drain_named().is_empty());
}

#[tokio::test(start_paused = true)]
async fn thresholds_are_strict() {
    let mut h = Harness::running(config()).await;
    h.tick_with(Reading { cpu: 8.0, ..IDLE }).await;
    assert_eq!(count(&h.drain_named(), "shutdown-warning"), 0);
}

#[tokio::test(start_paused = true)]
async fn no_decision_until_averages_have_data() {
    let mut h = Harness::running(config()).await;
    h.monitor.reset_averages();
    h.monitor.sample_once().await;
    h.monitor.sample_once().await;
    h.monitor.evaluate().await;
    assert!(h.drain().iter().all(|e| !matches!(e, MonitorEvent::Stats(_))));

    h.monitor.sample_once().await;
    h.monitor.evaluate().await;
    assert!(h.drain().iter().any(|e| matches!(e, MonitorEvent::Stats(s) if s.data_points == 3)));
}

#[tokio::test(start_paused = true)]
async fn blackout_suppresses_shutdown() {
    let mut h = Harness::running(MonitorConfig { blackout_periods: "mon-fri 18:00-22:00".into(), ..config() }).await;
    for _ in 0..5 {
        h.tick_with(IDLE).await;
    }
    let events = h.drain_named();
    assert_eq!(count(&events, "shutdown-warning"), 0);
    assert_eq!(count(&events, "shutdown-initiated"), 0);
    // Nothing was counted, so entering the window cancelled nothing
    assert_eq!(count(&events, "blackout-period"), 0);
    assert!(h.executor.calls.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn entering_blackout_clears_the_count_once() {
    let mut h = Harness::running(MonitorConfig { blackout_periods: "mon 20:30-23:00".into(), ..config() }).await;
    h.tick_with(IDLE).await;
    h.tick_with(IDLE).await;
    h.drain();

    h.clock.advance(chrono::Duration::minutes(45));
    h.tick_with(IDLE).await;
    h.tick_with(IDLE).await;
    let events = h.drain_named();
    assert_eq!(events, vec!["blackout-period"]);
    assert_eq!(h.monitor.trigger_state().consecutive_low_activity, 0);
    assert!(h.monitor.recent_activity(100).iter().any(|e| e.kind == ActivityKind::BlackoutPeriod));
}

#[tokio::test(start_paused = true)]
async fn malformed_blackout_fails_open() {
    let mut h = Harness::new(MonitorConfig { blackout_periods: "someday 25:00-26:00".into(), ..config() });
    h.monitor.start();
    h.monitor.stop();
    let errors: Vec<_> = h
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            MonitorEvent::Error { kind, .. } => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec![ErrorKind::ConfigParse]);

    // The broken schedule never blocks a shutdown
    let mut h2 = Harness::running(MonitorConfig { blackout_periods: "someday 25:00-26:00".into(), ..config() }).await;
    for _ in 0..3 {
        h2.tick_with(IDLE).await;
    }
    assert_eq!(count(&h2.drain_named(), "shutdown-initiated"), 1);
}

#[tokio::test(start_paused = true)]
async fn excluded_process_vetoes_low_activity() {
    let mut h = Harness::running(config()).await;
    *h.lister.processes.lock() = vec![process(10, "firefox-bin", 12.0), process(11, "bash", 0.5)];
    h.monitor.refresh_processes().await;

    for _ in 0..4 {
        h.tick_with(IDLE).await;
    }
    let events = h.drain_named();
    assert_eq!(count(&events, "shutdown-warning"), 0);
    assert_eq!(h.monitor.active_processes().len(), 1);

    // Below the CPU threshold the same process no longer counts
    *h.lister.processes.lock() = vec![process(10, "firefox-bin", 1.0)];
    h.monitor.refresh_processes().await;
    h.tick_with(IDLE).await;
    assert_eq!(count(&h.drain_named(), "shutdown-warning"), 1);
}

#[tokio::test(start_paused = true)]
async fn exclusion_check_can_be_disabled() {
    let mut cfg = config();
    cfg.processes.enabled = false;
    let mut h = Harness::running(cfg).await;
    *h.lister.processes.lock() = vec![process(10, "steam", 40.0)];
    h.monitor.refresh_processes().await;
    h.tick_with(IDLE).await;
    assert_eq!(count(&h.drain_named(), "shutdown-warning"), 1);
}

#[tokio::test(start_paused = true)]
async fn busy_critical_process_blocks() {
    let mut h = Harness::running(config()).await;
    *h.lister.processes.lock() = vec![process(5, "gnome-shell", 20.0)];
    h.monitor.refresh_processes().await;
    h.tick_with(IDLE).await;
    assert_eq!(count(&h.drain_named(), "shutdown-warning"), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_process_scan_keeps_previous_snapshot() {
    let mut h = Harness::running(config()).await;
    *h.lister.processes.lock() = vec![process(10, "vlc", 30.0)];
    h.monitor.refresh_processes().await;

    *h.lister.fail.lock() = true;
    h.monitor.refresh_processes().await;
    assert_eq!(h.monitor.active_processes().len(), 1);
    assert!(h
        .drain()
        .iter()
        .any(|e| matches!(e, MonitorEvent::Error { kind: ErrorKind::ProcessScan, .. })));
}

#[tokio::test(start_paused = true)]
async fn extra_sessions_block_shutdown() {
    let mut h = Harness::running(config()).await;
    *h.sessions.result.lock() = Ok(2);
    h.tick_with(IDLE).await;
    assert_eq!(count(&h.drain_named(), "shutdown-warning"), 0);
}

#[tokio::test(start_paused = true)]
async fn session_check_failure_fails_closed() {
    let mut h = Harness::running(config()).await;
    *h.sessions.result.lock() = Err(MonitorError::AdvancedCheck("who missing".into()));
    h.tick_with(IDLE).await;
    let events = h.drain();
    assert!(!events.iter().any(|e| matches!(e, MonitorEvent::ShutdownWarning(_))));
    assert!(events
        .iter()
        .any(|e| matches!(e, MonitorEvent::Error { kind: ErrorKind::AdvancedCheck, .. })));
}

#[tokio::test(start_paused = true)]
async fn advanced_checks_can_be_disabled() {
    let mut cfg = config();
    cfg.advanced.check_sessions = false;
    let mut h = Harness::running(cfg).await;
    *h.sessions.result.lock() = Err(MonitorError::AdvancedCheck("who missing".into()));
    h.tick_with(IDLE).await;
    let events = h.drain_named();
    assert_eq!(count(&events, "shutdown-warning"), 1);
    assert_eq!(count(&events, "error"), 0);
}

#[tokio::test(start_paused = true)]
async fn one_failing_metric_does_not_block_the_others() {
    let mut h = Harness::running(config()).await;
    h.metrics.failing.lock().push(Metric::Memory);
    h.tick_with(IDLE).await;
    let events = h.drain();
    let memory_errors = events
        .iter()
        .filter(|e| matches!(e, MonitorEvent::Error { kind: ErrorKind::MetricFetch, .. }))
        .count();
    assert_eq!(memory_errors, 3);
    assert!(events.iter().any(|e| matches!(e, MonitorEvent::ShutdownWarning(_))));
    assert_eq!(h.monitor.current_stats().memory, 0.0);
}

#[tokio::test(start_paused = true)]
async fn failing_primary_metric_postpones_decisions() {
    let mut h = Harness::running(config()).await;
    h.metrics.failing.lock().push(Metric::Disk);
    h.tick_with(IDLE).await;
    let events = h.drain();
    assert!(!events.iter().any(|e| matches!(e, MonitorEvent::Stats(_) | MonitorEvent::ShutdownWarning(_))));
}

#[tokio::test(start_paused = true)]
async fn executor_failure_leaves_shutdown_pending() {
    let mut h = Harness::running(config()).await;
    *h.executor.fail.lock() = true;
    for _ in 0..3 {
        h.tick_with(IDLE).await;
    }
    let events = h.drain();
    assert!(events.iter().any(|e| matches!(e, MonitorEvent::ShutdownInitiated(_))));
    assert!(!events.iter().any(|e| matches!(e, MonitorEvent::ShutdownScheduled { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, MonitorEvent::Error { kind: ErrorKind::ShutdownExecution, .. })));
    assert_eq!(h.monitor.state(), EngineState::ShutdownPending);

    // No retry
    h.tick_with(IDLE).await;
    assert_eq!(h.executor.calls.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn energy_estimate_follows_uptime() {
    let mut h = Harness::running(config()).await;
    h.clock.advance(chrono::Duration::hours(2));
    for _ in 0..3 {
        h.tick_with(IDLE).await;
    }
    let initiated = h
        .drain()
        .into_iter()
        .find_map(|e| match e {
            MonitorEvent::ShutdownInitiated(s) => Some(s),
            _ => None,
        })
        .unwrap();
    assert!((initiated.estimated_energy_saved_kwh - 0.2).abs() < 1e-9);
    assert_eq!(initiated.total_events, 1);
    assert_eq!(initiated.countdown_seconds, 60);

    let report = h.monitor.system_report();
    assert_eq!(report.uptime_seconds, 7200);
    assert_eq!(report.shutdown_events, 1);
    assert!(report.shutdown_pending);
    assert_eq!(report.trigger_count, 3);
    assert!((report.total_energy_saved_kwh - 0.2).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn activity_log_records_samples_and_decisions() {
    let h = Harness::running(MonitorConfig { max_log_entries: 6, ..config() }).await;
    // The start-up sample is already logged
    assert_eq!(h.monitor.recent_activity(10).len(), 1);
    h.tick_with(IDLE).await;
    let recent = h.monitor.recent_activity(10);
    assert_eq!(recent.len(), 5);
    assert_eq!(recent[0].kind, ActivityKind::ShutdownWarning);

    h.tick_with(IDLE).await;
    assert_eq!(h.monitor.recent_activity(100).len(), 6);
    assert_eq!(h.monitor.system_report().log_entries, 6);
}

#[tokio::test(start_paused = true)]
async fn timers_drive_the_engine_to_shutdown() {
    let mut h = Harness::new(MonitorConfig {
        sample_interval_ms: 200,
        metric_timeout_ms: 100,
        process_scan_interval: 1,
        trigger_interval: 1,
        average_interval_reset: 600,
        trigger_shutdown_times: 3,
        ..MonitorConfig::default()
    });
    h.monitor.start();
    assert_eq!(h.monitor.state(), EngineState::Running);

    tokio::time::sleep(Duration::from_secs(10)).await;
    let events = h.drain_named();
    assert_eq!(events.first(), Some(&"started"));
    assert_eq!(count(&events, "shutdown-warning"), 3);
    assert_eq!(count(&events, "shutdown-initiated"), 1);
    assert_eq!(count(&events, "shutdown-scheduled"), 1);
    assert_eq!(h.monitor.state(), EngineState::ShutdownPending);
    h.monitor.stop();
}

#[tokio::test(start_paused = true)]
async fn stop_halts_every_loop() {
    let mut h = Harness::new(MonitorConfig { trigger_interval: 1, ..config() });
    h.monitor.start();
    h.monitor.start();
    tokio::time::sleep(Duration::from_secs(3)).await;
    h.monitor.stop();
    h.monitor.stop();

    let events = h.drain_named();
    assert_eq!(count(&events, "started"), 1);
    assert_eq!(count(&events, "stopped"), 1);
    assert_eq!(h.monitor.state(), EngineState::Stopped);

    let logged = h.monitor.recent_activity(1000).len();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(h.drain().is_empty());
    assert_eq!(h.monitor.recent_activity(1000).len(), logged);
}

#[tokio::test(start_paused = true)]
async fn reconfigure_restarts_with_new_settings() {
    let mut h = Harness::new(config());
    h.monitor.start();
    h.tick_with(IDLE).await;
    assert_eq!(h.monitor.trigger_state().consecutive_low_activity, 1);
    h.drain();

    let mut updated = config();
    updated.trigger_shutdown_times = 5;
    h.monitor.reconfigure(updated);

    assert_eq!(h.monitor.state(), EngineState::Running);
    assert_eq!(h.monitor.config().trigger_shutdown_times, 5);
    assert_eq!(h.monitor.trigger_state().consecutive_low_activity, 0);
    assert!(!h.monitor.recent_activity(10).is_empty());
    assert_eq!(h.drain_named(), vec!["stopped", "started"]);
    h.monitor.stop();
}

#[tokio::test]
async fn reconfigure_leaves_an_idle_engine_idle() {
    let h = Harness::new(config());
    h.monitor.reconfigure(MonitorConfig { trigger_interval: 30, ..config() });
    assert_eq!(h.monitor.state(), EngineState::Idle);
    assert_eq!(h.monitor.config().trigger_interval, 30);
}

#[tokio::test(start_paused = true)]
async fn ticks_do_nothing_unless_the_engine_runs() {
    let mut h = Harness::new(config());
    for _ in 0..3 {
        h.tick_with(IDLE).await;
    }
    assert!(h.drain().is_empty());
    assert_eq!(h.monitor.state(), EngineState::Idle);
    assert!(h.monitor.recent_activity(10).is_empty());

    h.monitor.start();
    h.monitor.stop();
    for _ in 0..3 {
        h.tick_with(IDLE).await;
    }
    assert_eq!(h.monitor.state(), EngineState::Stopped);

    // A restart begins from a clean count, not a latched shutdown
    h.monitor.start();
    assert_eq!(h.monitor.state(), EngineState::Running);
    assert_eq!(h.monitor.trigger_state().consecutive_low_activity, 0);
    assert!(h.executor.calls.lock().is_empty());
    assert_eq!(h.drain_named(), vec!["started", "stopped", "started"]);
    h.monitor.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_during_a_decision_is_the_last_event() {
    let mut h = Harness::running(config()).await;
    let mut watcher = h.monitor.subscribe();
    let monitor = h.monitor.clone();
    let stopper = tokio::spawn(async move {
        while let Ok(event) = watcher.recv().await {
            if matches!(event, MonitorEvent::ShutdownInitiated(_)) {
                monitor.stop();
                break;
            }
        }
    });

    for _ in 0..3 {
        h.tick_with(IDLE).await;
    }
    stopper.await.unwrap();

    let events = h.drain_named();
    assert_eq!(events.last(), Some(&"stopped"), "events: {:?}", events);
    let initiated = events.iter().position(|e| *e == "shutdown-initiated").unwrap();
    assert!(initiated < events.len() - 1);
    assert_eq!(h.monitor.state(), EngineState::Stopped);
    assert!(h.executor.calls.lock().len() <= 1);

    // Further ticks after the stop stay silent
    h.tick_with(IDLE).await;
    assert!(h.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn hanging_metric_is_cut_off_at_the_timeout() {
    let mut h = Harness::running(MonitorConfig { sample_interval_ms: 1000, metric_timeout_ms: 200, ..config() }).await;
    *h.metrics.hang_cpu.lock() = true;
    let logged = h.monitor.recent_activity(1000).len();

    let started = tokio::time::Instant::now();
    h.monitor.sample_once().await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(200), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1000), "returned after {:?}", elapsed);

    let errors: Vec<_> = h
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            MonitorEvent::Error { kind, message } => Some((kind, message)),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1, "errors: {:?}", errors);
    assert_eq!(errors[0].0, ErrorKind::MetricFetch);
    assert!(errors[0].1.contains("timed out"));

    // The other metrics of that tick were still recorded
    let recent = h.monitor.recent_activity(1000);
    assert_eq!(recent.len(), logged + 1);
    assert_eq!(recent[0].kind, ActivityKind::SystemStats);
    assert!(recent[0].data["cpu_percent"].is_null());
    assert_eq!(recent[0].data["memory_percent"], 30.0);
}
