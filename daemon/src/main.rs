use anyhow::Result;
use clap::Parser;
use idle_guard_daemon::{
    clock::SystemClock,
    collector::{LinuxMetricSource, LinuxProcessCollector, WhoSessionProbe},
    config::Config,
    event::MonitorEvent,
    executor::SystemShutdownExecutor,
    journal::Journal,
    monitor::{ActivityMonitor, Capabilities},
    notifier::Notifier,
    protocol::{Request, Response},
    socket::{RequestHandler, StatusServer},
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const REPORT_ENTRIES: usize = 100;
const MAX_EXIT_DELAY_SECS: u64 = 10;

#[derive(Parser, Debug)]
#[command(name = "idle-guard", version, about = "Shuts the machine down after a sustained period of low activity")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Decide but never run the shutdown command
    #[arg(long)]
    dry_run: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

struct DaemonState {
    monitor: ActivityMonitor,
    journal: Option<Mutex<Journal>>,
    config: Config,
}

impl DaemonState {
    async fn record_event(&self, event: &MonitorEvent) {
        if matches!(event, MonitorEvent::Stats(_)) {
            return;
        }
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.lock().await.insert_event(event) {
                error!("Failed to journal event: {}", e);
            }
        }
    }

    async fn save_report(&self) {
        let Some(journal) = &self.journal else { return };
        let report = self.monitor.system_report();
        let entries = self.monitor.recent_activity(REPORT_ENTRIES);
        match journal.lock().await.save_report(&report, &entries) {
            Ok(_) => debug!("Report saved"),
            Err(e) => error!("Failed to save report: {}", e),
        }
    }
}

fn to_response<T: Serialize>(value: &T) -> Response {
    match serde_json::to_value(value) {
        Ok(data) => Response::data(data),
        Err(e) => Response::error(e),
    }
}

#[async_trait::async_trait]
impl RequestHandler for DaemonState {
    async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,
            Request::GetStatus => to_response(&self.monitor.system_report()),
            Request::GetStats => to_response(&self.monitor.current_stats()),
            Request::GetActivity { params } => {
                to_response(&self.monitor.recent_activity(params.limit_or(50) as usize))
            }
            Request::ListProcesses => to_response(&self.monitor.active_processes()),
            Request::GetConfig => to_response(&self.config),
            Request::GetEvents { params } => {
                let Some(journal) = &self.journal else {
                    return Response::error("journal is disabled");
                };
                let result = journal.lock().await.get_events(params.limit_or(50), None);
                match result {
                    Ok(events) => {
                        let data: Vec<_> = events
                            .iter()
                            .map(|e| {
                                serde_json::json!({
                                    "id": e.id,
                                    "timestamp": e.timestamp,
                                    "kind": e.kind,
                                    "payload": e.payload,
                                })
                            })
                            .collect();
                        Response::data(serde_json::json!(data))
                    }
                    Err(e) => Response::error(e),
                }
            }
        }
    }
}

fn log_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::Started => info!("Monitoring started"),
        MonitorEvent::Stopped => info!("Monitoring stopped"),
        MonitorEvent::Stats(stats) => debug!(
            "CPU {:.1}% | NET up {:.2} down {:.2} Mbps | DISK r {:.2} w {:.2} MB/s | MEM {:.1}% ({} samples)",
            stats.cpu, stats.network_tx, stats.network_rx, stats.disk_read, stats.disk_write, stats.memory, stats.data_points
        ),
        MonitorEvent::ShutdownWarning(w) => warn!(
            "Low activity detected: shutdown in {}s ({}/{} triggers) - {}",
            w.remaining_seconds, w.count, w.max_count, w.reason
        ),
        MonitorEvent::ActivityDetected => info!("System activity resumed, shutdown cancelled"),
        MonitorEvent::ShutdownInitiated(s) => {
            info!("SHUTDOWN INITIATED: system will shut down in {} seconds", s.countdown_seconds);
            info!("Estimated energy saved this session: {:.2} kWh", s.estimated_energy_saved_kwh);
            info!("Total shutdown events: {}", s.total_events);
        }
        MonitorEvent::ShutdownScheduled { .. } => info!("Shutdown command executed successfully"),
        MonitorEvent::BlackoutPeriod { message } => info!("{}", message),
        MonitorEvent::AveragesReset => debug!("Statistical averages reset"),
        MonitorEvent::Error { kind, message } => error!("Monitor error ({:?}): {}", kind, message),
    }
}

async fn event_loop(
    state: Arc<DaemonState>,
    mut events: broadcast::Receiver<MonitorEvent>,
    notifier: Notifier,
    exit_tx: mpsc::Sender<()>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event consumer lagging, skipped {} events", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        log_event(&event);
        notifier.notify(&event);
        state.record_event(&event).await;

        if let MonitorEvent::ShutdownScheduled { countdown_seconds } = event {
            let exit_tx = exit_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(countdown_seconds.min(MAX_EXIT_DELAY_SECS))).await;
                let _ = exit_tx.send(()).await;
            });
        }
    }
}

async fn report_loop(state: Arc<DaemonState>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // The first tick fires immediately; skip it
    interval.tick().await;
    loop {
        interval.tick().await;
        state.save_report().await;
    }
}

fn open_journal(config: &Config) -> Option<Journal> {
    if !config.journal.enabled {
        return None;
    }
    let opened = Journal::open_default().and_then(|journal| {
        journal.init_schema()?;
        journal.cleanup_old_data(config.journal.retention_days)?;
        Ok(journal)
    });
    match opened {
        Ok(journal) => Some(journal),
        Err(e) => {
            warn!("Journal unavailable, continuing without it: {}", e);
            None
        }
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let (mut config, load_problem) = if config_path.exists() {
        match Config::load(&config_path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(format!("Failed to load config: {}, using defaults", e))),
        }
    } else {
        (Config::default(), None)
    };
    if cli.dry_run {
        config.shutdown.dry_run = true;
    }

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    init_tracing(config.general.debug);
    info!("IdleGuard daemon starting...");
    match load_problem {
        Some(problem) => warn!("{}", problem),
        None if !config_path.exists() => info!("No config file at {:?}, using defaults", config_path),
        None => info!("Loaded config from {:?}", config_path),
    }

    info!(
        "Thresholds: CPU {}% | network {} Mbps | disk {} MB/s | {} checks every {}s | countdown {}s",
        config.monitor.thresholds.cpu_percent,
        config.monitor.thresholds.network_mbps,
        config.monitor.thresholds.disk_mbs,
        config.monitor.trigger_shutdown_times,
        config.monitor.trigger_interval,
        config.monitor.trigger_shutdown_countdown
    );
    if config.shutdown.dry_run {
        info!("Dry run: the shutdown command will only be logged");
    }

    let caps = Capabilities {
        metrics: Arc::new(LinuxMetricSource::new()),
        processes: Arc::new(LinuxProcessCollector::new()),
        sessions: Arc::new(WhoSessionProbe::new()),
        executor: Arc::new(SystemShutdownExecutor::new(config.shutdown.dry_run)),
        clock: Arc::new(SystemClock),
    };
    let monitor = ActivityMonitor::new(config.monitor.clone(), caps);

    let state = Arc::new(DaemonState {
        monitor: monitor.clone(),
        journal: open_journal(&config).map(Mutex::new),
        config: config.clone(),
    });

    if config.ipc.enabled {
        match StatusServer::bind(&StatusServer::default_path()).await {
            Ok(server) => {
                let events = monitor.clone();
                tokio::spawn(server.serve(Arc::clone(&state), move || events.subscribe()));
            }
            Err(e) => warn!("Status socket unavailable: {}", e),
        }
    }

    let (exit_tx, mut exit_rx) = mpsc::channel(1);
    let notifier = Notifier::new(config.notifications.enabled);
    tokio::spawn(event_loop(Arc::clone(&state), monitor.subscribe(), notifier, exit_tx));

    if state.journal.is_some() {
        tokio::spawn(report_loop(Arc::clone(&state), Duration::from_secs(config.journal.save_interval)));
    }

    monitor.start();

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down gracefully..."),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
        _ = exit_rx.recv() => info!("Shutdown scheduled, exiting"),
    }

    let report = monitor.system_report();
    info!(
        "Session: uptime {} minutes | shutdown events {} | energy saved {:.2} kWh | log entries {}",
        report.uptime_seconds / 60,
        report.shutdown_events,
        report.total_energy_saved_kwh,
        report.log_entries
    );
    state.save_report().await;
    monitor.stop();

    // Let the event loop drain the stop event
    tokio::time::sleep(Duration::from_millis(100)).await;
    info!("IdleGuard closed");
    Ok(())
}
