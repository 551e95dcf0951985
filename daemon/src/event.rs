//! Engine events and the payloads they carry

use crate::error::ErrorKind;
use chrono::{DateTime, Local};
use serde::Serialize;

/// One sampling tick. A metric whose source failed this tick is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub network_tx_mbps: Option<f64>,
    pub network_rx_mbps: Option<f64>,
    pub disk_read_mbs: Option<f64>,
    pub disk_write_mbs: Option<f64>,
    pub timestamp: DateTime<Local>,
    pub collection_time_ms: u64,
}

/// Current moving averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub cpu: f64,
    pub network_tx: f64,
    pub network_rx: f64,
    pub disk_read: f64,
    pub disk_write: f64,
    pub memory: f64,
    pub timestamp: DateTime<Local>,
    pub data_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShutdownWarning {
    pub count: u32,
    pub max_count: u32,
    pub remaining_seconds: u64,
    pub stats: Stats,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShutdownInitiated {
    pub countdown_seconds: u64,
    /// Rough estimate, see `ENERGY_KWH_PER_HOUR`.
    pub estimated_energy_saved_kwh: f64,
    pub total_events: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum MonitorEvent {
    Started,
    Stopped,
    Stats(Stats),
    ShutdownWarning(ShutdownWarning),
    ActivityDetected,
    ShutdownInitiated(ShutdownInitiated),
    ShutdownScheduled { countdown_seconds: u64 },
    BlackoutPeriod { message: String },
    AveragesReset,
    Error { kind: ErrorKind, message: String },
}

impl MonitorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MonitorEvent::Started => "started",
            MonitorEvent::Stopped => "stopped",
            MonitorEvent::Stats(_) => "stats",
            MonitorEvent::ShutdownWarning(_) => "shutdown-warning",
            MonitorEvent::ActivityDetected => "activity-detected",
            MonitorEvent::ShutdownInitiated(_) => "shutdown-initiated",
            MonitorEvent::ShutdownScheduled { .. } => "shutdown-scheduled",
            MonitorEvent::BlackoutPeriod { .. } => "blackout-period",
            MonitorEvent::AveragesReset => "averages-reset",
            MonitorEvent::Error { .. } => "error",
        }
    }
}
