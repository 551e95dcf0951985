//! Capabilities the engine samples from: system metrics, the process table and
//! interactive sessions. Linux implementations read `/proc`.

mod linux;
mod sessions;
mod system;

pub use linux::LinuxProcessCollector;
pub use sessions::WhoSessionProbe;
pub use system::LinuxMetricSource;

use crate::error::MonitorError;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// Share of the whole machine, 0-100.
    pub cpu_percent: f64,
    pub memory_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NetworkRates {
    pub tx_mbps: f64,
    pub rx_mbps: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DiskRates {
    pub read_mbs: f64,
    pub write_mbs: f64,
}

#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn cpu_percent(&self) -> Result<f64, MonitorError>;
    async fn memory_percent(&self) -> Result<f64, MonitorError>;
    async fn network_rates(&self) -> Result<NetworkRates, MonitorError>;
    async fn disk_rates(&self) -> Result<DiskRates, MonitorError>;
}

#[async_trait]
pub trait ProcessLister: Send + Sync {
    async fn list(&self) -> Result<Vec<ProcessInfo>, MonitorError>;
}

/// Counts interactive login sessions (local console, ssh, remote desktop).
#[async_trait]
pub trait SessionProbe: Send + Sync {
    async fn interactive_sessions(&self) -> Result<usize, MonitorError>;
}
