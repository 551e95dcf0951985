//! Machine-wide CPU, memory, network and disk rates from `/proc`

use super::{DiskRates, MetricSource, NetworkRates};
use crate::error::{Metric, MonitorError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::time::Instant;

const SECTOR_BYTES: f64 = 512.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_TO_MEGABITS: f64 = 8e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CpuTimes {
    pub busy: u64,
    pub total: u64,
}

/// Parses the aggregate `cpu` line of `/proc/stat`. Guest time is already
/// part of user time, so only the first eight columns are summed.
pub(crate) fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|v| v.parse().ok())
        .collect::<Option<_>>()?;
    if values.len() < 4 {
        return None;
    }
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    let total: u64 = values.iter().sum();
    Some(CpuTimes { busy: total.saturating_sub(idle), total })
}

pub(crate) fn parse_memory_percent(meminfo: &str) -> Option<f64> {
    let mut total = None;
    let mut available = None;
    for line in meminfo.lines() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("MemTotal:") => total = parts.next().and_then(|v| v.parse::<f64>().ok()),
            Some("MemAvailable:") => available = parts.next().and_then(|v| v.parse::<f64>().ok()),
            _ => {}
        }
    }
    let (total, available) = (total?, available?);
    if total <= 0.0 {
        return None;
    }
    Some(((total - available) / total * 100.0).clamp(0.0, 100.0))
}

/// Total (rx, tx) bytes across every interface except loopback. A machine
/// with only loopback reports zero traffic.
pub(crate) fn parse_net_dev(content: &str) -> Option<(u64, u64)> {
    if !content.starts_with("Inter-") {
        return None;
    }
    let mut rx_total = 0u64;
    let mut tx_total = 0u64;
    for line in content.lines().skip(2) {
        let Some((iface, counters)) = line.split_once(':') else { continue };
        if iface.trim() == "lo" {
            continue;
        }
        let fields: Vec<&str> = counters.split_whitespace().collect();
        if fields.len() < 9 {
            continue;
        }
        rx_total = rx_total.saturating_add(fields[0].parse().ok()?);
        tx_total = tx_total.saturating_add(fields[8].parse().ok()?);
    }
    Some((rx_total, tx_total))
}

/// Total (read, written) sectors across the devices accepted by `is_disk`.
/// An empty table (no block devices, as in some containers) reads as zero.
pub(crate) fn parse_diskstats(content: &str, is_disk: impl Fn(&str) -> bool) -> Option<(u64, u64)> {
    let mut read = 0u64;
    let mut written = 0u64;
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }
        let name = fields[2];
        if !is_disk(name) {
            continue;
        }
        read = read.saturating_add(fields[5].parse().ok()?);
        written = written.saturating_add(fields[9].parse().ok()?);
    }
    Some((read, written))
}

fn is_physical_disk(name: &str) -> bool {
    if ["loop", "ram", "zram"].iter().any(|p| name.starts_with(p)) {
        return false;
    }
    // Partitions are not listed in /sys/block, whole devices are
    Path::new("/sys/block").join(name).exists()
}

/// Remembers the previous counter reading so each call can report a rate.
struct RateTracker {
    last: Option<(Instant, u64, u64)>,
}

impl RateTracker {
    fn new() -> Self {
        Self { last: None }
    }

    /// Per-second deltas since the previous reading; (0, 0) on the first one.
    fn update(&mut self, now: Instant, a: u64, b: u64) -> (f64, f64) {
        let rates = match self.last {
            Some((then, prev_a, prev_b)) => {
                let elapsed = now.duration_since(then).as_secs_f64();
                if elapsed > 0.0 {
                    (a.saturating_sub(prev_a) as f64 / elapsed, b.saturating_sub(prev_b) as f64 / elapsed)
                } else {
                    (0.0, 0.0)
                }
            }
            None => (0.0, 0.0),
        };
        self.last = Some((now, a, b));
        rates
    }
}

pub struct LinuxMetricSource {
    cpu: Mutex<Option<CpuTimes>>,
    network: Mutex<RateTracker>,
    disk: Mutex<RateTracker>,
}

impl LinuxMetricSource {
    pub fn new() -> Self {
        Self {
            cpu: Mutex::new(None),
            network: Mutex::new(RateTracker::new()),
            disk: Mutex::new(RateTracker::new()),
        }
    }
}

impl Default for LinuxMetricSource {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_proc(metric: Metric, path: &str) -> Result<String, MonitorError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| MonitorError::metric(metric, format!("{}: {}", path, e)))
}

#[async_trait]
impl MetricSource for LinuxMetricSource {
    async fn cpu_percent(&self) -> Result<f64, MonitorError> {
        let stat = read_proc(Metric::Cpu, "/proc/stat").await?;
        let times = parse_cpu_times(&stat).ok_or_else(|| MonitorError::metric(Metric::Cpu, "unrecognised /proc/stat"))?;

        let mut last = self.cpu.lock();
        let percent = match *last {
            Some(prev) => {
                let total = times.total.saturating_sub(prev.total);
                let busy = times.busy.saturating_sub(prev.busy);
                if total == 0 {
                    0.0
                } else {
                    busy as f64 / total as f64 * 100.0
                }
            }
            None => 0.0,
        };
        *last = Some(times);
        Ok(percent)
    }

    async fn memory_percent(&self) -> Result<f64, MonitorError> {
        let meminfo = read_proc(Metric::Memory, "/proc/meminfo").await?;
        parse_memory_percent(&meminfo).ok_or_else(|| MonitorError::metric(Metric::Memory, "unrecognised /proc/meminfo"))
    }

    async fn network_rates(&self) -> Result<NetworkRates, MonitorError> {
        let content = read_proc(Metric::Network, "/proc/net/dev").await?;
        let (rx, tx) = parse_net_dev(&content)
            .ok_or_else(|| MonitorError::metric(Metric::Network, "unrecognised /proc/net/dev"))?;
        let (rx_rate, tx_rate) = self.network.lock().update(Instant::now(), rx, tx);
        Ok(NetworkRates {
            tx_mbps: tx_rate * BYTES_TO_MEGABITS,
            rx_mbps: rx_rate * BYTES_TO_MEGABITS,
        })
    }

    async fn disk_rates(&self) -> Result<DiskRates, MonitorError> {
        let content = read_proc(Metric::Disk, "/proc/diskstats").await?;
        let (read, written) = parse_diskstats(&content, is_physical_disk)
            .ok_or_else(|| MonitorError::metric(Metric::Disk, "unrecognised /proc/diskstats"))?;
        let (read_rate, write_rate) = self.disk.lock().update(Instant::now(), read, written);
        Ok(DiskRates {
            read_mbs: read_rate * SECTOR_BYTES / BYTES_PER_MB,
            write_mbs: write_rate * SECTOR_BYTES / BYTES_PER_MB,
        })
    }
}
