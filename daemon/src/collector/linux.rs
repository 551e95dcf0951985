use super::{ProcessInfo, ProcessLister};
use crate::error::MonitorError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
struct CpuSample {
    total_ticks: u64, // utime + stime
    timestamp: Instant,
}

/// Fields pulled out of `/proc/<pid>/stat`.
#[derive(Debug, PartialEq)]
pub(crate) struct StatFields {
    pub name: String,
    pub total_ticks: u64,
    pub rss_pages: u64,
}

/// `comm` may contain spaces and parentheses, so fields are counted from the last `)`.
pub(crate) fn parse_stat(content: &str) -> Option<StatFields> {
    let open = content.find('(')?;
    let close = content.rfind(')')?;
    if close <= open {
        return None;
    }
    let name = content[open + 1..close].to_string();
    let rest: Vec<&str> = content[close + 1..].split_whitespace().collect();
    // rest[0] is field 3 (state)
    if rest.len() < 22 {
        return None;
    }
    let utime: u64 = rest[11].parse().ok()?;
    let stime: u64 = rest[12].parse().ok()?;
    let rss_pages: u64 = rest[21].parse().ok()?;
    Some(StatFields { name, total_ticks: utime + stime, rss_pages })
}

#[derive(Clone)]
pub struct LinuxProcessCollector {
    page_size: u64,
    clock_ticks: u64,
    num_cpus: u64,
    cpu_samples: Arc<Mutex<HashMap<u32, CpuSample>>>,
}

impl LinuxProcessCollector {
    pub fn new() -> Self {
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) }.max(1) as u64;
        let clock_ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) }.max(1) as u64;
        let num_cpus = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) }.max(1) as u64;
        Self {
            page_size,
            clock_ticks,
            num_cpus,
            cpu_samples: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn parse_process(&self, pid: u32) -> Option<ProcessInfo> {
        let proc_dir = Path::new("/proc").join(pid.to_string());
        let stat_content = fs::read_to_string(proc_dir.join("stat")).ok()?;
        let fields = parse_stat(&stat_content)?;
        let now = Instant::now();

        // First sight of a pid reports 0% until a second sample exists
        let cpu_percent = {
            let mut samples = self.cpu_samples.lock();
            let percent = match samples.get(&pid) {
                Some(prev) => {
                    let tick_delta = fields.total_ticks.saturating_sub(prev.total_ticks);
                    let elapsed = now.duration_since(prev.timestamp).as_secs_f64();
                    if elapsed > 0.0 {
                        let cpu_seconds = tick_delta as f64 / self.clock_ticks as f64;
                        (cpu_seconds / elapsed) * 100.0 / self.num_cpus as f64
                    } else {
                        0.0
                    }
                }
                None => 0.0,
            };
            samples.insert(pid, CpuSample { total_ticks: fields.total_ticks, timestamp: now });
            percent
        };

        Some(ProcessInfo {
            pid,
            name: fields.name,
            cpu_percent,
            memory_bytes: fields.rss_pages * self.page_size,
        })
    }

    /// Remove stale CPU samples for processes that no longer exist
    pub fn cleanup_stale(&self, active_pids: &[u32]) {
        let mut samples = self.cpu_samples.lock();
        samples.retain(|pid, _| active_pids.contains(pid));
    }

    pub fn list_processes(&self) -> std::io::Result<Vec<ProcessInfo>> {
        let mut processes = Vec::new();
        for entry in fs::read_dir("/proc")?.flatten() {
            if let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) {
                // Processes can exit between readdir and the stat read
                if let Some(info) = self.parse_process(pid) {
                    processes.push(info);
                }
            }
        }
        let pids: Vec<u32> = processes.iter().map(|p| p.pid).collect();
        self.cleanup_stale(&pids);
        Ok(processes)
    }
}

impl Default for LinuxProcessCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessLister for LinuxProcessCollector {
    async fn list(&self) -> Result<Vec<ProcessInfo>, MonitorError> {
        let collector = self.clone();
        tokio::task::spawn_blocking(move || collector.list_processes())
            .await
            .map_err(|e| MonitorError::ProcessScan(e.to_string()))?
            .map_err(|e| MonitorError::ProcessScan(e.to_string()))
    }
}
