//! Configuration management (TOML)

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub monitor: MonitorConfig,
    pub notifications: NotificationConfig,
    pub journal: JournalConfig,
    pub ipc: IpcConfig,
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub debug: bool,
}

/// Everything the engine reads. Immutable once handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub sample_interval_ms: u64,
    pub metric_timeout_ms: u64,
    /// Seconds between process table scans.
    pub process_scan_interval: u64,
    /// Seconds between shutdown decisions.
    pub trigger_interval: u64,
    /// Seconds between moving average resets.
    pub average_interval_reset: u64,
    /// Consecutive low-activity decisions before shutting down.
    pub trigger_shutdown_times: u32,
    /// Delay handed to the shutdown command, in seconds.
    pub trigger_shutdown_countdown: u64,
    pub moving_average_window: usize,
    pub max_log_entries: usize,
    pub blackout_periods: String,
    pub thresholds: ThresholdConfig,
    pub processes: ProcessConfig,
    pub advanced: AdvancedConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub cpu_percent: f64,
    pub network_mbps: f64,
    pub disk_mbs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub enabled: bool,
    pub cpu_threshold: f64,
    pub exclusion_list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedConfig {
    pub check_sessions: bool,
    pub check_critical_processes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub enabled: bool,
    /// Seconds between report snapshots.
    pub save_interval: u64,
    pub retention_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    pub dry_run: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            sample_interval_ms: 1000,
            metric_timeout_ms: 900,
            process_scan_interval: 5,
            trigger_interval: 5,
            average_interval_reset: 60,
            trigger_shutdown_times: 12,
            trigger_shutdown_countdown: 60,
            moving_average_window: 15,
            max_log_entries: 1000,
            blackout_periods: String::new(),
            thresholds: ThresholdConfig::default(),
            processes: ProcessConfig::default(),
            advanced: AdvancedConfig::default(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        ThresholdConfig { cpu_percent: 8.0, network_mbps: 0.5, disk_mbs: 0.5 }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        ProcessConfig {
            enabled: true,
            cpu_threshold: 5.0,
            exclusion_list: ["chrome", "firefox", "vlc", "steam"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        AdvancedConfig { check_sessions: true, check_critical_processes: true }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig { enabled: true }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        JournalConfig { enabled: true, save_interval: 300, retention_days: 30 }
    }
}

impl Default for IpcConfig {
    fn default() -> Self {
        IpcConfig { enabled: true }
    }
}

impl MonitorConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Never longer than the sampling period, so one stalled source cannot delay the next tick.
    pub fn metric_timeout(&self) -> Duration {
        Duration::from_millis(self.metric_timeout_ms.min(self.sample_interval_ms))
    }

    pub fn process_scan_period(&self) -> Duration {
        Duration::from_secs(self.process_scan_interval)
    }

    pub fn decision_period(&self) -> Duration {
        Duration::from_secs(self.trigger_interval)
    }

    pub fn reset_period(&self) -> Duration {
        Duration::from_secs(self.average_interval_reset)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive_ints = [
            ("monitor.sample_interval_ms", self.sample_interval_ms),
            ("monitor.metric_timeout_ms", self.metric_timeout_ms),
            ("monitor.process_scan_interval", self.process_scan_interval),
            ("monitor.trigger_interval", self.trigger_interval),
            ("monitor.average_interval_reset", self.average_interval_reset),
            ("monitor.trigger_shutdown_times", self.trigger_shutdown_times as u64),
            ("monitor.moving_average_window", self.moving_average_window as u64),
            ("monitor.max_log_entries", self.max_log_entries as u64),
        ];
        for (name, value) in positive_ints {
            if value == 0 {
                return Err(ConfigError::invalid(format!("{} must be greater than zero", name)));
            }
        }

        let thresholds = [
            ("monitor.thresholds.cpu_percent", self.thresholds.cpu_percent),
            ("monitor.thresholds.network_mbps", self.thresholds.network_mbps),
            ("monitor.thresholds.disk_mbs", self.thresholds.disk_mbs),
            ("monitor.processes.cpu_threshold", self.processes.cpu_threshold),
        ];
        for (name, value) in thresholds {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(format!("{} must be a positive number", name)));
            }
        }
        Ok(())
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.monitor.validate()?;
        if self.journal.enabled && self.journal.save_interval == 0 {
            return Err(ConfigError::invalid("journal.save_interval must be greater than zero"));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "idle-guard")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }
}
