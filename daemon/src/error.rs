//! Error taxonomy for the monitoring engine and its collaborators

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Which metric source failed during a sampling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cpu,
    Memory,
    Network,
    Disk,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::Network => "network",
            Metric::Disk => "disk",
        };
        f.write_str(name)
    }
}

/// Errors raised by the engine. Every one of them is recovered locally and
/// surfaced as a `MonitorEvent::Error`; none of them ends the monitoring loops.
#[derive(Error, Debug, Clone)]
pub enum MonitorError {
    #[error("failed to read {metric} metrics: {reason}")]
    MetricFetch { metric: Metric, reason: String },

    #[error("process scan failed: {0}")]
    ProcessScan(String),

    #[error("invalid blackout period {entry:?}: {reason}")]
    ConfigParse { entry: String, reason: String },

    #[error("advanced idle check failed: {0}")]
    AdvancedCheck(String),

    #[error("shutdown command failed: {0}")]
    ShutdownExecution(String),
}

impl MonitorError {
    pub fn metric<S: Into<String>>(metric: Metric, reason: S) -> Self {
        MonitorError::MetricFetch { metric, reason: reason.into() }
    }

    pub fn timeout(metric: Metric, limit: Duration) -> Self {
        MonitorError::MetricFetch {
            metric,
            reason: format!("timed out after {}ms", limit.as_millis()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MonitorError::MetricFetch { .. } => ErrorKind::MetricFetch,
            MonitorError::ProcessScan(_) => ErrorKind::ProcessScan,
            MonitorError::ConfigParse { .. } => ErrorKind::ConfigParse,
            MonitorError::AdvancedCheck(_) => ErrorKind::AdvancedCheck,
            MonitorError::ShutdownExecution(_) => ErrorKind::ShutdownExecution,
        }
    }
}

/// Payload tag for error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MetricFetch,
    ProcessScan,
    ConfigParse,
    AdvancedCheck,
    ShutdownExecution,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        ConfigError::Invalid(msg.into())
    }
}

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("failed to create journal directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to encode journal payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no data directory available")]
    NoDataDir,
}
