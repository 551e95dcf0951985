//! Shutdown command executor

use crate::error::MonitorError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

#[async_trait]
pub trait ShutdownExecutor: Send + Sync {
    /// Schedules a power-off `delay` from now. Returns once the request is accepted.
    async fn execute(&self, delay: Duration, message: &str) -> Result<(), MonitorError>;
}

/// Calls the system `shutdown` command.
#[derive(Debug, Clone, Default)]
pub struct SystemShutdownExecutor {
    dry_run: bool,
}

impl SystemShutdownExecutor {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

/// `shutdown` takes whole minutes; partial minutes round up.
pub fn shutdown_args(delay: Duration, message: &str) -> Vec<String> {
    let secs = delay.as_secs();
    let when = if secs == 0 {
        "now".to_string()
    } else {
        format!("+{}", secs.div_ceil(60))
    };
    vec!["-h".to_string(), when, message.to_string()]
}

#[async_trait]
impl ShutdownExecutor for SystemShutdownExecutor {
    async fn execute(&self, delay: Duration, message: &str) -> Result<(), MonitorError> {
        let args = shutdown_args(delay, message);
        if self.dry_run {
            info!("Dry run, not executing: shutdown {}", args.join(" "));
            return Ok(());
        }

        let output = Command::new("shutdown")
            .args(&args)
            .output()
            .await
            .map_err(|e| MonitorError::ShutdownExecution(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("shutdown exited with {}: {}", output.status, stderr);
            return Err(MonitorError::ShutdownExecution(format!("exit status {}: {}", output.status, stderr)));
        }
        Ok(())
    }
}
