use super::SessionProbe;
use crate::error::MonitorError;
use async_trait::async_trait;
use tokio::process::Command;

/// Counts logged-in sessions as reported by `who`.
#[derive(Debug, Clone, Default)]
pub struct WhoSessionProbe;

impl WhoSessionProbe {
    pub fn new() -> Self {
        Self
    }
}

pub(crate) fn count_sessions(output: &str) -> usize {
    output.lines().filter(|l| !l.trim().is_empty()).count()
}

#[async_trait]
impl SessionProbe for WhoSessionProbe {
    async fn interactive_sessions(&self) -> Result<usize, MonitorError> {
        let output = Command::new("who")
            .output()
            .await
            .map_err(|e| MonitorError::AdvancedCheck(format!("failed to run who: {}", e)))?;
        if !output.status.success() {
            return Err(MonitorError::AdvancedCheck(format!("who exited with {}", output.status)));
        }
        Ok(count_sessions(&String::from_utf8_lossy(&output.stdout)))
    }
}
