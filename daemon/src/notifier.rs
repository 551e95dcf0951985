//! Desktop notifications for engine events

use crate::event::MonitorEvent;
use notify_rust::{Notification, Urgency};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub summary: String,
    pub body: String,
    pub critical: bool,
}

impl NotificationMessage {
    fn new(summary: &str, body: String, critical: bool) -> Self {
        Self { summary: summary.to_string(), body, critical }
    }
}

/// The notification an event deserves, if any. Warnings are shown on the first
/// low-activity check and every third one after that.
pub fn notification_for(event: &MonitorEvent) -> Option<NotificationMessage> {
    match event {
        MonitorEvent::ShutdownWarning(w) if w.count == 1 || w.count % 3 == 0 => Some(NotificationMessage::new(
            "Inactivity warning",
            format!("System will shut down in {} seconds due to low activity", w.remaining_seconds),
            false,
        )),
        MonitorEvent::ActivityDetected => Some(NotificationMessage::new(
            "Activity detected",
            "Shutdown cancelled, system activity resumed".to_string(),
            false,
        )),
        MonitorEvent::BlackoutPeriod { .. } => Some(NotificationMessage::new(
            "Shutdown cancelled",
            "Currently in a blackout period, no shutdowns allowed".to_string(),
            false,
        )),
        MonitorEvent::ShutdownInitiated(s) => Some(NotificationMessage::new(
            "System shutdown",
            format!("Shutting down in {} seconds", s.countdown_seconds),
            true,
        )),
        MonitorEvent::Error { kind: crate::error::ErrorKind::ShutdownExecution, message } => {
            Some(NotificationMessage::new("Shutdown failed", message.clone(), true))
        }
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Notifier {
    enabled: bool,
}

impl Notifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Fire and forget; delivery failures are only logged.
    pub fn notify(&self, event: &MonitorEvent) {
        if !self.enabled {
            return;
        }
        if let Some(message) = notification_for(event) {
            tokio::task::spawn_blocking(move || {
                if let Err(e) = send_notification(&message) {
                    warn!("Failed to show notification: {}", e);
                }
            });
        }
    }
}

pub fn send_notification(message: &NotificationMessage) -> Result<(), notify_rust::error::Error> {
    let urgency = if message.critical { Urgency::Critical } else { Urgency::Normal };
    Notification::new()
        .summary(&message.summary)
        .body(&message.body)
        .appname("IdleGuard")
        .urgency(urgency)
        .show()?;
    Ok(())
}
