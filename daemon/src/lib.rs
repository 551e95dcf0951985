//! IdleGuard: shuts a machine down after a sustained period of low activity.
//!
//! [`monitor::ActivityMonitor`] samples system metrics through the traits in
//! [`collector`], debounces low-activity decisions and reports everything it
//! does as [`event::MonitorEvent`]s. The rest of the crate is the daemon that
//! hosts it: TOML config, desktop notifications, an SQLite journal and a Unix
//! socket status surface.

pub mod activity_log;
pub mod average;
pub mod blackout;
pub mod clock;
pub mod collector;
pub mod config;
pub mod detector;
pub mod error;
pub mod event;
pub mod executor;
pub mod journal;
pub mod monitor;
pub mod notifier;
pub mod protocol;
pub mod snapshot;
pub mod socket;
