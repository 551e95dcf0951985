//! SQLite journal of engine events and periodic reports

use crate::activity_log::ActivityEntry;
use crate::error::JournalError;
use crate::event::MonitorEvent;
use crate::monitor::SystemReport;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct Journal {
    conn: Connection,
}

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: i64,
    pub timestamp: i64,
    pub kind: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ReportRecord {
    pub id: i64,
    pub timestamp: i64,
    pub uptime_seconds: i64,
    pub shutdown_events: u32,
    pub energy_saved_kwh: f64,
    pub trigger_count: u32,
    pub entries: serde_json::Value,
}

impl Journal {
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn default_path() -> Result<PathBuf, JournalError> {
        directories::ProjectDirs::from("", "", "idle-guard")
            .map(|dirs| dirs.data_dir().join("journal.db"))
            .ok_or(JournalError::NoDataDir)
    }

    pub fn open_default() -> Result<Self, JournalError> {
        Self::open(&Self::default_path()?)
    }

    pub fn init_schema(&self) -> Result<(), JournalError> {
        self.conn.execute_batch(include_str!("../schema.sql"))?;
        Ok(())
    }

    fn now() -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
    }

    pub fn insert_event(&self, event: &MonitorEvent) -> Result<i64, JournalError> {
        let payload = serde_json::to_string(event)?;
        self.conn.execute(
            "INSERT INTO events (timestamp, kind, payload) VALUES (?1, ?2, ?3)",
            params![Self::now(), event.name(), payload],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_events(&self, limit: u32, since: Option<i64>) -> Result<Vec<EventRecord>, JournalError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, kind, payload FROM events
             WHERE timestamp >= ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![since.unwrap_or(0), limit], |row| {
            let payload: String = row.get(3)?;
            Ok(EventRecord {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                kind: row.get(2)?,
                payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn save_report(&self, report: &SystemReport, entries: &[ActivityEntry]) -> Result<i64, JournalError> {
        let report_json = serde_json::to_string(report)?;
        let entries_json = serde_json::to_string(entries)?;
        self.conn.execute(
            "INSERT INTO reports (timestamp, uptime_seconds, shutdown_events, energy_saved_kwh, trigger_count, report, entries)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Self::now(),
                report.uptime_seconds,
                report.shutdown_events,
                report.total_energy_saved_kwh,
                report.trigger_count,
                report_json,
                entries_json
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn latest_report(&self) -> Result<Option<ReportRecord>, JournalError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, uptime_seconds, shutdown_events, energy_saved_kwh, trigger_count, entries
             FROM reports ORDER BY id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map([], |row| {
            let entries: String = row.get(6)?;
            Ok(ReportRecord {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                uptime_seconds: row.get(2)?,
                shutdown_events: row.get(3)?,
                energy_saved_kwh: row.get(4)?,
                trigger_count: row.get(5)?,
                entries: serde_json::from_str(&entries).unwrap_or(serde_json::Value::Null),
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    pub fn cleanup_old_data(&self, retention_days: u32) -> Result<(), JournalError> {
        let cutoff = Self::now() - (retention_days as i64 * 86400);
        self.conn.execute("DELETE FROM events WHERE timestamp < ?1", params![cutoff])?;
        self.conn.execute("DELETE FROM reports WHERE timestamp < ?1", params![cutoff])?;
        Ok(())
    }
}
