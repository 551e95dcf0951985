//! Latest view of the process table and its classification

use crate::collector::{ProcessInfo, ProcessLister};
use crate::error::MonitorError;

/// Core OS processes that never count as user activity. Kernel threads such as
/// `kworker/0:1` are matched on the part before the slash.
const SYSTEM_PROCESSES: &[&str] = &[
    "systemd",
    "init",
    "kthreadd",
    "kworker",
    "ksoftirqd",
    "kswapd0",
    "migration",
    "rcu_sched",
    "rcu_preempt",
    "idle_inject",
    "systemd-journald",
    "systemd-udevd",
    "systemd-logind",
    "dbus-daemon",
    "dbus-broker",
];

/// Processes whose load means a person is using the machine.
const CRITICAL_PROCESSES: &[&str] = &[
    "Xorg",
    "Xwayland",
    "gnome-shell",
    "kwin_wayland",
    "kwin_x11",
    "plasmashell",
    "sway",
    "Hyprland",
    "mutter",
    "pipewire",
    "pulseaudio",
    "wireplumber",
];

fn is_system_process(name: &str) -> bool {
    let base = name.split('/').next().unwrap_or(name);
    SYSTEM_PROCESSES.contains(&base)
}

fn is_critical_process(name: &str) -> bool {
    CRITICAL_PROCESSES.contains(&name)
}

#[derive(Debug, Clone, Default)]
pub struct ProcessSnapshot {
    processes: Vec<ProcessInfo>,
}

impl ProcessSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_processes(processes: Vec<ProcessInfo>) -> Self {
        Self { processes }
    }

    /// On error the previous table is kept.
    pub async fn refresh(&mut self, lister: &dyn ProcessLister) -> Result<(), MonitorError> {
        let processes = lister.list().await?;
        self.replace(processes);
        Ok(())
    }

    pub fn replace(&mut self, processes: Vec<ProcessInfo>) {
        self.processes = processes;
    }

    pub fn active_processes(&self, min_cpu: f64) -> Vec<ProcessInfo> {
        let mut active: Vec<ProcessInfo> = self
            .processes
            .iter()
            .filter(|p| !is_system_process(&p.name) && p.cpu_percent >= min_cpu)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
        active
    }

    pub fn critical_processes(&self) -> Vec<ProcessInfo> {
        self.processes.iter().filter(|p| is_critical_process(&p.name)).cloned().collect()
    }

    /// First active process whose name contains one of `fragments`, ignoring case.
    pub fn matches_exclusion_list(&self, fragments: &[String], min_cpu: f64) -> Option<ProcessInfo> {
        let fragments: Vec<String> = fragments
            .iter()
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        if fragments.is_empty() {
            return None;
        }
        self.active_processes(min_cpu).into_iter().find(|p| {
            let name = p.name.to_lowercase();
            fragments.iter().any(|f| name.contains(f.as_str()))
        })
    }

    pub fn processes(&self) -> &[ProcessInfo] {
        &self.processes
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn proc(pid: u32, name: &str, cpu: f64) -> ProcessInfo {
        ProcessInfo { pid, name: name.to_string(), cpu_percent: cpu, memory_bytes: 1 << 20 }
    }

    struct FailingLister;

    #[async_trait]
    impl ProcessLister for FailingLister {
        async fn list(&self) -> Result<Vec<ProcessInfo>, MonitorError> {
            Err(MonitorError::ProcessScan("permission denied".into()))
        }
    }

    struct FixedLister(Vec<ProcessInfo>);

    #[async_trait]
    impl ProcessLister for FixedLister {
        async fn list(&self) -> Result<Vec<ProcessInfo>, MonitorError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn active_processes_sorted_and_filtered() {
        let snapshot = ProcessSnapshot::from_processes(vec![
            proc(1, "systemd", 50.0),
            proc(2, "kworker/0:1", 40.0),
            proc(3, "vlc", 12.0),
            proc(4, "bash", 0.5),
            proc(5, "firefox", 30.0),
        ]);
        let active = snapshot.active_processes(5.0);
        let names: Vec<&str> = active.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["firefox", "vlc"]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let snapshot = ProcessSnapshot::from_processes(vec![proc(1, "make", 5.0)]);
        assert_eq!(snapshot.active_processes(5.0).len(), 1);
    }

    #[test]
    fn critical_processes_by_name() {
        let snapshot = ProcessSnapshot::from_processes(vec![proc(1, "gnome-shell", 2.0), proc(2, "vim", 9.0)]);
        let critical = snapshot.critical_processes();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].name, "gnome-shell");
    }

    #[test]
    fn exclusion_match_is_case_insensitive_substring() {
        let snapshot = ProcessSnapshot::from_processes(vec![proc(7, "VLC-media", 20.0), proc(8, "chrome", 1.0)]);
        let list = vec!["vlc".to_string(), "Chrome".to_string()];
        let hit = snapshot.matches_exclusion_list(&list, 5.0).unwrap();
        assert_eq!(hit.pid, 7);
        // chrome is below the threshold
        assert!(snapshot.matches_exclusion_list(&["chrome".to_string()], 5.0).is_none());
        assert!(snapshot.matches_exclusion_list(&[" ".to_string()], 0.0).is_none());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_table() {
        let mut snapshot = ProcessSnapshot::new();
        snapshot.refresh(&FixedLister(vec![proc(1, "steam", 10.0)])).await.unwrap();
        assert_eq!(snapshot.len(), 1);

        let err = snapshot.refresh(&FailingLister).await.unwrap_err();
        assert!(matches!(err, MonitorError::ProcessScan(_)));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.processes()[0].name, "steam");
    }

    #[tokio::test]
    async fn refresh_replaces_instead_of_merging() {
        let mut snapshot = ProcessSnapshot::new();
        snapshot.refresh(&FixedLister(vec![proc(1, "a", 1.0), proc(2, "b", 1.0)])).await.unwrap();
        snapshot.refresh(&FixedLister(vec![proc(3, "c", 1.0)])).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.processes()[0].pid, 3);
    }
}
