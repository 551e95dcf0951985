use idle_guard_daemon::collector::{LinuxMetricSource, LinuxProcessCollector, MetricSource, ProcessLister};

#[test]
fn test_list_processes_returns_current_process() {
    let collector = LinuxProcessCollector::new();
    let processes = collector.list_processes().unwrap();
    let current_pid = std::process::id();
    let found = processes.iter().any(|p| p.pid == current_pid);
    assert!(found, "Current process should be in the list");
}

#[test]
fn test_current_process_has_name_and_memory() {
    let collector = LinuxProcessCollector::new();
    let current_pid = std::process::id();
    let processes = collector.list_processes().unwrap();
    let p = processes.iter().find(|p| p.pid == current_pid).expect("current process listed");
    assert!(!p.name.is_empty());
    assert!(p.memory_bytes > 0);
}

#[test]
fn test_second_scan_reports_finite_cpu() {
    let collector = LinuxProcessCollector::new();
    let first = collector.list_processes().unwrap();
    // Nothing to compare against on the first scan
    assert!(first.iter().all(|p| p.cpu_percent == 0.0));
    std::thread::sleep(std::time::Duration::from_millis(20));
    let processes = collector.list_processes().unwrap();
    assert!(processes.iter().all(|p| p.cpu_percent.is_finite() && p.cpu_percent >= 0.0));
}

#[tokio::test]
async fn test_async_listing_matches_blocking_scan() {
    let collector = LinuxProcessCollector::new();
    let processes = collector.list().await.unwrap();
    assert!(!processes.is_empty());
    assert!(processes.iter().all(|p| p.cpu_percent >= 0.0));
}

#[tokio::test]
async fn test_metric_source_reads_proc() {
    let source = LinuxMetricSource::new();

    // First readings only prime the counters
    let cpu = source.cpu_percent().await.unwrap();
    assert_eq!(cpu, 0.0);
    source.network_rates().await.unwrap();

    let memory = source.memory_percent().await.unwrap();
    assert!((0.0..=100.0).contains(&memory));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let cpu = source.cpu_percent().await.unwrap();
    assert!((0.0..=100.0).contains(&cpu));
    let network = source.network_rates().await.unwrap();
    assert!(network.tx_mbps >= 0.0 && network.rx_mbps >= 0.0);
}
