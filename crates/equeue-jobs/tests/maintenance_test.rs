//! Tests for the daily maintenance timer using a paused clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveTime};
use equeue_core::{CleanupRepository, CleanupStats, Result};
use equeue_jobs::{MaintenanceConfig, MaintenanceTimer};

#[derive(Default)]
struct CountingCleanup {
    runs: AtomicUsize,
}

#[async_trait]
impl CleanupRepository for CountingCleanup {
    async fn purge_finished(&self) -> Result<CleanupStats> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(CleanupStats {
            appointments_deleted: 2,
            tickets_deleted: 3,
        })
    }
}

/// A run time a minute from now, so the first run is imminent.
fn soon() -> NaiveTime {
    (Local::now() + chrono::Duration::minutes(1)).time()
}

#[tokio::test(start_paused = true)]
async fn test_timer_runs_cleanup_at_configured_time() {
    let cleanup = Arc::new(CountingCleanup::default());
    let handle = MaintenanceTimer::new(
        cleanup.clone(),
        MaintenanceConfig::default().with_run_at(soon()),
    )
    .start();

    // The wall clock does not move under a paused runtime, so the timer
    // re-arms for roughly the same delay; stop before the second firing.
    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(cleanup.runs.load(Ordering::SeqCst), 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_disabled_timer_never_runs() {
    let cleanup = Arc::new(CountingCleanup::default());
    let handle = MaintenanceTimer::new(
        cleanup.clone(),
        MaintenanceConfig::default()
            .with_run_at(soon())
            .with_enabled(false),
    )
    .start();

    tokio::time::sleep(Duration::from_secs(5 * 60)).await;
    assert_eq!(cleanup.runs.load(Ordering::SeqCst), 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_run_once_reports_counts() {
    let cleanup = Arc::new(CountingCleanup::default());
    let timer = MaintenanceTimer::new(cleanup.clone(), MaintenanceConfig::default());

    let stats = timer.run_once().await.unwrap();
    assert_eq!(stats.appointments_deleted, 2);
    assert_eq!(stats.tickets_deleted, 3);
    assert_eq!(cleanup.runs.load(Ordering::SeqCst), 1);
}
