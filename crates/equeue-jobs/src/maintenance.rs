//! Daily maintenance timer.
//!
//! Once a day at `MAINTENANCE_TIME` (local time) the queue is cleared of
//! finished tickets and of appointments that never got a ticket.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use equeue_core::defaults::MAINTENANCE_TIME;
use equeue_core::{CleanupRepository, CleanupStats, Error, Result};
use equeue_db::Database;

/// Parse an `HH:MM` wall-clock time.
pub fn parse_run_at(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}

/// First occurrence of `run_at` strictly after `now`.
pub fn next_run_after(now: NaiveDateTime, run_at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(run_at);
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

/// Time to sleep from `now` until the next local `run_at`.
pub fn delay_until_next_run(now: DateTime<Local>, run_at: NaiveTime) -> Duration {
    let next_local = next_run_after(now.naive_local(), run_at);
    let next = Local
        .from_local_datetime(&next_local)
        .earliest()
        // Skipped by a DST jump: fall back to the same wall time an hour later.
        .or_else(|| {
            Local
                .from_local_datetime(&(next_local + chrono::Duration::hours(1)))
                .earliest()
        })
        .unwrap_or(now + chrono::Duration::days(1));
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Configuration for the maintenance timer.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Local wall-clock time of the daily run.
    pub run_at: NaiveTime,
    /// Whether the timer runs at all.
    pub enabled: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            run_at: NaiveTime::MIN,
            enabled: true,
        }
    }
}

impl MaintenanceConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `MAINTENANCE_TIME` | `00:00` | Local `HH:MM` of the daily cleanup |
    /// | `MAINTENANCE_ENABLED` | `true` | Enable/disable the daily cleanup |
    pub fn from_env() -> Self {
        let enabled = std::env::var("MAINTENANCE_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let raw = std::env::var("MAINTENANCE_TIME").unwrap_or_else(|_| MAINTENANCE_TIME.to_string());
        let run_at = parse_run_at(&raw).unwrap_or_else(|| {
            warn!(
                subsystem = "maintenance",
                value = %raw,
                fallback = MAINTENANCE_TIME,
                "Invalid MAINTENANCE_TIME, using default"
            );
            NaiveTime::MIN
        });

        Self { run_at, enabled }
    }

    pub fn with_run_at(mut self, run_at: NaiveTime) -> Self {
        self.run_at = run_at;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Handle for controlling a running maintenance timer.
pub struct MaintenanceHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl MaintenanceHandle {
    /// Signal the timer to stop and wait for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("maintenance task failed: {e}")))
    }
}

/// Daily cleanup scheduler.
pub struct MaintenanceTimer {
    cleanup: Arc<dyn CleanupRepository>,
    config: MaintenanceConfig,
}

impl MaintenanceTimer {
    pub fn new(cleanup: Arc<dyn CleanupRepository>, config: MaintenanceConfig) -> Self {
        Self { cleanup, config }
    }

    pub fn from_database(db: &Database, config: MaintenanceConfig) -> Self {
        Self::new(Arc::new(db.cleanup.clone()), config)
    }

    /// Run the cleanup once, now.
    pub async fn run_once(&self) -> Result<CleanupStats> {
        self.cleanup.purge_finished().await
    }

    /// Spawn the timer loop and return a handle for control.
    pub fn start(self) -> MaintenanceHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });
        MaintenanceHandle { shutdown_tx, task }
    }

    async fn run(self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!(subsystem = "maintenance", "Maintenance timer is disabled, not starting");
            return;
        }

        info!(
            subsystem = "maintenance",
            run_at = %self.config.run_at.format("%H:%M"),
            "Maintenance timer started"
        );

        loop {
            let delay = delay_until_next_run(Local::now(), self.config.run_at);
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = sleep(delay) => {}
            }

            match self.run_once().await {
                Ok(stats) => info!(
                    subsystem = "maintenance",
                    op = "cleanup",
                    appointments_deleted = stats.appointments_deleted,
                    tickets_deleted = stats.tickets_deleted,
                    "Daily cleanup finished"
                ),
                Err(e) => error!(
                    subsystem = "maintenance",
                    op = "cleanup",
                    error = %e,
                    "Daily cleanup failed"
                ),
            }
        }

        info!(subsystem = "maintenance", "Maintenance timer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 20)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_run_at() {
        assert_eq!(parse_run_at("03:30"), NaiveTime::from_hms_opt(3, 30, 0));
        assert_eq!(parse_run_at(" 00:00 "), Some(NaiveTime::MIN));
        assert_eq!(parse_run_at("25:00"), None);
        assert_eq!(parse_run_at("midnight"), None);
    }

    #[test]
    fn test_next_run_later_today() {
        let run_at = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        assert_eq!(next_run_after(dt(22, 15), run_at), dt(23, 0));
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        let run_at = NaiveTime::from_hms_opt(3, 0, 0).unwrap();
        let next = next_run_after(dt(3, 0), run_at);
        assert_eq!(next, dt(3, 0) + chrono::Duration::days(1));
    }

    #[test]
    fn test_delay_is_at_most_one_day() {
        let delay = delay_until_next_run(Local::now(), NaiveTime::MIN);
        assert!(delay <= Duration::from_secs(25 * 3600));
    }
}
