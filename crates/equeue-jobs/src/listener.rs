//! Change feed listener.
//!
//! Holds one dedicated `LISTEN` connection for the ticket and schedule
//! channels and relays every payload into the [`Broker`]. It owns no business
//! logic: payloads are decoded once and published as-is, malformed ones as
//! [`Notification::Unknown`].

use std::time::Duration;

use sqlx::postgres::{PgListener, PgNotification};
use sqlx::{Pool, Postgres};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use equeue_core::defaults::{LISTENER_RETRY_SECS, SCHEDULE_CHANNEL, TICKET_CHANNEL};
use equeue_core::{Broker, Error, Notification, Result};

/// Configuration for the change feed listener.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Channels to `LISTEN` on.
    pub channels: Vec<String>,
    /// Fixed delay before reconnecting after an error.
    pub retry_delay: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            channels: vec![TICKET_CHANNEL.to_string(), SCHEDULE_CHANNEL.to_string()],
            retry_delay: Duration::from_secs(LISTENER_RETRY_SECS),
        }
    }
}

impl ListenerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `LISTENER_RETRY_SECS` | `5` | Delay before reconnecting after an error |
    pub fn from_env() -> Self {
        let retry_secs = std::env::var("LISTENER_RETRY_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(LISTENER_RETRY_SECS);

        Self::default().with_retry_delay(Duration::from_secs(retry_secs))
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Handle for controlling a running listener.
pub struct ListenerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Signal the listener to stop and wait for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        // A closed channel means the task already exited.
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("listener task failed: {e}")))
    }
}

/// Outcome of one wait on the listener connection.
enum Wake {
    Shutdown,
    Message(std::result::Result<PgNotification, sqlx::Error>),
}

/// Relay from PostgreSQL `NOTIFY` to the in-process broker.
pub struct ChangeFeedListener {
    pool: Pool<Postgres>,
    broker: Broker,
    config: ListenerConfig,
}

impl ChangeFeedListener {
    pub fn new(pool: Pool<Postgres>, broker: Broker, config: ListenerConfig) -> Self {
        Self {
            pool,
            broker,
            config,
        }
    }

    /// Spawn the listener loop and return a handle for control.
    pub fn start(self) -> ListenerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });
        ListenerHandle { shutdown_tx, task }
    }

    async fn connect(&self) -> std::result::Result<PgListener, sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener
            .listen_all(self.config.channels.iter().map(String::as_str))
            .await?;
        Ok(listener)
    }

    /// Sleep for the retry delay. Returns true if shutdown arrived meanwhile.
    async fn backoff(&self, shutdown_rx: &mut mpsc::Receiver<()>) -> bool {
        tokio::select! {
            _ = shutdown_rx.recv() => true,
            _ = sleep(self.config.retry_delay) => false,
        }
    }

    fn relay(&self, message: &PgNotification) {
        let notification = Notification::decode(message.payload());
        let kind = notification.kind();
        let report = self.broker.publish(notification);
        debug!(
            subsystem = "listener",
            channel = message.channel(),
            kind,
            delivered = report.delivered,
            dropped = report.dropped,
            "Relayed change notification"
        );
    }

    async fn run(self, shutdown_rx: &mut mpsc::Receiver<()>) {
        info!(
            subsystem = "listener",
            channels = ?self.config.channels,
            retry_delay_secs = self.config.retry_delay.as_secs(),
            "Change feed listener started"
        );

        let mut connection: Option<PgListener> = None;

        loop {
            let listener = match connection {
                Some(ref mut listener) => listener,
                None => match self.connect().await {
                    Ok(listener) => {
                        info!(
                            subsystem = "listener",
                            op = "connect",
                            "Listening for change notifications"
                        );
                        connection.insert(listener)
                    }
                    Err(e) => {
                        error!(
                            subsystem = "listener",
                            op = "connect",
                            error = %e,
                            "Failed to open change feed connection"
                        );
                        if self.backoff(shutdown_rx).await {
                            break;
                        }
                        continue;
                    }
                },
            };

            let wake = tokio::select! {
                _ = shutdown_rx.recv() => Wake::Shutdown,
                result = listener.recv() => Wake::Message(result),
            };

            match wake {
                Wake::Shutdown => break,
                Wake::Message(Ok(message)) => self.relay(&message),
                Wake::Message(Err(e)) => {
                    error!(
                        subsystem = "listener",
                        op = "recv",
                        error = %e,
                        "Change feed wait failed"
                    );
                    connection = None;
                    if self.backoff(shutdown_rx).await {
                        break;
                    }
                }
            }
        }

        info!(subsystem = "listener", "Change feed listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_listens_on_both_channels() {
        let config = ListenerConfig::default();
        assert_eq!(config.channels, vec!["ticket_update", "schedule_update"]);
        assert_eq!(config.retry_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_retry_delay_builder() {
        let config = ListenerConfig::default().with_retry_delay(Duration::from_millis(10));
        assert_eq!(config.retry_delay, Duration::from_millis(10));
    }
}
