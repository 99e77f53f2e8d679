//! Integration tests for the change feed listener.
//!
//! A ticket insert fires the `ticket_update` trigger; the listener must relay
//! it into the broker as a decoded ticket notification.

use std::time::Duration;

use equeue_core::{Broker, Notification, TicketStatus};
use equeue_db::test_fixtures::TestDatabase;
use equeue_jobs::{ChangeFeedListener, ListenerConfig};
use tokio::time::timeout;

#[tokio::test]
async fn test_ticket_insert_reaches_subscribers() {
    let test_db = TestDatabase::new().await;
    let broker = Broker::new();
    let mut subscription = broker.subscribe();

    let handle = ChangeFeedListener::new(
        test_db.db.pool.clone(),
        broker.clone(),
        ListenerConfig::default().with_retry_delay(Duration::from_millis(100)),
    )
    .start();

    // Give the listener time to issue LISTEN before the write.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut tx = test_db.db.begin().await.unwrap();
    let ticket = test_db
        .db
        .tickets
        .insert_next_tx(&mut tx, "Z", Some("listener_test"), TicketStatus::Waiting)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    // Other tests share the server and its channels; wait for ours.
    let received = timeout(Duration::from_secs(5), async {
        while let Some(notification) = subscription.recv().await {
            if let Notification::Ticket { action, ticket: t } = notification {
                if t.id == ticket.id && t.ticket_number == ticket.ticket_number {
                    return Some((action, t));
                }
            }
        }
        None
    })
    .await
    .expect("notification within timeout")
    .expect("subscription open");

    assert_eq!(received.0, "insert");
    assert_eq!(received.1.status, TicketStatus::Waiting);
    assert!(received.1.qr_code.is_none());

    handle.shutdown().await.unwrap();
    test_db.cleanup().await;
}

#[tokio::test]
async fn test_shutdown_while_connected() {
    let test_db = TestDatabase::new().await;
    let broker = Broker::new();

    let handle = ChangeFeedListener::new(
        test_db.db.pool.clone(),
        broker,
        ListenerConfig::default(),
    )
    .start();

    tokio::time::sleep(Duration::from_millis(100)).await;
    timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("listener stops promptly")
        .unwrap();

    test_db.cleanup().await;
}
