//! Integration tests for ticket number allocation.
//!
//! Covers:
//! - Strict +1 numbering per letter prefix
//! - Independence of prefixes
//! - Wrap-around at the ceiling
//! - Serialised allocation under concurrent issuers

use equeue_db::test_fixtures::TestDatabase;
use equeue_db::{Database, TicketRepository, TicketStatus};

async fn issue(db: &Database, letter: &str) -> String {
    let mut tx = db.begin().await.expect("begin");
    let ticket = db
        .tickets
        .insert_next_tx(&mut tx, letter, Some("test"), TicketStatus::Waiting)
        .await
        .expect("insert ticket");
    tx.commit().await.expect("commit");
    ticket.ticket_number
}

#[tokio::test]
async fn test_numbers_increase_by_one_per_prefix() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    assert_eq!(issue(db, "A").await, "A001");
    assert_eq!(issue(db, "A").await, "A002");
    assert_eq!(issue(db, "B").await, "B001");
    assert_eq!(issue(db, "A").await, "A003");
    assert_eq!(issue(db, "B").await, "B002");

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_number_follows_max_not_count() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let first = issue(db, "C").await;
    issue(db, "C").await;
    let first_ticket = db
        .tickets
        .get_by_number(&first)
        .await
        .unwrap()
        .expect("ticket exists");
    assert!(db.tickets.delete(first_ticket.id).await.unwrap());

    // C002 is still the max, so the next number is C003, not C002.
    assert_eq!(issue(db, "C").await, "C003");

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_number_wraps_at_ceiling() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    sqlx::query("INSERT INTO tickets (ticket_number, status) VALUES ('D999', 'completed')")
        .execute(db.pool())
        .await
        .unwrap();

    assert_eq!(issue(db, "D").await, "D001");

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_concurrent_issuers_get_distinct_numbers() {
    let test_db = TestDatabase::new().await;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let db = test_db.db.clone();
        handles.push(tokio::spawn(async move { issue(&db, "A").await }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.expect("task panicked"));
    }
    numbers.sort();

    assert_eq!(
        numbers,
        vec!["A001", "A002", "A003", "A004", "A005", "A006"]
    );

    test_db.cleanup().await;
}
