//! Integration tests for the smaller repositories: schedules, priorities,
//! business processes, reception logs and the daily cleanup.

use chrono::{NaiveTime, Utc};
use equeue_db::test_fixtures::{TestData, TestDatabase};
use equeue_db::{
    process, AppointmentRepository, BusinessProcessRepository, CleanupRepository,
    CreateScheduleRequest, Error, ReceptionLogRepository, RegistrarPriorityRepository,
    ScheduleRepository, ServiceRepository, TicketRepository, TicketStatus,
};

fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[tokio::test]
async fn test_seeded_processes_all_enabled() {
    let test_db = TestDatabase::new().await;

    let processes = test_db.db.business_processes.list().await.unwrap();
    assert_eq!(processes.len(), process::ALL.len());
    assert!(processes.iter().all(|p| p.is_enabled));

    assert!(test_db
        .db
        .business_processes
        .set_enabled(process::TERMINAL, false)
        .await
        .unwrap());
    let terminal = test_db
        .db
        .business_processes
        .get(process::TERMINAL)
        .await
        .unwrap()
        .unwrap();
    assert!(!terminal.is_enabled);

    assert!(!test_db
        .db
        .business_processes
        .set_enabled("no_such_process", true)
        .await
        .unwrap());

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_schedule_bounds_and_cabinet_lookup() {
    let test_db = TestDatabase::new().await;
    let data = TestData::new(&test_db.db);
    let today = TestData::today();

    assert!(test_db.db.schedules.time_bounds(today).await.unwrap().is_none());

    let house = data.doctor("Gregory House", "Diagnostics").await;
    let wilson = data.doctor("James Wilson", "Oncology").await;
    data.slot(&house, today, at(10, 0), Some(7)).await;
    data.slot(&house, today, at(8, 30), Some(7)).await;
    data.slot(&wilson, today, at(16, 0), Some(9)).await;

    let (min_start, max_end) = test_db
        .db
        .schedules
        .time_bounds(today)
        .await
        .unwrap()
        .expect("bounds present");
    assert_eq!(min_start, at(8, 30));
    assert_eq!(max_end, at(16, 30));

    let first = test_db
        .db
        .schedules
        .first_for_cabinet(7, today)
        .await
        .unwrap()
        .expect("cabinet has slots");
    assert_eq!(first.schedule.start_time, at(8, 30));
    assert_eq!(first.doctor.full_name, "Gregory House");

    assert!(test_db
        .db
        .schedules
        .first_for_cabinet(99, today)
        .await
        .unwrap()
        .is_none());

    assert_eq!(test_db.db.schedules.list_cabinets().await.unwrap(), vec![7, 9]);

    let rows = test_db.db.schedules.list_with_doctors(today).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].doctor.id, house.id);
    assert_eq!(rows[0].schedule.start_time, at(8, 30));

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_duplicate_slot_is_conflict() {
    let test_db = TestDatabase::new().await;
    let data = TestData::new(&test_db.db);
    let doctor = data.doctor("Allison Cameron", "Immunology").await;
    let today = TestData::today();

    let req = CreateScheduleRequest {
        doctor_id: doctor.id,
        date: today,
        start_time: at(12, 0),
        end_time: at(12, 30),
        is_available: None,
        cabinet: Some(3),
    };
    let created = test_db.db.schedules.create(req.clone()).await.unwrap();
    assert!(created.is_available);

    let duplicate = test_db.db.schedules.create(req).await;
    assert!(matches!(duplicate, Err(Error::Conflict(_))));

    let orphan = test_db
        .db
        .schedules
        .create(CreateScheduleRequest {
            doctor_id: 987_654,
            date: today,
            start_time: at(12, 0),
            end_time: at(12, 30),
            is_available: None,
            cabinet: None,
        })
        .await;
    assert!(matches!(orphan, Err(Error::DoctorNotFound(987_654))));

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_registrar_priorities_replace_set() {
    let test_db = TestDatabase::new().await;
    let services = test_db.db.services.list().await.unwrap();
    let ids: Vec<i64> = services.iter().map(|s| s.id).collect();

    test_db.db.priorities.set(5, &ids[..2]).await.unwrap();
    let first = test_db.db.priorities.get(5).await.unwrap();
    assert_eq!(first.len(), 2);

    test_db.db.priorities.set(5, &ids[2..3]).await.unwrap();
    let second = test_db.db.priorities.get(5).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, ids[2]);

    test_db.db.priorities.set(5, &[]).await.unwrap();
    assert!(test_db.db.priorities.get(5).await.unwrap().is_empty());

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_reception_log_closes_with_duration() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let mut tx = db.begin().await.unwrap();
    let ticket = db
        .tickets
        .insert_next_tx(&mut tx, "A", None, TicketStatus::Waiting)
        .await
        .unwrap();
    let called_at = Utc::now() - chrono::Duration::minutes(3);
    db.tickets
        .mark_called_tx(&mut tx, ticket.id, 2, called_at)
        .await
        .unwrap();
    db.reception_logs
        .append_tx(&mut tx, ticket.id, 2, called_at, Some(11))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = db.begin().await.unwrap();
    let closed = db
        .reception_logs
        .close_open_tx(&mut tx, ticket.id, Utc::now())
        .await
        .unwrap()
        .expect("open log closed");
    tx.commit().await.unwrap();

    let duration = closed.duration_secs.expect("duration stored");
    assert!((170..=200).contains(&duration), "duration {duration}");

    let logs = db.reception_logs.list_for_ticket(ticket.id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].registrar_id, Some(11));
    assert!(logs[0].completed_at.is_some());

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_cleanup_purges_finished_data() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = TestData::new(db);
    let today = TestData::today();

    let doctor = data.doctor("Robert Chase", "Surgery").await;
    let slot = data
        .slot(&doctor, today - chrono::Duration::days(2), at(9, 0), Some(1))
        .await;
    data.book(&slot, None).await;

    let mut tx = db.begin().await.unwrap();
    let done = db
        .tickets
        .insert_next_tx(&mut tx, "A", None, TicketStatus::Waiting)
        .await
        .unwrap();
    db.tickets
        .set_status_tx(&mut tx, done.id, TicketStatus::Completed, Utc::now())
        .await
        .unwrap();
    let open = db
        .tickets
        .insert_next_tx(&mut tx, "A", None, TicketStatus::Waiting)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let stats = db.cleanup.purge_finished().await.unwrap();
    assert_eq!(stats.appointments_deleted, 1);
    assert_eq!(stats.tickets_deleted, 1);

    assert!(db.tickets.get(done.id).await.unwrap().is_none());
    assert!(db.tickets.get(open.id).await.unwrap().is_some());

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_cleanup_frees_past_slots_and_keeps_upcoming_bookings() {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;
    let data = TestData::new(db);
    let today = TestData::today();

    let doctor = data.doctor("Lisa Cuddy", "Endocrinology").await;
    let past = data
        .slot(&doctor, today - chrono::Duration::days(2), at(10, 0), Some(3))
        .await;
    let upcoming = data
        .slot(&doctor, today + chrono::Duration::days(2), at(10, 0), Some(3))
        .await;
    data.book(&past, None).await;
    let kept = data.book(&upcoming, None).await;

    assert!(!db.schedules.get(past.id).await.unwrap().unwrap().is_available);
    assert!(!db.schedules.get(upcoming.id).await.unwrap().unwrap().is_available);

    let stats = db.cleanup.purge_finished().await.unwrap();
    assert_eq!(stats.appointments_deleted, 1);

    // The past slot is released along with its appointment.
    assert!(db.schedules.get(past.id).await.unwrap().unwrap().is_available);

    // Upcoming bookings survive and their slot stays taken.
    assert!(!db.schedules.get(upcoming.id).await.unwrap().unwrap().is_available);
    let remaining: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM appointments WHERE schedule_id = $1")
            .bind(upcoming.id)
            .fetch_one(&db.pool)
            .await
            .unwrap();
    assert_eq!(remaining, 1);
    assert!(db.appointments.get(kept.id).await.unwrap().is_some());

    test_db.cleanup().await;
}
