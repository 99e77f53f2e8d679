//! Integration tests for the doctor and schedule boards.

use chrono::NaiveTime;
use equeue_api::services::{DoctorBoard, ScheduleBoard, TicketLifecycle};
use equeue_core::defaults::NO_RECEPTION_MESSAGE;
use equeue_core::{Broker, Notification};
use equeue_db::test_fixtures::{TestData, TestDatabase};
use equeue_db::{
    CreateScheduleRequest, DoctorAction, DoctorStatus, Error, ScheduleRepository, TicketStatus,
};

fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[tokio::test]
async fn test_screen_state_without_slots() {
    let test_db = TestDatabase::new().await;
    let board = DoctorBoard::new(test_db.db.clone(), Broker::new());

    let screen = board.screen_state(404).await.unwrap();
    assert_eq!(screen.cabinet_number, 404);
    assert_eq!(screen.message.as_deref(), Some(NO_RECEPTION_MESSAGE));
    assert!(screen.queue.is_empty());
    assert!(screen.doctor_name.is_empty());

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_screen_state_orders_in_progress_first() {
    let test_db = TestDatabase::new().await;
    let data = TestData::new(&test_db.db);
    let lifecycle = TicketLifecycle::new(test_db.db.clone());
    let board = DoctorBoard::new(test_db.db.clone(), Broker::new());

    let doctor = data
        .doctor_with_status("Allison Cameron", "Immunology", DoctorStatus::Active)
        .await;
    let patient = data.patient("John Roe", Some("555-0101")).await;
    let early = data.slot(&doctor, TestData::today(), at(9, 0), Some(12)).await;
    let late = data.slot(&doctor, TestData::today(), at(9, 30), Some(12)).await;
    let early_appt = data.book(&early, Some(&patient)).await;
    let late_appt = data.book(&late, None).await;

    let first = lifecycle.create("confirm_appointment").await.unwrap();
    let second = lifecycle.create("confirm_appointment").await.unwrap();
    lifecycle
        .confirm_appointment(early_appt.id, first.id)
        .await
        .unwrap();
    lifecycle
        .confirm_appointment(late_appt.id, second.id)
        .await
        .unwrap();
    lifecycle.start_appointment(second.id).await.unwrap();

    let screen = board.screen_state(12).await.unwrap();
    assert_eq!(screen.doctor_name, "Allison Cameron");
    assert_eq!(screen.doctor_specialty, "Immunology");
    assert_eq!(screen.doctor_status, DoctorStatus::Active);
    assert!(screen.message.is_none());

    assert_eq!(screen.queue.len(), 2);
    assert_eq!(screen.queue[0].ticket_number, second.ticket_number);
    assert_eq!(screen.queue[0].status, TicketStatus::InProgress);
    assert_eq!(screen.queue[1].ticket_number, first.ticket_number);
    assert_eq!(screen.queue[1].patient_full_name, "John Roe");
    assert_eq!(screen.queue[1].start_time, "09:00");

    lifecycle.complete_appointment(second.id).await.unwrap();
    let screen = board.screen_state(12).await.unwrap();
    assert_eq!(screen.queue.len(), 1);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_break_actions_publish_status() {
    let test_db = TestDatabase::new().await;
    let data = TestData::new(&test_db.db);
    let broker = Broker::new();
    let board = DoctorBoard::new(test_db.db.clone(), broker.clone());
    let mut subscription = broker.subscribe();

    let doctor = data.doctor("Robert Chase", "Surgery").await;

    assert!(matches!(
        board.apply(doctor.id, DoctorAction::StartBreak).await,
        Err(Error::DoctorStatusConflict(_))
    ));
    assert!(subscription.try_recv().is_none());

    let active = board.apply(doctor.id, DoctorAction::LogIn).await.unwrap();
    assert_eq!(active.status, DoctorStatus::Active);

    let on_break = board
        .apply(doctor.id, DoctorAction::StartBreak)
        .await
        .unwrap();
    assert_eq!(on_break.status, DoctorStatus::OnBreak);

    let mut seen = Vec::new();
    while let Some(notification) = subscription.try_recv() {
        if let Notification::DoctorStatus { doctor_id, status } = notification {
            assert_eq!(doctor_id, doctor.id);
            seen.push(status);
        }
    }
    assert_eq!(seen, vec![DoctorStatus::Active, DoctorStatus::OnBreak]);

    let back = board.apply(doctor.id, DoctorAction::EndBreak).await.unwrap();
    assert_eq!(back.status, DoctorStatus::Active);

    assert!(matches!(
        board.apply(9_999, DoctorAction::LogIn).await,
        Err(Error::DoctorNotFound(9_999))
    ));

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_schedule_snapshot() {
    let test_db = TestDatabase::new().await;
    let data = TestData::new(&test_db.db);
    let board = ScheduleBoard::new(test_db.db.clone());

    let empty = board.today().await.unwrap();
    assert_eq!(empty.min_start_time, "09:00:00");
    assert_eq!(empty.max_end_time, "18:00:00");
    assert!(empty.doctors.is_empty());

    let house = data.doctor("Gregory House", "Diagnostics").await;
    let wilson = data.doctor("James Wilson", "Oncology").await;
    let booked = data.slot(&house, TestData::today(), at(8, 0), Some(1)).await;
    data.slot(&house, TestData::today(), at(8, 30), Some(1)).await;
    data.slot(&wilson, TestData::today(), at(12, 0), Some(2)).await;
    data.book(&booked, None).await;

    let snapshot = board.today().await.unwrap();
    assert_eq!(snapshot.min_start_time, "08:00:00");
    assert_eq!(snapshot.max_end_time, "12:30:00");
    assert_eq!(snapshot.doctors.len(), 2);

    let house_row = snapshot
        .doctors
        .iter()
        .find(|d| d.id == house.id)
        .unwrap();
    assert_eq!(house_row.slots.len(), 2);
    assert_eq!(house_row.slots[0].start_time, "08:00:00");
    assert!(!house_row.slots[0].is_available);
    assert!(house_row.slots[1].is_available);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_create_and_delete_slot() {
    let test_db = TestDatabase::new().await;
    let data = TestData::new(&test_db.db);
    let board = ScheduleBoard::new(test_db.db.clone());
    let doctor = data.doctor("Chris Taub", "Plastic surgery").await;

    let inverted = board
        .create_slot(CreateScheduleRequest {
            doctor_id: doctor.id,
            date: TestData::today(),
            start_time: at(10, 0),
            end_time: at(9, 0),
            is_available: None,
            cabinet: None,
        })
        .await;
    assert!(matches!(inverted, Err(Error::InvalidInput(_))));

    let slot = board
        .create_slot(CreateScheduleRequest {
            doctor_id: doctor.id,
            date: TestData::today(),
            start_time: at(10, 0),
            end_time: at(10, 30),
            is_available: None,
            cabinet: Some(8),
        })
        .await
        .unwrap();
    assert!(slot.is_available);

    board.delete_slot(slot.id).await.unwrap();
    assert!(test_db.db.schedules.get(slot.id).await.unwrap().is_none());
    assert!(matches!(
        board.delete_slot(slot.id).await,
        Err(Error::ScheduleNotFound(_))
    ));

    test_db.cleanup().await;
}
