//! Schedule board read model.

use chrono::{Local, NaiveDate};
use tracing::info;

use equeue_core::defaults::{SCHEDULE_DEFAULT_END, SCHEDULE_DEFAULT_START};
use equeue_core::{
    CreateScheduleRequest, DoctorSlotRow, DoctorSlots, Error, Result, Schedule,
    ScheduleRepository, ScheduleWithAppointment, SlotView, TodaySchedule,
};
use equeue_db::Database;

const TIME_FORMAT: &str = "%H:%M:%S";

/// Builds the day view of every doctor's slots and manages slots.
#[derive(Clone)]
pub struct ScheduleBoard {
    db: Database,
}

impl ScheduleBoard {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Snapshot of today's slots grouped by doctor.
    pub async fn today(&self) -> Result<TodaySchedule> {
        self.snapshot(Local::now().date_naive()).await
    }

    /// Snapshot of `date`'s slots grouped by doctor.
    pub async fn snapshot(&self, date: NaiveDate) -> Result<TodaySchedule> {
        let bounds = self.db.schedules.time_bounds(date).await?;
        let rows = self.db.schedules.list_with_doctors(date).await?;
        Ok(build_snapshot(date, bounds, rows))
    }

    /// One doctor's slots on `date`, with bookings.
    pub async fn doctor_day(
        &self,
        doctor_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleWithAppointment>> {
        self.db.schedules.doctor_day(doctor_id, date).await
    }

    pub async fn create_slot(&self, req: CreateScheduleRequest) -> Result<Schedule> {
        if req.start_time >= req.end_time {
            return Err(Error::InvalidInput(
                "start_time must be before end_time".to_string(),
            ));
        }
        let slot = self.db.schedules.create(req).await?;
        info!(
            subsystem = "api",
            component = "schedule_board",
            op = "create",
            schedule_id = slot.id,
            doctor_id = slot.doctor_id,
            date = %slot.date,
            "Schedule slot created"
        );
        Ok(slot)
    }

    pub async fn delete_slot(&self, id: i64) -> Result<()> {
        if !self.db.schedules.delete(id).await? {
            return Err(Error::ScheduleNotFound(id));
        }
        info!(
            subsystem = "api",
            component = "schedule_board",
            op = "delete",
            schedule_id = id,
            "Schedule slot deleted"
        );
        Ok(())
    }
}

/// Group ordered `(doctor, slot)` rows into the board payload.
///
/// Rows must arrive grouped by doctor and sorted by start time within each
/// doctor; doctors without rows do not appear.
pub fn build_snapshot(
    date: NaiveDate,
    bounds: Option<(chrono::NaiveTime, chrono::NaiveTime)>,
    rows: Vec<DoctorSlotRow>,
) -> TodaySchedule {
    let (min_start_time, max_end_time) = match bounds {
        Some((start, end)) => (
            start.format(TIME_FORMAT).to_string(),
            end.format(TIME_FORMAT).to_string(),
        ),
        None => (
            SCHEDULE_DEFAULT_START.to_string(),
            SCHEDULE_DEFAULT_END.to_string(),
        ),
    };

    let mut doctors: Vec<DoctorSlots> = Vec::new();
    for DoctorSlotRow { doctor, schedule } in rows {
        let slot = SlotView {
            start_time: schedule.start_time.format(TIME_FORMAT).to_string(),
            end_time: schedule.end_time.format(TIME_FORMAT).to_string(),
            is_available: schedule.is_available,
            cabinet: schedule.cabinet,
        };
        match doctors.last_mut() {
            Some(last) if last.id == doctor.id => last.slots.push(slot),
            _ => doctors.push(DoctorSlots {
                id: doctor.id,
                full_name: doctor.full_name,
                specialization: doctor.specialization,
                slots: vec![slot],
            }),
        }
    }

    TodaySchedule {
        date: date.format("%Y-%m-%d").to_string(),
        min_start_time,
        max_end_time,
        doctors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Timelike};
    use equeue_core::{Doctor, DoctorStatus};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn row(doctor_id: i64, name: &str, start: NaiveTime, available: bool) -> DoctorSlotRow {
        DoctorSlotRow {
            doctor: Doctor {
                id: doctor_id,
                full_name: name.to_string(),
                specialization: "Therapist".to_string(),
                status: DoctorStatus::Active,
            },
            schedule: Schedule {
                id: doctor_id * 100 + i64::from(start.hour()),
                doctor_id,
                date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
                start_time: start,
                end_time: start + chrono::Duration::minutes(30),
                is_available: available,
                cabinet: Some(12),
            },
        }
    }

    #[test]
    fn test_empty_day_uses_default_window() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let snapshot = build_snapshot(date, None, Vec::new());
        assert_eq!(snapshot.date, "2026-10-19");
        assert_eq!(snapshot.min_start_time, "09:00:00");
        assert_eq!(snapshot.max_end_time, "18:00:00");
        assert!(snapshot.doctors.is_empty());
    }

    #[test]
    fn test_groups_consecutive_rows_by_doctor() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let rows = vec![
            row(1, "Ivanova", t(8, 0), true),
            row(1, "Ivanova", t(9, 0), false),
            row(2, "Petrov", t(10, 0), true),
        ];
        let snapshot = build_snapshot(date, Some((t(8, 0), t(10, 30))), rows);

        assert_eq!(snapshot.min_start_time, "08:00:00");
        assert_eq!(snapshot.max_end_time, "10:30:00");
        assert_eq!(snapshot.doctors.len(), 2);
        assert_eq!(snapshot.doctors[0].full_name, "Ivanova");
        assert_eq!(snapshot.doctors[0].slots.len(), 2);
        assert!(!snapshot.doctors[0].slots[1].is_available);
        assert_eq!(snapshot.doctors[1].slots[0].start_time, "10:00:00");
        assert_eq!(snapshot.doctors[1].slots[0].cabinet, Some(12));
    }
}
