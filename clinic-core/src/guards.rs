//! CapacityGuard and SlotConflictCheck — the admit/reject decisions a store
//! implementation evaluates inside its atomic booking unit.
//!
//! Both are pure: the store gathers the active-appointment count and slot
//! occupancy under its own serialization (a transaction with a per-doctor
//! row lock, or a single mutex for the in-memory store) and asks these
//! guards for the verdict. The check and the subsequent insert must not be
//! interleavable by a concurrent booking for the same doctor and date.

use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::error::ClinicError;

pub struct CapacityGuard;

impl CapacityGuard {
    /// Admit a booking if the doctor's active-appointment count for the date
    /// is below `max_patients_per_day`. `confirmed` counts identically to
    /// `scheduled`; terminal statuses never count. No retry on rejection.
    pub fn admit(
        doctor_id: Uuid,
        date: NaiveDate,
        max_patients_per_day: i32,
        active_count: i64,
    ) -> Result<(), ClinicError> {
        if active_count >= i64::from(max_patients_per_day) {
            return Err(ClinicError::CapacityExceeded { doctor_id, date });
        }
        Ok(())
    }
}

pub struct SlotConflictCheck;

impl SlotConflictCheck {
    /// Reject the booking if an active appointment already occupies the
    /// exact (doctor, date, time) triple.
    pub fn check(
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        slot_taken: bool,
    ) -> Result<(), ClinicError> {
        if slot_taken {
            return Err(ClinicError::SlotConflict {
                doctor_id,
                date,
                time,
            });
        }
        Ok(())
    }
}
