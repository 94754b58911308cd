use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

use crate::types::AppointmentStatus;

/// Error taxonomy for the booking core.
///
/// Every variant except `Internal` is an expected, local outcome of normal
/// operation and is surfaced to the caller verbatim, with no retry.
#[derive(Debug, Error)]
pub enum ClinicError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("daily capacity reached for doctor {doctor_id} on {date}")]
    CapacityExceeded { doctor_id: Uuid, date: NaiveDate },

    #[error("slot already booked for doctor {doctor_id} on {date} at {time}")]
    SlotConflict {
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    },

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClinicError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::CapacityExceeded { .. } => 409,
            Self::SlotConflict { .. } => 409,
            Self::InvalidTransition { .. } => 409,
            Self::Unauthorized(_) => 403,
            Self::NotFound(_) => 404,
            Self::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClinicError>;
