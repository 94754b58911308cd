//! AccessScope — role-scoped visibility and mutation authorization.
//!
//! Pure decision functions over supplied state. Scoping narrows which
//! records a query may return; authorization gates a specific mutation
//! before it reaches the status machine or the store. Denials never reveal
//! whether the target record exists.

use crate::error::ClinicError;
use crate::principal::{Principal, Role};
use crate::types::{Appointment, AppointmentStatus, BookingRequest};

/// The record filter a list read must apply for a given principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentScope {
    /// Only appointments where `patient_id` equals the given identity.
    Patient(uuid::Uuid),
    /// Only appointments where `doctor_id` equals the given identity.
    Doctor(uuid::Uuid),
    /// Unrestricted.
    All,
}

impl AppointmentScope {
    pub fn permits(&self, appointment: &Appointment) -> bool {
        match self {
            Self::Patient(id) => appointment.patient_id == *id,
            Self::Doctor(id) => appointment.doctor_id == *id,
            Self::All => true,
        }
    }
}

pub struct AccessScope;

impl AccessScope {
    /// Project the set of visible appointments for this principal.
    pub fn scope_appointments(principal: &Principal) -> AppointmentScope {
        match principal.role {
            Role::Patient => AppointmentScope::Patient(principal.actor_id),
            Role::Doctor => AppointmentScope::Doctor(principal.actor_id),
            Role::Admin => AppointmentScope::All,
        }
    }

    /// Booking creation requires the patient role, booking for oneself.
    pub fn authorize_booking(
        principal: &Principal,
        request: &BookingRequest,
    ) -> Result<(), ClinicError> {
        if principal.role != Role::Patient {
            return Err(ClinicError::Unauthorized(
                "only patients may book appointments".into(),
            ));
        }
        if request.patient_id != principal.actor_id {
            return Err(ClinicError::Unauthorized(
                "patients may only book for themselves".into(),
            ));
        }
        Ok(())
    }

    /// Authorize a status transition on a specific appointment.
    ///
    /// Cancellation is permitted by the owning patient, the owning doctor,
    /// or an admin. Every other target status requires the owning doctor or
    /// an admin.
    pub fn authorize_transition(
        principal: &Principal,
        appointment: &Appointment,
        target: AppointmentStatus,
    ) -> Result<(), ClinicError> {
        if principal.is_admin() {
            return Ok(());
        }

        let allowed = match target {
            AppointmentStatus::Cancelled => match principal.role {
                Role::Patient => appointment.patient_id == principal.actor_id,
                Role::Doctor => appointment.doctor_id == principal.actor_id,
                Role::Admin => true,
            },
            _ => {
                principal.role == Role::Doctor && appointment.doctor_id == principal.actor_id
            }
        };

        if allowed {
            Ok(())
        } else {
            Err(ClinicError::Unauthorized(
                "actor may not modify this appointment".into(),
            ))
        }
    }
}
