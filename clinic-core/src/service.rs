//! BookingService — the public entry point composing access scoping, the
//! booking guards, and the status machine over a [`ClinicStore`].
//!
//! All methods take a `&Principal` explicitly — no implicit identity. Each
//! operation is synchronous request/response against the store; the only
//! serialized sections are the store's atomic booking unit and the per-row
//! status compare-and-set.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::AccessScope;
use crate::error::{ClinicError, Result};
use crate::ports::ClinicStore;
use crate::principal::Principal;
use crate::status::StatusMachine;
use crate::types::{
    Appointment, AppointmentStatus, AppointmentView, BookingRequest, Doctor,
};

pub struct BookingService {
    store: Arc<dyn ClinicStore>,
}

impl BookingService {
    pub fn new(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    /// All doctors, with display profile joined.
    pub async fn list_doctors(&self) -> Result<Vec<Doctor>> {
        self.store.list_doctors().await
    }

    /// Appointments visible to this principal, ordered by date then time.
    pub async fn list_for(&self, principal: &Principal) -> Result<Vec<AppointmentView>> {
        let scope = AccessScope::scope_appointments(principal);
        self.store.list_appointments(&scope).await
    }

    /// Book a new appointment. Field validation, then authorization, then
    /// the store's atomic capacity + slot + insert unit. The created
    /// appointment has status `scheduled`.
    pub async fn book(
        &self,
        principal: &Principal,
        request: BookingRequest,
    ) -> Result<Appointment> {
        Self::validate_booking(&request, Utc::now().naive_utc())?;
        AccessScope::authorize_booking(principal, &request)?;

        let doctor = self
            .store
            .get_doctor(request.doctor_id)
            .await?
            .ok_or_else(|| ClinicError::NotFound(format!("doctor {}", request.doctor_id)))?;
        self.store
            .get_patient(request.patient_id)
            .await?
            .ok_or_else(|| ClinicError::NotFound(format!("patient {}", request.patient_id)))?;

        match self.store.book_scheduled(&request).await {
            Ok(appointment) => {
                info!(
                    appointment_id = %appointment.appointment_id,
                    doctor_id = %doctor.doctor_id,
                    date = %appointment.date,
                    time = %appointment.time,
                    "appointment booked"
                );
                Ok(appointment)
            }
            Err(err) => {
                warn!(
                    doctor_id = %request.doctor_id,
                    date = %request.date,
                    error = %err,
                    "booking rejected"
                );
                Err(err)
            }
        }
    }

    /// Apply a status transition: authorize first, then validate the edge,
    /// then write via compare-and-set so a raced row cannot skip the table.
    /// Denials against records outside the actor's scope report `NotFound`,
    /// indistinguishable from the record not existing.
    pub async fn transition(
        &self,
        principal: &Principal,
        appointment_id: Uuid,
        target: AppointmentStatus,
    ) -> Result<Appointment> {
        let appointment = self
            .store
            .get_appointment(appointment_id)
            .await?
            .ok_or_else(|| ClinicError::NotFound(format!("appointment {appointment_id}")))?;

        // An actor with no visibility into the record must learn nothing
        // from the denial, not even that the record exists: the denial is
        // reported as NotFound unless the appointment is within the actor's
        // own scope.
        AccessScope::authorize_transition(principal, &appointment, target).map_err(|err| {
            if AccessScope::scope_appointments(principal).permits(&appointment) {
                err
            } else {
                ClinicError::NotFound(format!("appointment {appointment_id}"))
            }
        })?;
        StatusMachine::validate(appointment.status, target)?;

        let updated = self
            .store
            .update_status(appointment_id, appointment.status, target)
            .await?;
        info!(
            appointment_id = %appointment_id,
            from = %appointment.status,
            to = %target,
            "appointment status changed"
        );
        Ok(updated)
    }

    /// Cancel an appointment. Cancelling an active appointment releases its
    /// counted slot for new bookings at the same doctor and date.
    pub async fn cancel(
        &self,
        principal: &Principal,
        appointment_id: Uuid,
    ) -> Result<Appointment> {
        self.transition(principal, appointment_id, AppointmentStatus::Cancelled)
            .await
    }

    fn validate_booking(request: &BookingRequest, now: NaiveDateTime) -> Result<()> {
        if request.patient_id.is_nil() {
            return Err(ClinicError::Validation("patient_id is required".into()));
        }
        if request.doctor_id.is_nil() {
            return Err(ClinicError::Validation("doctor_id is required".into()));
        }
        if request.concern.trim().is_empty() {
            return Err(ClinicError::Validation("concern must not be empty".into()));
        }
        if request.date.and_time(request.time) <= now {
            return Err(ClinicError::Validation(
                "appointment must be in the future".into(),
            ));
        }
        Ok(())
    }
}
