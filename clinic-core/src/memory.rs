//! In-memory `ClinicStore` used as the test double for the service layer.
//!
//! A single `tokio::sync::Mutex` around the whole state makes the booking
//! unit trivially atomic: a concurrent `book_scheduled` for the same doctor
//! and date cannot observe the state between check and insert. Coarser than
//! the per-doctor lock the Postgres adapter takes, but the same contract.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::access::AppointmentScope;
use crate::error::{ClinicError, Result};
use crate::guards::{CapacityGuard, SlotConflictCheck};
use crate::ports::ClinicStore;
use crate::types::{
    Appointment, AppointmentStatus, AppointmentView, BookingRequest, Doctor, Patient,
};

#[derive(Default)]
struct State {
    doctors: HashMap<Uuid, Doctor>,
    patients: HashMap<Uuid, Patient>,
    appointments: HashMap<Uuid, Appointment>,
}

#[derive(Default)]
pub struct MemoryClinicStore {
    state: Mutex<State>,
}

impl MemoryClinicStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_doctor(&self, full_name: &str, specialty: &str, max_patients_per_day: i32) -> Doctor {
        let doctor = Doctor {
            doctor_id: Uuid::new_v4(),
            full_name: full_name.to_string(),
            specialty: specialty.to_string(),
            max_patients_per_day,
        };
        self.state
            .lock()
            .await
            .doctors
            .insert(doctor.doctor_id, doctor.clone());
        doctor
    }

    pub async fn seed_patient(&self, full_name: &str) -> Patient {
        let patient = Patient {
            patient_id: Uuid::new_v4(),
            full_name: full_name.to_string(),
        };
        self.state
            .lock()
            .await
            .patients
            .insert(patient.patient_id, patient.clone());
        patient
    }
}

#[async_trait]
impl ClinicStore for MemoryClinicStore {
    async fn list_doctors(&self) -> Result<Vec<Doctor>> {
        let state = self.state.lock().await;
        let mut doctors: Vec<Doctor> = state.doctors.values().cloned().collect();
        doctors.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(doctors)
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>> {
        Ok(self.state.lock().await.doctors.get(&doctor_id).cloned())
    }

    async fn get_patient(&self, patient_id: Uuid) -> Result<Option<Patient>> {
        Ok(self.state.lock().await.patients.get(&patient_id).cloned())
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>> {
        Ok(self
            .state
            .lock()
            .await
            .appointments
            .get(&appointment_id)
            .cloned())
    }

    async fn list_appointments(&self, scope: &AppointmentScope) -> Result<Vec<AppointmentView>> {
        let state = self.state.lock().await;
        let mut views = Vec::new();
        for appointment in state.appointments.values() {
            if !scope.permits(appointment) {
                continue;
            }
            let doctor = state.doctors.get(&appointment.doctor_id).ok_or_else(|| {
                ClinicError::NotFound(format!("doctor {}", appointment.doctor_id))
            })?;
            let patient = state.patients.get(&appointment.patient_id).ok_or_else(|| {
                ClinicError::NotFound(format!("patient {}", appointment.patient_id))
            })?;
            views.push(AppointmentView {
                appointment: appointment.clone(),
                doctor_name: doctor.full_name.clone(),
                doctor_specialty: doctor.specialty.clone(),
                patient_name: patient.full_name.clone(),
            });
        }
        views.sort_by_key(|v| (v.appointment.date, v.appointment.time));
        Ok(views)
    }

    async fn book_scheduled(&self, request: &BookingRequest) -> Result<Appointment> {
        // Single lock across check and insert — the atomic unit.
        let mut state = self.state.lock().await;

        let doctor = state
            .doctors
            .get(&request.doctor_id)
            .ok_or_else(|| ClinicError::NotFound(format!("doctor {}", request.doctor_id)))?;
        let max_patients_per_day = doctor.max_patients_per_day;

        let active: Vec<&Appointment> = state
            .appointments
            .values()
            .filter(|a| {
                a.doctor_id == request.doctor_id
                    && a.date == request.date
                    && a.status.is_active()
            })
            .collect();

        CapacityGuard::admit(
            request.doctor_id,
            request.date,
            max_patients_per_day,
            active.len() as i64,
        )?;
        let slot_taken = active.iter().any(|a| a.time == request.time);
        SlotConflictCheck::check(request.doctor_id, request.date, request.time, slot_taken)?;

        let now = Utc::now();
        let appointment = Appointment {
            appointment_id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            patient_id: request.patient_id,
            date: request.date,
            time: request.time,
            concern: request.concern.clone(),
            status: AppointmentStatus::Scheduled,
            created_at: now,
            updated_at: now,
        };
        state
            .appointments
            .insert(appointment.appointment_id, appointment.clone());
        Ok(appointment)
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected_from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Appointment> {
        let mut state = self.state.lock().await;
        let appointment = state
            .appointments
            .get_mut(&appointment_id)
            .ok_or_else(|| ClinicError::NotFound(format!("appointment {appointment_id}")))?;

        if appointment.status != expected_from {
            // A concurrent transition won the race.
            return Err(ClinicError::InvalidTransition {
                from: appointment.status,
                to,
            });
        }

        appointment.status = to;
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }
}
