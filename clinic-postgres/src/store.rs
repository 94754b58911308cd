//! Postgres implementation of the `ClinicStore` port.
//!
//! A newtype wrapping `PgPool`. All SQL is runtime-checked (`sqlx::query`,
//! not `sqlx::query!`) to avoid a compile-time database requirement. The
//! booking unit runs in one transaction that takes `FOR UPDATE` on the
//! doctor row — the per-doctor serialization point — so two concurrent
//! bookings for the same doctor cannot both observe free capacity or a free
//! slot.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use clinic_core::access::AppointmentScope;
use clinic_core::error::{ClinicError, Result};
use clinic_core::guards::{CapacityGuard, SlotConflictCheck};
use clinic_core::ports::ClinicStore;
use clinic_core::types::{
    Appointment, AppointmentStatus, AppointmentView, BookingRequest, Doctor, Patient,
};

pub struct PgClinicStore {
    pool: PgPool,
}

impl PgClinicStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ── Private FromRow types — converted to domain types via TryFrom ──

#[derive(sqlx::FromRow)]
struct DoctorRow {
    doctor_id: Uuid,
    full_name: String,
    specialty: String,
    max_patients_per_day: i32,
}

impl From<DoctorRow> for Doctor {
    fn from(r: DoctorRow) -> Self {
        Self {
            doctor_id: r.doctor_id,
            full_name: r.full_name,
            specialty: r.specialty,
            max_patients_per_day: r.max_patients_per_day,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PatientRow {
    patient_id: Uuid,
    full_name: String,
}

impl From<PatientRow> for Patient {
    fn from(r: PatientRow) -> Self {
        Self {
            patient_id: r.patient_id,
            full_name: r.full_name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AppointmentRow {
    appointment_id: Uuid,
    doctor_id: Uuid,
    patient_id: Uuid,
    appointment_date: NaiveDate,
    appointment_time: NaiveTime,
    concern: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = ClinicError;

    fn try_from(r: AppointmentRow) -> Result<Self> {
        Ok(Self {
            appointment_id: r.appointment_id,
            doctor_id: r.doctor_id,
            patient_id: r.patient_id,
            date: r.appointment_date,
            time: r.appointment_time,
            concern: r.concern,
            status: r.status.parse()?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AppointmentViewRow {
    appointment_id: Uuid,
    doctor_id: Uuid,
    patient_id: Uuid,
    appointment_date: NaiveDate,
    appointment_time: NaiveTime,
    concern: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    doctor_name: String,
    doctor_specialty: String,
    patient_name: String,
}

impl TryFrom<AppointmentViewRow> for AppointmentView {
    type Error = ClinicError;

    fn try_from(r: AppointmentViewRow) -> Result<Self> {
        Ok(Self {
            appointment: Appointment {
                appointment_id: r.appointment_id,
                doctor_id: r.doctor_id,
                patient_id: r.patient_id,
                date: r.appointment_date,
                time: r.appointment_time,
                concern: r.concern,
                status: r.status.parse()?,
                created_at: r.created_at,
                updated_at: r.updated_at,
            },
            doctor_name: r.doctor_name,
            doctor_specialty: r.doctor_specialty,
            patient_name: r.patient_name,
        })
    }
}

#[async_trait]
impl ClinicStore for PgClinicStore {
    async fn list_doctors(&self) -> Result<Vec<Doctor>> {
        let rows = sqlx::query_as::<_, DoctorRow>(
            r#"
            SELECT doctor_id, full_name, specialty, max_patients_per_day
            FROM doctors
            ORDER BY full_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list doctors")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>> {
        let row = sqlx::query_as::<_, DoctorRow>(
            r#"
            SELECT doctor_id, full_name, specialty, max_patients_per_day
            FROM doctors
            WHERE doctor_id = $1
            "#,
        )
        .bind(doctor_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch doctor")?;

        Ok(row.map(Into::into))
    }

    async fn get_patient(&self, patient_id: Uuid) -> Result<Option<Patient>> {
        let row = sqlx::query_as::<_, PatientRow>(
            r#"SELECT patient_id, full_name FROM patients WHERE patient_id = $1"#,
        )
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch patient")?;

        Ok(row.map(Into::into))
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>> {
        let row = sqlx::query_as::<_, AppointmentRow>(
            r#"SELECT * FROM appointments WHERE appointment_id = $1"#,
        )
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch appointment")?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_appointments(&self, scope: &AppointmentScope) -> Result<Vec<AppointmentView>> {
        let (patient_filter, doctor_filter) = match scope {
            AppointmentScope::Patient(id) => (Some(*id), None),
            AppointmentScope::Doctor(id) => (None, Some(*id)),
            AppointmentScope::All => (None, None),
        };

        let rows = sqlx::query_as::<_, AppointmentViewRow>(
            r#"
            SELECT a.appointment_id, a.doctor_id, a.patient_id,
                   a.appointment_date, a.appointment_time,
                   a.concern, a.status, a.created_at, a.updated_at,
                   d.full_name AS doctor_name,
                   d.specialty AS doctor_specialty,
                   p.full_name AS patient_name
            FROM appointments a
            JOIN doctors d ON d.doctor_id = a.doctor_id
            JOIN patients p ON p.patient_id = a.patient_id
            WHERE ($1::uuid IS NULL OR a.patient_id = $1)
              AND ($2::uuid IS NULL OR a.doctor_id = $2)
            ORDER BY a.appointment_date ASC, a.appointment_time ASC
            "#,
        )
        .bind(patient_filter)
        .bind(doctor_filter)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list appointments")?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn book_scheduled(&self, request: &BookingRequest) -> Result<Appointment> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin booking transaction")?;

        // Doctor row lock: serializes all bookings for this doctor across
        // the check-then-insert sequence. Dropping the transaction on any
        // error path rolls back, leaving no partial record.
        let max_patients_per_day = sqlx::query_scalar::<_, i32>(
            r#"SELECT max_patients_per_day FROM doctors WHERE doctor_id = $1 FOR UPDATE"#,
        )
        .bind(request.doctor_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock doctor row")?
        .ok_or_else(|| ClinicError::NotFound(format!("doctor {}", request.doctor_id)))?;

        let active_count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM appointments
            WHERE doctor_id = $1
              AND appointment_date = $2
              AND status IN ('scheduled', 'confirmed')
            "#,
        )
        .bind(request.doctor_id)
        .bind(request.date)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to count active appointments")?;

        CapacityGuard::admit(
            request.doctor_id,
            request.date,
            max_patients_per_day,
            active_count,
        )?;

        let slot_taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM appointments
                WHERE doctor_id = $1
                  AND appointment_date = $2
                  AND appointment_time = $3
                  AND status IN ('scheduled', 'confirmed')
            )
            "#,
        )
        .bind(request.doctor_id)
        .bind(request.date)
        .bind(request.time)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to check slot occupancy")?;

        SlotConflictCheck::check(request.doctor_id, request.date, request.time, slot_taken)?;

        let row = sqlx::query_as::<_, AppointmentRow>(
            r#"
            INSERT INTO appointments
                (doctor_id, patient_id, appointment_date, appointment_time, concern, status)
            VALUES ($1, $2, $3, $4, $5, 'scheduled')
            RETURNING *
            "#,
        )
        .bind(request.doctor_id)
        .bind(request.patient_id)
        .bind(request.date)
        .bind(request.time)
        .bind(&request.concern)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert appointment")?;

        tx.commit()
            .await
            .context("Failed to commit booking transaction")?;

        row.try_into()
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected_from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Appointment> {
        // Conditional write: only status and updated_at change, and only if
        // the row still holds the status the caller validated against.
        let row = sqlx::query_as::<_, AppointmentRow>(
            r#"
            UPDATE appointments
            SET status = $3, updated_at = now()
            WHERE appointment_id = $1
              AND status = $2
            RETURNING *
            "#,
        )
        .bind(appointment_id)
        .bind(expected_from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update appointment status")?;

        match row {
            Some(r) => r.try_into(),
            None => {
                // Re-read to distinguish a missing row from a raced one.
                match self.get_appointment(appointment_id).await? {
                    None => Err(ClinicError::NotFound(format!(
                        "appointment {appointment_id}"
                    ))),
                    Some(current) => Err(ClinicError::InvalidTransition {
                        from: current.status,
                        to,
                    }),
                }
            }
        }
    }
}
