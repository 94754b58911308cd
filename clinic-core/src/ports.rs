//! Port trait for the persistent store. The core issues reads and writes
//! through this trait; storage itself lives behind it (PostgreSQL in
//! production, [`crate::memory::MemoryClinicStore`] in tests).

use async_trait::async_trait;
use uuid::Uuid;

use crate::access::AppointmentScope;
use crate::error::Result;
use crate::types::{
    Appointment, AppointmentStatus, AppointmentView, BookingRequest, Doctor, Patient,
};

#[async_trait]
pub trait ClinicStore: Send + Sync {
    /// All doctors with their display profile joined.
    async fn list_doctors(&self) -> Result<Vec<Doctor>>;

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>>;

    async fn get_patient(&self, patient_id: Uuid) -> Result<Option<Patient>>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>>;

    /// Scoped snapshot read, ordered by date ascending then time ascending.
    /// Restartable: re-invocation reflects current store state.
    async fn list_appointments(&self, scope: &AppointmentScope) -> Result<Vec<AppointmentView>>;

    /// The atomic booking unit: capacity check, slot-conflict check, and
    /// insert applied as one unit that concurrent bookings for the same
    /// (doctor, date) cannot interleave. Serialization is scoped to the
    /// doctor, not global. On rejection no record is written; the created
    /// appointment starts as `scheduled`.
    async fn book_scheduled(&self, request: &BookingRequest) -> Result<Appointment>;

    /// Compare-and-set status write. Fails with `InvalidTransition` when
    /// the row's current status is no longer `expected_from` (a concurrent
    /// transition won); alters status and `updated_at` only.
    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected_from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Appointment>;
}
