//! PostgreSQL adapter for the clinic booking core.
//!
//! Implements [`clinic_core::ClinicStore`] over a `PgPool`. Schema lives in
//! `migrations/0001_clinic_schema.sql`.

mod store;

pub use store::PgClinicStore;
