//! Clinic booking core — appointment booking and lifecycle engine.
//!
//! Pure domain crate: types, the persistent-store port trait, and the four
//! decision components (access scoping, capacity guard, slot-conflict
//! check, status machine) composed by [`service::BookingService`]. Storage
//! adapters live in sibling crates; this crate carries no sqlx.

pub mod access;
pub mod error;
pub mod guards;
pub mod memory;
pub mod ports;
pub mod principal;
pub mod service;
pub mod status;
pub mod types;

pub use access::{AccessScope, AppointmentScope};
pub use error::{ClinicError, Result};
pub use ports::ClinicStore;
pub use principal::{Principal, Role};
pub use service::BookingService;
pub use status::StatusMachine;
pub use types::{
    Appointment, AppointmentStatus, AppointmentView, BookingRequest, Doctor, Patient,
};
