//! End-to-end exercises of the booking service against the in-memory store:
//! capacity enforcement, slot uniqueness, lifecycle legality, role scoping,
//! and the concurrent-booking race.

use std::sync::Arc;

use chrono::{Days, NaiveDate, NaiveTime, Utc};

use clinic_core::memory::MemoryClinicStore;
use clinic_core::{
    AppointmentStatus, BookingRequest, BookingService, ClinicError, ClinicStore, Principal,
};

fn future_date(days_ahead: u64) -> NaiveDate {
    Utc::now()
        .date_naive()
        .checked_add_days(Days::new(days_ahead))
        .unwrap()
}

fn at(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
}

fn request(
    patient_id: uuid::Uuid,
    doctor_id: uuid::Uuid,
    date: NaiveDate,
    time: NaiveTime,
) -> BookingRequest {
    BookingRequest {
        patient_id,
        doctor_id,
        date,
        time,
        concern: "checkup".into(),
    }
}

async fn setup(max_patients_per_day: i32) -> (BookingService, Arc<MemoryClinicStore>) {
    let store = Arc::new(MemoryClinicStore::new());
    let _ = store
        .seed_doctor("Dr. Imani Okafor", "cardiology", max_patients_per_day)
        .await;
    (BookingService::new(store.clone()), store)
}

#[tokio::test]
async fn booking_creates_scheduled_appointment() {
    let (service, store) = setup(3).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let patient = store.seed_patient("Ana Silva").await;

    let appt = service
        .book(
            &Principal::patient(patient.patient_id),
            request(patient.patient_id, doctor.doctor_id, future_date(5), at(10)),
        )
        .await
        .unwrap();

    assert_eq!(appt.status, AppointmentStatus::Scheduled);
    assert_eq!(appt.doctor_id, doctor.doctor_id);
    assert_eq!(appt.patient_id, patient.patient_id);
}

#[tokio::test]
async fn fourth_booking_hits_capacity() {
    let (service, store) = setup(3).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let date = future_date(5);

    for hour in [9, 10, 11] {
        let p = store.seed_patient("Patient").await;
        service
            .book(
                &Principal::patient(p.patient_id),
                request(p.patient_id, doctor.doctor_id, date, at(hour)),
            )
            .await
            .unwrap();
    }

    let p4 = store.seed_patient("Fourth Patient").await;
    let err = service
        .book(
            &Principal::patient(p4.patient_id),
            request(p4.patient_id, doctor.doctor_id, date, at(15)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::CapacityExceeded { .. }));
}

#[tokio::test]
async fn capacity_is_per_date() {
    let (service, store) = setup(1).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();

    let p1 = store.seed_patient("A").await;
    let p2 = store.seed_patient("B").await;
    service
        .book(
            &Principal::patient(p1.patient_id),
            request(p1.patient_id, doctor.doctor_id, future_date(5), at(10)),
        )
        .await
        .unwrap();

    // Same doctor, next day: fresh capacity.
    service
        .book(
            &Principal::patient(p2.patient_id),
            request(p2.patient_id, doctor.doctor_id, future_date(6), at(10)),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn identical_slot_is_rejected() {
    let (service, store) = setup(3).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let date = future_date(5);

    let p1 = store.seed_patient("A").await;
    let p2 = store.seed_patient("B").await;
    service
        .book(
            &Principal::patient(p1.patient_id),
            request(p1.patient_id, doctor.doctor_id, date, at(10)),
        )
        .await
        .unwrap();

    let err = service
        .book(
            &Principal::patient(p2.patient_id),
            request(p2.patient_id, doctor.doctor_id, date, at(10)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::SlotConflict { .. }));
}

#[tokio::test]
async fn cancelled_slot_is_immediately_rebookable() {
    let (service, store) = setup(3).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let date = future_date(5);

    let mut appointments = Vec::new();
    for hour in [9, 10, 11] {
        let p = store.seed_patient("Patient").await;
        let appt = service
            .book(
                &Principal::patient(p.patient_id),
                request(p.patient_id, doctor.doctor_id, date, at(hour)),
            )
            .await
            .unwrap();
        appointments.push((p, appt));
    }

    // At capacity; cancelling one releases both the count and the slot.
    let (owner, appt) = &appointments[1];
    service
        .cancel(&Principal::patient(owner.patient_id), appt.appointment_id)
        .await
        .unwrap();

    let p4 = store.seed_patient("Fourth Patient").await;
    let rebooked = service
        .book(
            &Principal::patient(p4.patient_id),
            request(p4.patient_id, doctor.doctor_id, date, at(10)),
        )
        .await
        .unwrap();
    assert_eq!(rebooked.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn confirmed_appointment_still_occupies_slot_and_capacity() {
    let (service, store) = setup(2).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let date = future_date(5);

    let p1 = store.seed_patient("A").await;
    let appt = service
        .book(
            &Principal::patient(p1.patient_id),
            request(p1.patient_id, doctor.doctor_id, date, at(10)),
        )
        .await
        .unwrap();
    service
        .transition(
            &Principal::doctor(doctor.doctor_id),
            appt.appointment_id,
            AppointmentStatus::Confirmed,
        )
        .await
        .unwrap();

    // Confirming changes nothing about occupancy: the slot stays taken.
    let p2 = store.seed_patient("B").await;
    let err = service
        .book(
            &Principal::patient(p2.patient_id),
            request(p2.patient_id, doctor.doctor_id, date, at(10)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::SlotConflict { .. }));

    // And the confirmed appointment still counts toward the daily limit.
    service
        .book(
            &Principal::patient(p2.patient_id),
            request(p2.patient_id, doctor.doctor_id, date, at(11)),
        )
        .await
        .unwrap();
    let p3 = store.seed_patient("C").await;
    let err = service
        .book(
            &Principal::patient(p3.patient_id),
            request(p3.patient_id, doctor.doctor_id, date, at(12)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::CapacityExceeded { .. }));
}

#[tokio::test]
async fn two_simultaneous_bookings_yield_one_success() {
    let (service, store) = setup(1).await;
    let service = Arc::new(service);
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let date = future_date(5);

    let p1 = store.seed_patient("A").await;
    let p2 = store.seed_patient("B").await;

    let s1 = service.clone();
    let s2 = service.clone();
    let d = doctor.doctor_id;
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move {
            s1.book(
                &Principal::patient(p1.patient_id),
                request(p1.patient_id, d, date, at(10)),
            )
            .await
        }),
        tokio::spawn(async move {
            s2.book(
                &Principal::patient(p2.patient_id),
                request(p2.patient_id, d, date, at(10)),
            )
            .await
        }),
    );

    let results = [r1.unwrap(), r2.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one concurrent booking may win");
    let failure = results.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        failure.as_ref().unwrap_err(),
        ClinicError::CapacityExceeded { .. } | ClinicError::SlotConflict { .. }
    ));
}

#[tokio::test]
async fn patient_sees_only_own_appointments() {
    let (service, store) = setup(5).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let date = future_date(5);

    let p1 = store.seed_patient("Mine").await;
    let p2 = store.seed_patient("Theirs").await;
    service
        .book(
            &Principal::patient(p1.patient_id),
            request(p1.patient_id, doctor.doctor_id, date, at(9)),
        )
        .await
        .unwrap();
    service
        .book(
            &Principal::patient(p2.patient_id),
            request(p2.patient_id, doctor.doctor_id, date, at(10)),
        )
        .await
        .unwrap();

    let mine = service
        .list_for(&Principal::patient(p1.patient_id))
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert!(mine
        .iter()
        .all(|v| v.appointment.patient_id == p1.patient_id));

    // Admin sees everything; doctor sees both of their own.
    let all = service
        .list_for(&Principal::admin(uuid::Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    let doctors_view = service
        .list_for(&Principal::doctor(doctor.doctor_id))
        .await
        .unwrap();
    assert_eq!(doctors_view.len(), 2);
}

#[tokio::test]
async fn list_is_ordered_by_date_then_time() {
    let (service, store) = setup(5).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let p = store.seed_patient("P").await;
    let principal = Principal::patient(p.patient_id);

    for (days, hour) in [(6, 9), (5, 14), (5, 8)] {
        service
            .book(
                &principal,
                request(p.patient_id, doctor.doctor_id, future_date(days), at(hour)),
            )
            .await
            .unwrap();
    }

    let listed = service.list_for(&principal).await.unwrap();
    let keys: Vec<_> = listed
        .iter()
        .map(|v| (v.appointment.date, v.appointment.time))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[tokio::test]
async fn doctor_confirms_then_patient_cancels() {
    let (service, store) = setup(3).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let p = store.seed_patient("P").await;
    let appt = service
        .book(
            &Principal::patient(p.patient_id),
            request(p.patient_id, doctor.doctor_id, future_date(5), at(10)),
        )
        .await
        .unwrap();

    let confirmed = service
        .transition(
            &Principal::doctor(doctor.doctor_id),
            appt.appointment_id,
            AppointmentStatus::Confirmed,
        )
        .await
        .unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    let cancelled = service
        .cancel(&Principal::patient(p.patient_id), appt.appointment_id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn cancelled_appointment_cannot_be_completed() {
    let (service, store) = setup(3).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let p = store.seed_patient("P").await;
    let appt = service
        .book(
            &Principal::patient(p.patient_id),
            request(p.patient_id, doctor.doctor_id, future_date(5), at(10)),
        )
        .await
        .unwrap();

    service
        .cancel(&Principal::patient(p.patient_id), appt.appointment_id)
        .await
        .unwrap();

    let err = service
        .transition(
            &Principal::doctor(doctor.doctor_id),
            appt.appointment_id,
            AppointmentStatus::Completed,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::InvalidTransition { .. }));
}

#[tokio::test]
async fn completed_appointment_cannot_be_cancelled_even_by_admin() {
    let (service, store) = setup(3).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let p = store.seed_patient("P").await;
    let appt = service
        .book(
            &Principal::patient(p.patient_id),
            request(p.patient_id, doctor.doctor_id, future_date(5), at(10)),
        )
        .await
        .unwrap();

    service
        .transition(
            &Principal::doctor(doctor.doctor_id),
            appt.appointment_id,
            AppointmentStatus::Completed,
        )
        .await
        .unwrap();

    let err = service
        .transition(
            &Principal::admin(uuid::Uuid::new_v4()),
            appt.appointment_id,
            AppointmentStatus::Cancelled,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::InvalidTransition { .. }));
}

#[tokio::test]
async fn terminal_statuses_release_capacity() {
    let (service, store) = setup(1).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let date = future_date(5);

    let p = store.seed_patient("P").await;
    let appt = service
        .book(
            &Principal::patient(p.patient_id),
            request(p.patient_id, doctor.doctor_id, date, at(10)),
        )
        .await
        .unwrap();
    service
        .transition(
            &Principal::doctor(doctor.doctor_id),
            appt.appointment_id,
            AppointmentStatus::NoShow,
        )
        .await
        .unwrap();

    let p2 = store.seed_patient("Q").await;
    service
        .book(
            &Principal::patient(p2.patient_id),
            request(p2.patient_id, doctor.doctor_id, date, at(11)),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn booking_for_someone_else_is_unauthorized() {
    let (service, store) = setup(3).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let p = store.seed_patient("Victim").await;

    let err = service
        .book(
            &Principal::patient(uuid::Uuid::new_v4()),
            request(p.patient_id, doctor.doctor_id, future_date(5), at(10)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::Unauthorized(_)));
}

#[tokio::test]
async fn out_of_scope_doctor_sees_not_found() {
    let (service, store) = setup(3).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let p = store.seed_patient("P").await;
    let appt = service
        .book(
            &Principal::patient(p.patient_id),
            request(p.patient_id, doctor.doctor_id, future_date(5), at(10)),
        )
        .await
        .unwrap();

    // A doctor with no visibility into the appointment gets the same error
    // as for a nonexistent one, so a denial never confirms the record
    // exists.
    let existing = service
        .transition(
            &Principal::doctor(uuid::Uuid::new_v4()),
            appt.appointment_id,
            AppointmentStatus::Completed,
        )
        .await
        .unwrap_err();
    let missing = service
        .transition(
            &Principal::doctor(uuid::Uuid::new_v4()),
            uuid::Uuid::new_v4(),
            AppointmentStatus::Completed,
        )
        .await
        .unwrap_err();
    assert!(matches!(existing, ClinicError::NotFound(_)));
    assert!(matches!(missing, ClinicError::NotFound(_)));
}

#[tokio::test]
async fn owning_patient_denied_completion_sees_unauthorized() {
    let (service, store) = setup(3).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let p = store.seed_patient("P").await;
    let appt = service
        .book(
            &Principal::patient(p.patient_id),
            request(p.patient_id, doctor.doctor_id, future_date(5), at(10)),
        )
        .await
        .unwrap();

    // The record is within the patient's own scope, so the denial is an
    // honest Unauthorized rather than a masked NotFound.
    let err = service
        .transition(
            &Principal::patient(p.patient_id),
            appt.appointment_id,
            AppointmentStatus::Completed,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::Unauthorized(_)));
}

#[tokio::test]
async fn unknown_doctor_is_not_found() {
    let (service, store) = setup(3).await;
    let p = store.seed_patient("P").await;

    let err = service
        .book(
            &Principal::patient(p.patient_id),
            request(p.patient_id, uuid::Uuid::new_v4(), future_date(5), at(10)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::NotFound(_)));
}

#[tokio::test]
async fn past_booking_is_rejected_before_any_write() {
    let (service, store) = setup(3).await;
    let doctor = store.list_doctors().await.unwrap()[0].clone();
    let p = store.seed_patient("P").await;
    let yesterday = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .unwrap();

    let err = service
        .book(
            &Principal::patient(p.patient_id),
            request(p.patient_id, doctor.doctor_id, yesterday, at(10)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClinicError::Validation(_)));

    let listed = service
        .list_for(&Principal::patient(p.patient_id))
        .await
        .unwrap();
    assert!(listed.is_empty(), "failed booking must leave no record");
}
