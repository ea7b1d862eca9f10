//! Enrollment workflow tests: registration state machine, derived occupancy,
//! capacity guards, and deletion guards.

mod support;

use sams_rust::api::{ClassOfferingId, ParentId, RegistrationStatus, StudentId};
use sams_rust::db::repository::{GuardianRef, RepositoryError, StudentRepository};
use sams_rust::services::enrollment;
use support::*;

fn assert_conflict(err: RepositoryError) {
    assert!(
        matches!(err, RepositoryError::Conflict { .. }),
        "expected Conflict, got {:?}",
        err
    );
}

fn assert_not_found(err: RepositoryError) {
    assert!(
        matches!(err, RepositoryError::NotFound { .. }),
        "expected NotFound, got {:?}",
        err
    );
}

#[tokio::test]
async fn test_register_creates_pending_student_and_guardian() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 10).await;

    let student = register_pending(&repo, "Okafor", class_id).await;
    assert_eq!(student.registration_status, RegistrationStatus::Pending);
    assert_eq!(student.class_offering_id, Some(class_id));

    // The guardian was created in the same operation.
    let parent = sams_rust::services::parents::get_parent(&repo, student.parent_id)
        .await
        .unwrap();
    assert_eq!(parent.last_name, "Okafor");
}

#[tokio::test]
async fn test_register_rejects_unknown_class() {
    let repo = repo();
    let err = enrollment::register(
        &repo,
        GuardianRef::New(parent_data("Diallo")),
        student_data("Sam", "Diallo", Some(ClassOfferingId::new(999))),
    )
    .await
    .unwrap_err();
    assert_not_found(err);
}

#[tokio::test]
async fn test_register_rejects_unknown_guardian_reference() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 10).await;

    let err = enrollment::register(
        &repo,
        GuardianRef::Existing(ParentId::new(999)),
        student_data("Sam", "Diallo", Some(class_id)),
    )
    .await
    .unwrap_err();
    assert_not_found(err);

    // The failed registration must not leave a student behind.
    assert_eq!(repo.student_count(), 0);
}

#[tokio::test]
async fn test_register_does_not_check_capacity() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 1).await;

    // Pending registrations may outnumber seats.
    for name in ["A", "B", "C"] {
        register_pending(&repo, name, class_id).await;
    }
    assert_eq!(repo.student_count(), 3);
}

#[tokio::test]
async fn test_last_seat_scenario() {
    // Capacity 2, three pending students: A and B confirm, C gets Conflict,
    // cancelling A frees the seat, C then succeeds.
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 2).await;

    let a = register_pending(&repo, "Abe", class_id).await;
    let b = register_pending(&repo, "Bello", class_id).await;
    let c = register_pending(&repo, "Cisse", class_id).await;

    enrollment::confirm(&repo, a.id).await.unwrap();
    enrollment::confirm(&repo, b.id).await.unwrap();

    let err = enrollment::confirm(&repo, c.id).await.unwrap_err();
    assert!(err.to_string().contains("class is now full"), "{}", err);

    enrollment::cancel(&repo, a.id).await.unwrap();
    let available = enrollment::available_classes(&repo, "2026-2027")
        .await
        .unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].available_spots, 1);

    enrollment::confirm(&repo, c.id).await.unwrap();
    let c = repo.get_student(c.id).await.unwrap();
    assert_eq!(c.registration_status, RegistrationStatus::Confirmed);
}

#[tokio::test]
async fn test_confirm_is_not_idempotent() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 5).await;
    let student = register_pending(&repo, "Okafor", class_id).await;

    enrollment::confirm(&repo, student.id).await.unwrap();
    let err = enrollment::confirm(&repo, student.id).await.unwrap_err();
    assert!(err.to_string().contains("already confirmed"), "{}", err);
}

#[tokio::test]
async fn test_confirm_rejects_cancelled_and_missing_students() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 5).await;
    let student = register_pending(&repo, "Okafor", class_id).await;

    enrollment::cancel(&repo, student.id).await.unwrap();
    assert_conflict(enrollment::confirm(&repo, student.id).await.unwrap_err());

    assert_not_found(
        enrollment::confirm(&repo, StudentId::new(4242))
            .await
            .unwrap_err(),
    );
}

#[tokio::test]
async fn test_cancel_twice_is_a_conflict() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 5).await;
    let student = register_pending(&repo, "Okafor", class_id).await;

    enrollment::cancel(&repo, student.id).await.unwrap();
    assert_conflict(enrollment::cancel(&repo, student.id).await.unwrap_err());
}

#[tokio::test]
async fn test_occupancy_is_derived_across_transitions() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 4).await;

    let students: Vec<_> = {
        let mut v = Vec::new();
        for name in ["A", "B", "C"] {
            v.push(register_pending(&repo, name, class_id).await);
        }
        v
    };

    // available == capacity - confirmed_count at every step.
    async fn available(repo: &sams_rust::db::LocalRepository) -> i64 {
        enrollment::available_classes(repo, "2026-2027")
            .await
            .unwrap()[0]
            .available_spots
    }

    assert_eq!(available(&repo).await, 4);
    enrollment::confirm(&repo, students[0].id).await.unwrap();
    assert_eq!(available(&repo).await, 3);
    enrollment::confirm(&repo, students[1].id).await.unwrap();
    assert_eq!(available(&repo).await, 2);
    enrollment::cancel(&repo, students[0].id).await.unwrap();
    assert_eq!(available(&repo).await, 3);
}

#[tokio::test]
async fn test_full_classes_are_excluded_from_available() {
    let repo = repo();
    let full_id = seed_class(&repo, "Full", 1).await;
    let open_id = seed_class(&repo, "Open", 2).await;

    let s = register_pending(&repo, "Abe", full_id).await;
    enrollment::confirm(&repo, s.id).await.unwrap();

    let available = enrollment::available_classes(&repo, "2026-2027")
        .await
        .unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].offering.id, open_id);
}

#[tokio::test]
async fn test_capacity_reduction_guard() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 5).await;

    for name in ["A", "B", "C"] {
        let s = register_pending(&repo, name, class_id).await;
        enrollment::confirm(&repo, s.id).await.unwrap();
    }

    // Reducing to confirmed occupancy is allowed; below it is not.
    enrollment::update_capacity(&repo, class_id, 3).await.unwrap();
    assert_conflict(
        enrollment::update_capacity(&repo, class_id, 2)
            .await
            .unwrap_err(),
    );

    // Non-positive capacities never reach the repository.
    let err = enrollment::update_capacity(&repo, class_id, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Validation { .. }));
}

#[tokio::test]
async fn test_create_class_validation() {
    let repo = repo();
    let err = enrollment::create_class(
        &repo,
        sams_rust::api::NewClassOffering {
            name: "CM1-A".to_string(),
            capacity: 0,
            academic_year: "2026-2027".to_string(),
            level: String::new(),
            time_slot: String::new(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RepositoryError::Validation { .. }));
}

#[tokio::test]
async fn test_delete_class_blocked_by_any_referencing_student() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 5).await;
    let student = register_pending(&repo, "Okafor", class_id).await;

    // Even a cancelled student blocks deletion.
    enrollment::cancel(&repo, student.id).await.unwrap();
    assert_conflict(enrollment::delete_class(&repo, class_id).await.unwrap_err());

    let empty_id = seed_class(&repo, "Empty", 5).await;
    enrollment::delete_class(&repo, empty_id).await.unwrap();
}

#[tokio::test]
async fn test_delete_parent_blocked_while_owning_students() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 5).await;
    let student = register_pending(&repo, "Okafor", class_id).await;

    assert_conflict(
        sams_rust::services::parents::delete_parent(&repo, student.parent_id)
            .await
            .unwrap_err(),
    );

    // After the student is expelled the guardian can be removed.
    enrollment::expel(&repo, student.id).await.unwrap();
    sams_rust::services::parents::delete_parent(&repo, student.parent_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_expel_cascades_dependent_records() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 5).await;
    let student = register_pending(&repo, "Okafor", class_id).await;

    sams_rust::services::payments::record_payment(
        &repo,
        sams_rust::api::NewPayment {
            student_id: student.id,
            amount_cents: 50_00,
            method: sams_rust::api::PaymentMethod::Cash,
            kind: sams_rust::api::PaymentKind::Registration,
        },
    )
    .await
    .unwrap();
    sams_rust::services::students::flag_student(&repo, student.id, "payment issue")
        .await
        .unwrap();

    enrollment::expel(&repo, student.id).await.unwrap();

    assert_not_found(repo.get_student(student.id).await.unwrap_err());
    // Dependent records are gone with the student.
    assert_not_found(
        sams_rust::services::payments::payments_for_student(&repo, student.id)
            .await
            .unwrap_err(),
    );
    // The guardian and the offering survive.
    sams_rust::services::parents::get_parent(&repo, student.parent_id)
        .await
        .unwrap();
    sams_rust::db::repository::ClassRepository::get_class(&repo, class_id)
        .await
        .unwrap();
}
