//! Student search, payment search, and pagination metadata.

mod support;

use sams_rust::api::{
    NewPayment, PageParams, PaymentFilter, PaymentKind, PaymentMethod, RegistrationStatus,
    StudentFilter, StudentSort,
};
use sams_rust::db::repository::RepositoryError;
use sams_rust::services::{enrollment, payments, students};
use support::*;

#[tokio::test]
async fn test_pagination_metadata_for_25_rows() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 30).await;
    for i in 0..25 {
        register_pending(&repo, &format!("Family{:02}", i), class_id).await;
    }

    let page = students::search_students(
        &repo,
        &StudentFilter::default(),
        StudentSort::default(),
        PageParams::new(3, 10),
    )
    .await
    .unwrap();

    assert_eq!(page.items.len(), 5);
    assert_eq!(page.total, 25);
    assert_eq!(page.pages, 3);
    assert!(!page.has_next);
    assert!(page.has_previous);
}

#[tokio::test]
async fn test_size_is_clamped_to_100() {
    let repo = repo();
    let page = students::search_students(
        &repo,
        &StudentFilter::default(),
        StudentSort::default(),
        PageParams::new(1, 5000),
    )
    .await
    .unwrap();
    assert_eq!(page.size, 100);
    assert_eq!(page.pages, 1);
}

#[tokio::test]
async fn test_free_text_search_is_case_insensitive() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 30).await;
    register_pending(&repo, "Haddad", class_id).await;
    register_pending(&repo, "Bello", class_id).await;

    let filter = StudentFilter {
        q: Some("hADD".to_string()),
        ..Default::default()
    };
    let page = students::search_students(
        &repo,
        &filter,
        StudentSort::default(),
        PageParams::default(),
    )
    .await
    .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].last_name, "Haddad");
}

#[tokio::test]
async fn test_status_filter_composes_with_search() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 30).await;
    let a = register_pending(&repo, "Abe", class_id).await;
    register_pending(&repo, "Abebe", class_id).await;
    enrollment::confirm(&repo, a.id).await.unwrap();

    let filter = StudentFilter {
        q: Some("abe".to_string()),
        status: Some(RegistrationStatus::Confirmed),
        ..Default::default()
    };
    let page = students::search_students(
        &repo,
        &filter,
        StudentSort::default(),
        PageParams::default(),
    )
    .await
    .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, a.id);
}

#[tokio::test]
async fn test_sort_descending_by_last_name() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 30).await;
    for name in ["Ng", "Abe", "Zidane"] {
        register_pending(&repo, name, class_id).await;
    }

    let sort = StudentSort::parse(Some("last_name"), Some("desc"));
    let page = students::search_students(
        &repo,
        &StudentFilter::default(),
        sort,
        PageParams::default(),
    )
    .await
    .unwrap();
    let names: Vec<_> = page.items.iter().map(|s| s.last_name.as_str()).collect();
    assert_eq!(names, ["Zidane", "Ng", "Abe"]);
}

#[tokio::test]
async fn test_unknown_sort_field_falls_back_to_default() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 30).await;
    for name in ["Ng", "Abe"] {
        register_pending(&repo, name, class_id).await;
    }

    // Falls back to last_name ascending instead of erroring.
    let sort = StudentSort::parse(Some("nonsense"), None);
    let page = students::search_students(
        &repo,
        &StudentFilter::default(),
        sort,
        PageParams::default(),
    )
    .await
    .unwrap();
    let names: Vec<_> = page.items.iter().map(|s| s.last_name.as_str()).collect();
    assert_eq!(names, ["Abe", "Ng"]);
}

#[tokio::test]
async fn test_record_payment_mints_unique_receipts() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 30).await;
    let student = register_pending(&repo, "Okafor", class_id).await;

    let first = payments::record_payment(
        &repo,
        NewPayment {
            student_id: student.id,
            amount_cents: 150_00,
            method: PaymentMethod::Card,
            kind: PaymentKind::Registration,
        },
    )
    .await
    .unwrap();
    let second = payments::record_payment(
        &repo,
        NewPayment {
            student_id: student.id,
            amount_cents: 150_00,
            method: PaymentMethod::Card,
            kind: PaymentKind::Registration,
        },
    )
    .await
    .unwrap();

    assert!(first.receipt_number.starts_with("RECEIPT-"));
    assert_ne!(first.receipt_number, second.receipt_number);
    // No idempotency: the retry created a second payment.
    assert_eq!(
        payments::payments_for_student(&repo, student.id)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_negative_payment_is_rejected_before_any_write() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 30).await;
    let student = register_pending(&repo, "Okafor", class_id).await;

    let err = payments::record_payment(
        &repo,
        NewPayment {
            student_id: student.id,
            amount_cents: -5,
            method: PaymentMethod::Cash,
            kind: PaymentKind::Tuition,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RepositoryError::Validation { .. }));

    assert!(payments::payments_for_student(&repo, student.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_payment_search_filters_compose() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 30).await;
    let student = register_pending(&repo, "Okafor", class_id).await;

    for (amount, method) in [
        (100_00, PaymentMethod::Cash),
        (250_00, PaymentMethod::Card),
        (400_00, PaymentMethod::Card),
    ] {
        payments::record_payment(
            &repo,
            NewPayment {
                student_id: student.id,
                amount_cents: amount,
                method,
                kind: PaymentKind::Tuition,
            },
        )
        .await
        .unwrap();
    }

    let filter = PaymentFilter {
        method: Some(PaymentMethod::Card),
        min_amount_cents: Some(200_00),
        max_amount_cents: Some(300_00),
        ..Default::default()
    };
    let page = payments::search_payments(&repo, &filter, PageParams::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].amount_cents, 250_00);
}
