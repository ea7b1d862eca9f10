//! Shared fixtures for integration tests.
#![allow(dead_code)]

use chrono::NaiveDate;

use sams_rust::api::{ClassOfferingId, Gender, NewClassOffering, NewParent, NewStudent};
use sams_rust::db::repository::GuardianRef;
use sams_rust::db::{FullRepository, LocalRepository};
use sams_rust::models::student::Student;
use sams_rust::services;

pub fn repo() -> LocalRepository {
    LocalRepository::new()
}

pub fn parent_data(last_name: &str) -> NewParent {
    NewParent {
        first_name: "Alex".to_string(),
        last_name: last_name.to_string(),
        phone: "555-0100".to_string(),
        email: Some(format!("{}@example.com", last_name.to_lowercase())),
    }
}

pub fn student_data(first: &str, last: &str, class_id: Option<ClassOfferingId>) -> NewStudent {
    NewStudent {
        first_name: first.to_string(),
        last_name: last.to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(2016, 9, 1).unwrap(),
        gender: Gender::Other,
        academic_year: "2026-2027".to_string(),
        class_offering_id: class_id,
    }
}

pub async fn seed_class<R: FullRepository + ?Sized>(
    repo: &R,
    name: &str,
    capacity: i32,
) -> ClassOfferingId {
    let offering = services::enrollment::create_class(
        repo,
        NewClassOffering {
            name: name.to_string(),
            capacity,
            academic_year: "2026-2027".to_string(),
            level: "CM1".to_string(),
            time_slot: "morning".to_string(),
        },
    )
    .await
    .expect("seed class");
    offering.id
}

/// Register one Pending student with a fresh guardian.
pub async fn register_pending<R: FullRepository + ?Sized>(
    repo: &R,
    last_name: &str,
    class_id: ClassOfferingId,
) -> Student {
    services::enrollment::register(
        repo,
        GuardianRef::New(parent_data(last_name)),
        student_data("Sam", last_name, Some(class_id)),
    )
    .await
    .expect("register pending student")
}
