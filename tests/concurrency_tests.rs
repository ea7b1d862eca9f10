//! Capacity invariant under concurrent confirmations.
//!
//! The confirm transition must be atomic with its capacity check: when N
//! registrations race for K free seats, exactly K may win.

mod support;

use sams_rust::db::repository::{ClassRepository, RepositoryError};
use sams_rust::services::enrollment;
use support::*;

#[tokio::test]
async fn test_concurrent_confirms_never_overbook() {
    const CAPACITY: i32 = 3;
    const RACERS: usize = 10;

    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", CAPACITY).await;

    let mut student_ids = Vec::new();
    for i in 0..RACERS {
        let student = register_pending(&repo, &format!("Racer{}", i), class_id).await;
        student_ids.push(student.id);
    }

    let mut handles = Vec::new();
    for student_id in student_ids {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            enrollment::confirm(&repo, student_id).await
        }));
    }

    let mut confirmed = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => confirmed += 1,
            Err(RepositoryError::Conflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error under contention: {:?}", other),
        }
    }

    assert_eq!(confirmed, CAPACITY as usize);
    assert_eq!(conflicts, RACERS - CAPACITY as usize);
    assert_eq!(repo.confirmed_count(class_id).await.unwrap(), i64::from(CAPACITY));
}

#[tokio::test]
async fn test_race_for_single_last_seat() {
    // capacity + 1 racers for a class with one seat left.
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 2).await;

    let warm = register_pending(&repo, "Warm", class_id).await;
    enrollment::confirm(&repo, warm.id).await.unwrap();

    let a = register_pending(&repo, "A", class_id).await;
    let b = register_pending(&repo, "B", class_id).await;

    let (ra, rb) = tokio::join!(
        {
            let repo = repo.clone();
            async move { enrollment::confirm(&repo, a.id).await }
        },
        {
            let repo = repo.clone();
            async move { enrollment::confirm(&repo, b.id).await }
        }
    );

    // Exactly one of the two may claim the final seat.
    assert_eq!(
        ra.is_ok() as u8 + rb.is_ok() as u8,
        1,
        "exactly one racer must win the last seat"
    );
    assert_eq!(repo.confirmed_count(class_id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_confirm_and_capacity_reduction_stay_consistent() {
    let repo = repo();
    let class_id = seed_class(&repo, "CM1-A", 2).await;

    let s1 = register_pending(&repo, "One", class_id).await;
    let s2 = register_pending(&repo, "Two", class_id).await;
    enrollment::confirm(&repo, s1.id).await.unwrap();

    let (confirm_result, reduce_result) = tokio::join!(
        {
            let repo = repo.clone();
            async move { enrollment::confirm(&repo, s2.id).await }
        },
        {
            let repo = repo.clone();
            async move { enrollment::update_capacity(&repo, class_id, 1).await }
        }
    );

    // Whatever the interleaving, the invariant holds afterwards: confirmed
    // occupancy never exceeds the final capacity.
    let confirmed = repo.confirmed_count(class_id).await.unwrap();
    let capacity = i64::from(repo.get_class(class_id).await.unwrap().capacity);
    assert!(
        confirmed <= capacity,
        "confirmed={} capacity={} (confirm={:?} reduce={:?})",
        confirmed,
        capacity,
        confirm_result.map(|s| s.id),
        reduce_result.map(|c| c.capacity),
    );
}
