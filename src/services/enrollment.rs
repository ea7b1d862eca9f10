//! Enrollment workflow: registration state machine and class capacity.
//!
//! Registration policy: capacity is enforced only at confirmation. Pending
//! registrations form an unbounded waiting pool, and the seat for the last
//! spot goes to whichever confirm call lands first. Cancelling a confirmed
//! registration frees its seat on the next occupancy computation; nobody is
//! promoted automatically.

use log::{info, warn};

use crate::api::{ClassOfferingId, StudentId};
use crate::db::repository::{FullRepository, GuardianRef, RepositoryError, RepositoryResult};
use crate::models::class::{AvailableClass, ClassOffering, NewClassOffering};
use crate::models::student::{NewStudent, Student};

/// Create a Pending registration for a student and its guardian.
///
/// The guardian is either referenced by id (must exist) or created from the
/// supplied data, atomically with the student. Capacity is deliberately NOT
/// checked here.
///
/// # Errors
/// * `Validation` - missing names, academic year, or class assignment
/// * `NotFound` - referenced guardian or class offering does not exist
pub async fn register<R: FullRepository + ?Sized>(
    repo: &R,
    guardian: GuardianRef,
    student: NewStudent,
) -> RepositoryResult<Student> {
    if student.first_name.trim().is_empty() || student.last_name.trim().is_empty() {
        return Err(RepositoryError::validation(
            "Student first and last name are required",
        ));
    }
    if student.academic_year.trim().is_empty() {
        return Err(RepositoryError::validation("Academic year is required"));
    }
    if student.class_offering_id.is_none() {
        return Err(RepositoryError::validation(
            "A class offering is required at registration",
        ));
    }
    if let GuardianRef::New(parent) = &guardian {
        if parent.first_name.trim().is_empty() || parent.last_name.trim().is_empty() {
            return Err(RepositoryError::validation(
                "Guardian first and last name are required",
            ));
        }
    }

    let student = repo.create_registration(guardian, student).await?;
    info!(
        "Registered student {} ({} {}) as pending for class {:?}",
        student.id, student.first_name, student.last_name, student.class_offering_id
    );
    Ok(student)
}

/// Confirm a Pending registration, bounded by the offering's capacity.
///
/// The capacity check and status transition are one atomic step in the
/// repository; under concurrent confirms for the last seat, exactly one
/// succeeds and the rest get `Conflict`.
pub async fn confirm<R: FullRepository + ?Sized>(
    repo: &R,
    student_id: StudentId,
) -> RepositoryResult<Student> {
    let student = repo.confirm_student(student_id).await?;
    info!("Confirmed registration for student {}", student_id);
    Ok(student)
}

/// Cancel a registration. A confirmed seat is freed implicitly.
pub async fn cancel<R: FullRepository + ?Sized>(
    repo: &R,
    student_id: StudentId,
) -> RepositoryResult<Student> {
    let student = repo.cancel_student(student_id).await?;
    info!("Cancelled registration for student {}", student_id);
    Ok(student)
}

/// Destructively remove a student and all dependent records.
///
/// Irreversible by design; the only audit trail is this process log line.
pub async fn expel<R: FullRepository + ?Sized>(repo: &R, student_id: StudentId) -> RepositoryResult<()> {
    // Load first so the log line can identify who was removed.
    let student = repo.get_student(student_id).await?;
    repo.expel_student(student_id).await?;
    warn!(
        "Expelled student {} ({} {}); payments, flags and records cascade-deleted",
        student_id, student.first_name, student.last_name
    );
    Ok(())
}

/// Offerings of the given year that still have seats available.
///
/// `available_spots = capacity - confirmed_count`, recomputed on every call.
/// Full offerings are excluded from the result, not mutated.
pub async fn available_classes<R: FullRepository + ?Sized>(
    repo: &R,
    academic_year: &str,
) -> RepositoryResult<Vec<AvailableClass>> {
    if academic_year.trim().is_empty() {
        return Err(RepositoryError::validation("Academic year is required"));
    }

    let occupancies = repo.class_occupancies(academic_year).await?;
    Ok(occupancies
        .into_iter()
        .filter(|o| o.available_spots() > 0)
        .map(|o| {
            let available_spots = o.available_spots();
            AvailableClass {
                offering: o.offering,
                available_spots,
            }
        })
        .collect())
}

/// Create a class offering.
///
/// # Errors
/// * `Validation` - capacity <= 0 or missing name/year
pub async fn create_class<R: FullRepository + ?Sized>(
    repo: &R,
    new: NewClassOffering,
) -> RepositoryResult<ClassOffering> {
    if new.capacity <= 0 {
        return Err(RepositoryError::validation("Capacity must be positive"));
    }
    if new.name.trim().is_empty() || new.academic_year.trim().is_empty() {
        return Err(RepositoryError::validation(
            "Class name and academic year are required",
        ));
    }
    repo.insert_class(new).await
}

/// Change an offering's capacity.
///
/// Rejected when the new capacity is below the current confirmed occupancy;
/// the check and the write are one atomic step in the repository.
pub async fn update_capacity<R: FullRepository + ?Sized>(
    repo: &R,
    class_id: ClassOfferingId,
    new_capacity: i32,
) -> RepositoryResult<ClassOffering> {
    if new_capacity <= 0 {
        return Err(RepositoryError::validation("Capacity must be positive"));
    }
    let offering = repo.update_capacity(class_id, new_capacity).await?;
    info!("Capacity of class {} set to {}", class_id, new_capacity);
    Ok(offering)
}

/// Delete an offering. Blocked while any student references it.
pub async fn delete_class<R: FullRepository + ?Sized>(
    repo: &R,
    class_id: ClassOfferingId,
) -> RepositoryResult<()> {
    repo.delete_class(class_id).await?;
    info!("Deleted class offering {}", class_id);
    Ok(())
}
