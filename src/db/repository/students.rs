//! Student repository trait: registration workflow, search, and flags.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::RepositoryResult;
use crate::api::{FlagId, NewParent, NewStudent, PageParams, ParentId, StudentId};
use crate::models::page::Page;
use crate::models::student::{Student, StudentFilter, StudentFlag, StudentSort};

/// How a registration refers to the student's guardian.
///
/// An existing guardian is referenced by id (must exist); otherwise the
/// supplied data creates a new record inside the same transaction as the
/// student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GuardianRef {
    Existing(ParentId),
    New(NewParent),
}

/// Repository trait for student records and the registration state machine.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// Check if the database connection is healthy.
    ///
    /// # Returns
    /// - `Ok(true)` if connection is healthy
    /// - `Ok(false)` if connection is unhealthy but no error occurred
    /// - `Err(RepositoryError)` if an error occurred during the check
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Create a Pending registration: the guardian (new or referenced) and
    /// the student, atomically.
    ///
    /// Capacity is NOT checked here; Pending registrations may outnumber
    /// seats. The referenced class offering must exist.
    ///
    /// # Errors
    /// * `NotFound` - referenced guardian or class offering does not exist
    async fn create_registration(
        &self,
        guardian: GuardianRef,
        student: NewStudent,
    ) -> RepositoryResult<Student>;

    /// Retrieve a student by ID.
    ///
    /// # Errors
    /// * `NotFound` - if the student doesn't exist
    async fn get_student(&self, student_id: StudentId) -> RepositoryResult<Student>;

    /// Search students with the given filter, sort and pagination.
    ///
    /// Filters are ANDed; free text matches name fields case-insensitively.
    async fn search_students(
        &self,
        filter: &StudentFilter,
        sort: StudentSort,
        page: PageParams,
    ) -> RepositoryResult<Page<Student>>;

    /// Transition a Pending student to Confirmed, atomically guarded by the
    /// offering's capacity: the transition succeeds only if confirmed
    /// occupancy stays <= capacity. Under concurrent calls racing for the
    /// last seats, at most `capacity` students end up Confirmed.
    ///
    /// # Errors
    /// * `NotFound` - student does not exist
    /// * `Conflict` - already confirmed; cancelled; no class assigned; or
    ///   the class is full
    async fn confirm_student(&self, student_id: StudentId) -> RepositoryResult<Student>;

    /// Transition a Pending or Confirmed student to Cancelled. A cancelled
    /// confirmation frees its seat on the next occupancy computation.
    ///
    /// # Errors
    /// * `NotFound` - student does not exist
    /// * `Conflict` - already cancelled
    async fn cancel_student(&self, student_id: StudentId) -> RepositoryResult<Student>;

    /// Destructively remove a student and cascade-delete its payments,
    /// flags, attendance and grade records. Irreversible.
    ///
    /// # Errors
    /// * `NotFound` - student does not exist
    async fn expel_student(&self, student_id: StudentId) -> RepositoryResult<()>;

    // ==================== Flags ====================

    /// Attach an active flag to a student.
    async fn insert_flag(
        &self,
        student_id: StudentId,
        reason: String,
    ) -> RepositoryResult<StudentFlag>;

    /// Mark a flag resolved, recording the resolution timestamp.
    ///
    /// # Errors
    /// * `NotFound` - flag does not exist
    /// * `Conflict` - flag is already resolved
    async fn resolve_flag(&self, flag_id: FlagId) -> RepositoryResult<StudentFlag>;

    /// List all flags for a student, newest first.
    async fn list_flags(&self, student_id: StudentId) -> RepositoryResult<Vec<StudentFlag>>;
}
