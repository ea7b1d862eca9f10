//! Repository trait definitions for database operations.
//!
//! Responsibilities are split across focused traits so implementations stay
//! testable and callers can depend on only what they use:
//!
//! - [`error`]: Error types for repository operations
//! - [`students`]: Registration workflow and student records
//! - [`classes`]: Class offerings and derived occupancy
//! - [`parents`]: Guardian records
//! - [`payments`]: Payments and receipts
//! - [`records`]: Attendance and grades
//! - [`users`]: User accounts
//!
//! For functions that need every capability, use the [`FullRepository`]
//! trait bound; it is implemented automatically for any type implementing
//! all of the above.

pub mod classes;
pub mod error;
pub mod parents;
pub mod payments;
pub mod records;
pub mod students;
pub mod users;

// Re-export error types
pub use error::{ErrorContext, RepositoryError, RepositoryResult};

// Re-export all traits
pub use classes::ClassRepository;
pub use parents::ParentRepository;
pub use payments::PaymentRepository;
pub use records::RecordsRepository;
pub use students::{GuardianRef, StudentRepository};
pub use users::UserRepository;

/// Composite trait bound for a complete repository implementation.
///
/// # Example
///
/// ```ignore
/// async fn register<R: FullRepository>(repo: &R, req: RegisterRequest) -> RepositoryResult<Student> {
///     // Can use any repository method
/// }
/// ```
pub trait FullRepository:
    StudentRepository
    + ClassRepository
    + ParentRepository
    + PaymentRepository
    + RecordsRepository
    + UserRepository
{
}

impl<T> FullRepository for T where
    T: StudentRepository
        + ClassRepository
        + ParentRepository
        + PaymentRepository
        + RecordsRepository
        + UserRepository
{
}
