//! Attendance and grade repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::StudentId;
use crate::models::records::{AttendanceRecord, Grade, NewAttendanceRecord, NewGrade};

/// Repository trait for attendance and grade records.
#[async_trait]
pub trait RecordsRepository: Send + Sync {
    /// Record one attendance entry for a student.
    ///
    /// # Errors
    /// * `NotFound` - the student doesn't exist
    async fn insert_attendance(
        &self,
        student_id: StudentId,
        new: NewAttendanceRecord,
    ) -> RepositoryResult<AttendanceRecord>;

    /// All attendance entries for a student, most recent date first.
    async fn list_attendance(
        &self,
        student_id: StudentId,
    ) -> RepositoryResult<Vec<AttendanceRecord>>;

    /// Record one grade for a student.
    ///
    /// # Errors
    /// * `NotFound` - the student doesn't exist
    async fn insert_grade(&self, student_id: StudentId, new: NewGrade) -> RepositoryResult<Grade>;

    /// All grades for a student, newest first.
    async fn list_grades(&self, student_id: StudentId) -> RepositoryResult<Vec<Grade>>;
}
