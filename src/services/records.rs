//! Attendance and grade recording.

use crate::api::StudentId;
use crate::db::repository::{FullRepository, RepositoryError, RepositoryResult};
use crate::models::records::{AttendanceRecord, Grade, NewAttendanceRecord, NewGrade};

pub async fn record_attendance<R: FullRepository + ?Sized>(
    repo: &R,
    student_id: StudentId,
    new: NewAttendanceRecord,
) -> RepositoryResult<AttendanceRecord> {
    repo.insert_attendance(student_id, new).await
}

pub async fn list_attendance<R: FullRepository + ?Sized>(
    repo: &R,
    student_id: StudentId,
) -> RepositoryResult<Vec<AttendanceRecord>> {
    repo.get_student(student_id).await?;
    repo.list_attendance(student_id).await
}

/// Record a grade. Scores are on a 0-100 scale.
pub async fn record_grade<R: FullRepository + ?Sized>(
    repo: &R,
    student_id: StudentId,
    new: NewGrade,
) -> RepositoryResult<Grade> {
    if !(0.0..=100.0).contains(&new.score) {
        return Err(RepositoryError::validation(
            "Score must be between 0 and 100",
        ));
    }
    if new.subject.trim().is_empty() {
        return Err(RepositoryError::validation("Subject is required"));
    }
    repo.insert_grade(student_id, new).await
}

pub async fn list_grades<R: FullRepository + ?Sized>(
    repo: &R,
    student_id: StudentId,
) -> RepositoryResult<Vec<Grade>> {
    repo.get_student(student_id).await?;
    repo.list_grades(student_id).await
}
