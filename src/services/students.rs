//! Student lookup, search, and flags.

use log::info;

use crate::api::{FlagId, PageParams, StudentId};
use crate::db::repository::{FullRepository, RepositoryError, RepositoryResult};
use crate::models::page::Page;
use crate::models::student::{Student, StudentFilter, StudentFlag, StudentSort};

pub async fn get_student<R: FullRepository + ?Sized>(
    repo: &R,
    student_id: StudentId,
) -> RepositoryResult<Student> {
    repo.get_student(student_id).await
}

/// Paginated student search. Filters are ANDed; free text matches names
/// case-insensitively.
pub async fn search_students<R: FullRepository + ?Sized>(
    repo: &R,
    filter: &StudentFilter,
    sort: StudentSort,
    page: PageParams,
) -> RepositoryResult<Page<Student>> {
    repo.search_students(filter, sort, page).await
}

/// Attach an active flag to a student.
pub async fn flag_student<R: FullRepository + ?Sized>(
    repo: &R,
    student_id: StudentId,
    reason: &str,
) -> RepositoryResult<StudentFlag> {
    if reason.trim().is_empty() {
        return Err(RepositoryError::validation("Flag reason is required"));
    }
    let flag = repo.insert_flag(student_id, reason.to_string()).await?;
    info!("Flagged student {}: {}", student_id, reason);
    Ok(flag)
}

/// Resolve an active flag.
pub async fn resolve_flag<R: FullRepository + ?Sized>(
    repo: &R,
    flag_id: FlagId,
) -> RepositoryResult<StudentFlag> {
    let flag = repo.resolve_flag(flag_id).await?;
    info!("Resolved flag {} on student {}", flag_id, flag.student_id);
    Ok(flag)
}

pub async fn list_flags<R: FullRepository + ?Sized>(
    repo: &R,
    student_id: StudentId,
) -> RepositoryResult<Vec<StudentFlag>> {
    repo.get_student(student_id).await?;
    repo.list_flags(student_id).await
}
