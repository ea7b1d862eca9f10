//! Guardian administration.

use log::info;

use crate::api::ParentId;
use crate::db::repository::{FullRepository, RepositoryError, RepositoryResult};
use crate::models::student::{NewParent, Parent};

pub async fn create_parent<R: FullRepository + ?Sized>(
    repo: &R,
    new: NewParent,
) -> RepositoryResult<Parent> {
    if new.first_name.trim().is_empty() || new.last_name.trim().is_empty() {
        return Err(RepositoryError::validation(
            "Guardian first and last name are required",
        ));
    }
    if new.phone.trim().is_empty() {
        return Err(RepositoryError::validation(
            "Guardian phone number is required",
        ));
    }
    repo.insert_parent(new).await
}

pub async fn get_parent<R: FullRepository + ?Sized>(
    repo: &R,
    parent_id: ParentId,
) -> RepositoryResult<Parent> {
    repo.get_parent(parent_id).await
}

/// Delete a guardian. Blocked while it still owns any student.
pub async fn delete_parent<R: FullRepository + ?Sized>(
    repo: &R,
    parent_id: ParentId,
) -> RepositoryResult<()> {
    repo.delete_parent(parent_id).await?;
    info!("Deleted parent {}", parent_id);
    Ok(())
}
