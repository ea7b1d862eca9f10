//! Guardian repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::ParentId;
use crate::models::student::{NewParent, Parent};

/// Repository trait for guardian contact records.
#[async_trait]
pub trait ParentRepository: Send + Sync {
    /// Store a new guardian record.
    async fn insert_parent(&self, new: NewParent) -> RepositoryResult<Parent>;

    /// Retrieve a guardian by ID.
    ///
    /// # Errors
    /// * `NotFound` - if the guardian doesn't exist
    async fn get_parent(&self, parent_id: ParentId) -> RepositoryResult<Parent>;

    /// Delete a guardian. Blocked while it owns any student.
    ///
    /// # Errors
    /// * `NotFound` - if the guardian doesn't exist
    /// * `Conflict` - the guardian still owns students
    async fn delete_parent(&self, parent_id: ParentId) -> RepositoryResult<()>;
}
