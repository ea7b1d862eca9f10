//! Class offering repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::ClassOfferingId;
use crate::models::class::{ClassOccupancy, ClassOffering, NewClassOffering};

/// Repository trait for class offerings and their derived occupancy.
///
/// Occupancy is always computed by counting Confirmed students; it is never
/// stored, so there is no counter to drift.
#[async_trait]
pub trait ClassRepository: Send + Sync {
    /// Store a new class offering.
    async fn insert_class(&self, new: NewClassOffering) -> RepositoryResult<ClassOffering>;

    /// Retrieve a class offering by ID.
    ///
    /// # Errors
    /// * `NotFound` - if the offering doesn't exist
    async fn get_class(&self, class_id: ClassOfferingId) -> RepositoryResult<ClassOffering>;

    /// List offerings, optionally restricted to one academic year.
    async fn list_classes(
        &self,
        academic_year: Option<&str>,
    ) -> RepositoryResult<Vec<ClassOffering>>;

    /// Every offering of the given year paired with its current
    /// confirmed-occupancy count.
    async fn class_occupancies(&self, academic_year: &str)
        -> RepositoryResult<Vec<ClassOccupancy>>;

    /// Current confirmed-occupancy count for one offering.
    ///
    /// # Errors
    /// * `NotFound` - if the offering doesn't exist
    async fn confirmed_count(&self, class_id: ClassOfferingId) -> RepositoryResult<i64>;

    /// Update capacity in place, atomically guarded: rejects any new
    /// capacity below the current confirmed-occupancy count.
    ///
    /// # Errors
    /// * `NotFound` - if the offering doesn't exist
    /// * `Conflict` - new capacity < confirmed occupancy
    async fn update_capacity(
        &self,
        class_id: ClassOfferingId,
        new_capacity: i32,
    ) -> RepositoryResult<ClassOffering>;

    /// Delete an offering. Blocked while any student, in any registration
    /// status, still references it.
    ///
    /// # Errors
    /// * `NotFound` - if the offering doesn't exist
    /// * `Conflict` - students still reference the offering
    async fn delete_class(&self, class_id: ClassOfferingId) -> RepositoryResult<()>;
}
