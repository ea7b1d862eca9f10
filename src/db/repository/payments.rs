//! Payment repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{PageParams, StudentId};
use crate::models::page::Page;
use crate::models::payment::{NewPayment, Payment, PaymentFilter};

/// Repository trait for payment records.
///
/// Receipt numbers are minted by the service layer and passed in; the
/// repository enforces their uniqueness.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Persist a payment with its pre-minted receipt number.
    ///
    /// # Errors
    /// * `NotFound` - the student doesn't exist
    /// * `Conflict` - the receipt number is already taken
    async fn insert_payment(
        &self,
        new: NewPayment,
        receipt_number: String,
    ) -> RepositoryResult<Payment>;

    /// All payments for one student, oldest first.
    async fn payments_for_student(&self, student_id: StudentId)
        -> RepositoryResult<Vec<Payment>>;

    /// Search payments with the given filter and pagination, newest first.
    async fn search_payments(
        &self,
        filter: &PaymentFilter,
        page: PageParams,
    ) -> RepositoryResult<Page<Payment>>;
}
