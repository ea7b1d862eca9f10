//! Payment recording and receipt minting.

use log::info;
use uuid::Uuid;

use crate::api::{PageParams, StudentId};
use crate::db::repository::{FullRepository, RepositoryError, RepositoryResult};
use crate::models::page::Page;
use crate::models::payment::{NewPayment, Payment, PaymentFilter};

/// Mint a receipt identifier: `RECEIPT-` plus 8 hex characters.
fn mint_receipt_number() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("RECEIPT-{}", &hex[..8])
}

/// Record a payment against a student and mint its receipt.
///
/// The amount is validated before any row is written. There is no
/// idempotency key: a client retry records a second payment with a fresh
/// receipt number.
///
/// # Errors
/// * `Validation` - amount_cents <= 0
/// * `NotFound` - the student doesn't exist
pub async fn record_payment<R: FullRepository + ?Sized>(
    repo: &R,
    new: NewPayment,
) -> RepositoryResult<Payment> {
    if new.amount_cents <= 0 {
        return Err(RepositoryError::validation(
            "Payment amount must be positive",
        ));
    }

    let payment = repo.insert_payment(new, mint_receipt_number()).await?;
    info!(
        "Recorded payment {} of {} cents for student {} (receipt {})",
        payment.id, payment.amount_cents, payment.student_id, payment.receipt_number
    );
    Ok(payment)
}

/// All payments for one student, oldest first.
///
/// # Errors
/// * `NotFound` - the student doesn't exist
pub async fn payments_for_student<R: FullRepository + ?Sized>(
    repo: &R,
    student_id: StudentId,
) -> RepositoryResult<Vec<Payment>> {
    repo.get_student(student_id).await?;
    repo.payments_for_student(student_id).await
}

/// Paginated payment search, newest first.
pub async fn search_payments<R: FullRepository + ?Sized>(
    repo: &R,
    filter: &PaymentFilter,
    page: PageParams,
) -> RepositoryResult<Page<Payment>> {
    repo.search_payments(filter, page).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_number_format() {
        let receipt = mint_receipt_number();
        let suffix = receipt.strip_prefix("RECEIPT-").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_receipt_numbers_are_unlikely_to_collide() {
        let a = mint_receipt_number();
        let b = mint_receipt_number();
        assert_ne!(a, b);
    }
}
