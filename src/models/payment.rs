//! Payment types.
//!
//! Monetary amounts are integral cents. Earlier iterations of this system
//! stored floats; integer cents keep amount comparisons and range filters
//! exact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::{PaymentId, StudentId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Check,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Transfer => "transfer",
            Self::Check => "check",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            "transfer" => Ok(Self::Transfer),
            "check" => Ok(Self::Check),
            _ => Err(format!("Unknown payment method: {}", s)),
        }
    }
}

/// What the payment is for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    /// One-time registration fee.
    Registration,
    /// Periodic tuition payment.
    Tuition,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Tuition => "tuition",
        }
    }
}

impl FromStr for PaymentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "registration" => Ok(Self::Registration),
            "tuition" => Ok(Self::Tuition),
            _ => Err(format!("Unknown payment kind: {}", s)),
        }
    }
}

/// A monetary transaction tied to exactly one student.
///
/// The receipt number is minted at creation and unique across all payments.
/// There is no idempotency key: a retried call creates a second payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub student_id: StudentId,
    /// Amount in cents; always > 0.
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub kind: PaymentKind,
    /// Unique human-readable receipt identifier, `RECEIPT-<8 hex chars>`.
    pub receipt_number: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub student_id: StudentId,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub kind: PaymentKind,
}

/// Optional filters for payment list queries, ANDed together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentFilter {
    pub student_id: Option<StudentId>,
    pub method: Option<PaymentMethod>,
    pub kind: Option<PaymentKind>,
    pub min_amount_cents: Option<i64>,
    pub max_amount_cents: Option<i64>,
    pub recorded_from: Option<DateTime<Utc>>,
    pub recorded_to: Option<DateTime<Utc>>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        if let Some(student_id) = self.student_id {
            if payment.student_id != student_id {
                return false;
            }
        }
        if let Some(method) = self.method {
            if payment.method != method {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if payment.kind != kind {
                return false;
            }
        }
        if let Some(min) = self.min_amount_cents {
            if payment.amount_cents < min {
                return false;
            }
        }
        if let Some(max) = self.max_amount_cents {
            if payment.amount_cents > max {
                return false;
            }
        }
        if let Some(from) = self.recorded_from {
            if payment.recorded_at < from {
                return false;
            }
        }
        if let Some(to) = self.recorded_to {
            if payment.recorded_at > to {
                return false;
            }
        }
        true
    }
}
