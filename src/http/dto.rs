//! Data Transfer Objects for the HTTP API.
//!
//! Domain entities already derive Serialize/Deserialize and are returned
//! directly; the types here are request bodies and query-parameter bags that
//! have no domain counterpart.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// Re-export the shared response types.
pub use crate::api::{
    AttendanceRecord, AvailableClass, ClassOffering, Grade, Page, Parent, Payment, Student,
    StudentFlag, User,
};
use crate::api::{ClassOfferingId, ParentId, StudentId};
use crate::models::payment::{PaymentKind, PaymentMethod};
use crate::models::student::{Gender, NewParent};
use crate::models::user::Role;

/// Request body for `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response for a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Request body for `POST /register`.
///
/// The guardian is either referenced (`parent_id`) or created inline
/// (`parent`); exactly one must be supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub academic_year: String,
    pub class_offering_id: ClassOfferingId,
    #[serde(default)]
    pub parent_id: Option<ParentId>,
    #[serde(default)]
    pub parent: Option<NewParent>,
}

/// Query parameters for `GET /students`.
///
/// `sort`/`order` accept field names and `asc`/`desc`; unrecognized values
/// fall back to the default sort rather than erroring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub class_offering_id: Option<i64>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
}

/// Query parameters for `GET /classes` and `GET /classes/available`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassQuery {
    #[serde(default)]
    pub academic_year: Option<String>,
}

/// Request body for `POST /classes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClassRequest {
    pub name: String,
    pub capacity: i32,
    pub academic_year: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub time_slot: String,
}

/// Request body for `PUT /classes/{id}/capacity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCapacityRequest {
    pub capacity: i32,
}

/// Request body for `POST /payments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub student_id: StudentId,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub kind: PaymentKind,
}

/// Query parameters for `GET /payments`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentQuery {
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub min_amount_cents: Option<i64>,
    #[serde(default)]
    pub max_amount_cents: Option<i64>,
    #[serde(default)]
    pub recorded_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recorded_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub size: Option<u32>,
}

/// Request body for `POST /students/{id}/flags`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagRequest {
    pub reason: String,
}

/// Request body for `POST /users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// Request body for `PUT /users/{id}/active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetUserActiveRequest {
    pub active: bool,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Generic acknowledgement body for deletes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
