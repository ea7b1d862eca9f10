//! Diesel row models and conversions to the domain types.
//!
//! Enumerated columns are stored as lowercase text and parsed on read; a
//! value that fails to parse is reported as an internal error rather than
//! silently coerced.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;

use super::schema::{
    attendance_records, class_offerings, grades, parents, payments, student_flags, students, users,
};
use crate::api::{
    AttendanceId, ClassOfferingId, FlagId, GradeId, ParentId, PaymentId, StudentId, UserId,
};
use crate::db::repository::{RepositoryError, RepositoryResult};
use crate::models::class::ClassOffering;
use crate::models::payment::Payment;
use crate::models::records::{AttendanceRecord, Grade};
use crate::models::student::{Parent, Student, StudentFlag};
use crate::models::user::User;

fn parse_enum<T: std::str::FromStr<Err = String>>(raw: &str, column: &str) -> RepositoryResult<T> {
    raw.parse().map_err(|e: String| {
        RepositoryError::internal(format!("Corrupt {} column: {}", column, e))
    })
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = parents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ParentRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
}

impl From<ParentRow> for Parent {
    fn from(row: ParentRow) -> Self {
        Parent {
            id: ParentId::new(row.id),
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            email: row.email,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = parents)]
pub struct NewParentRow {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = class_offerings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ClassOfferingRow {
    pub id: i64,
    pub name: String,
    pub capacity: i32,
    pub academic_year: String,
    pub level: String,
    pub time_slot: String,
}

impl From<ClassOfferingRow> for ClassOffering {
    fn from(row: ClassOfferingRow) -> Self {
        ClassOffering {
            id: ClassOfferingId::new(row.id),
            name: row.name,
            capacity: row.capacity,
            academic_year: row.academic_year,
            level: row.level,
            time_slot: row.time_slot,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = class_offerings)]
pub struct NewClassOfferingRow {
    pub name: String,
    pub capacity: i32,
    pub academic_year: String,
    pub level: String,
    pub time_slot: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StudentRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub academic_year: String,
    pub parent_id: i64,
    pub class_offering_id: Option<i64>,
    pub registration_status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<StudentRow> for Student {
    type Error = RepositoryError;

    fn try_from(row: StudentRow) -> RepositoryResult<Self> {
        Ok(Student {
            id: StudentId::new(row.id),
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: row.date_of_birth,
            gender: parse_enum(&row.gender, "gender")?,
            academic_year: row.academic_year,
            parent_id: ParentId::new(row.parent_id),
            class_offering_id: row.class_offering_id.map(ClassOfferingId::new),
            registration_status: parse_enum(&row.registration_status, "registration_status")?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = students)]
pub struct NewStudentRow {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub academic_year: String,
    pub parent_id: i64,
    pub class_offering_id: Option<i64>,
    pub registration_status: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentRow {
    pub id: i64,
    pub student_id: i64,
    pub amount_cents: i64,
    pub method: String,
    pub kind: String,
    pub receipt_number: String,
    pub recorded_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = RepositoryError;

    fn try_from(row: PaymentRow) -> RepositoryResult<Self> {
        Ok(Payment {
            id: PaymentId::new(row.id),
            student_id: StudentId::new(row.student_id),
            amount_cents: row.amount_cents,
            method: parse_enum(&row.method, "method")?,
            kind: parse_enum(&row.kind, "kind")?,
            receipt_number: row.receipt_number,
            recorded_at: row.recorded_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPaymentRow {
    pub student_id: i64,
    pub amount_cents: i64,
    pub method: String,
    pub kind: String,
    pub receipt_number: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = student_flags)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StudentFlagRow {
    pub id: i64,
    pub student_id: i64,
    pub reason: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<StudentFlagRow> for StudentFlag {
    fn from(row: StudentFlagRow) -> Self {
        StudentFlag {
            id: FlagId::new(row.id),
            student_id: StudentId::new(row.student_id),
            reason: row.reason,
            active: row.active,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = attendance_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AttendanceRow {
    pub id: i64,
    pub student_id: i64,
    pub date: NaiveDate,
    pub status: String,
    pub note: Option<String>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = RepositoryError;

    fn try_from(row: AttendanceRow) -> RepositoryResult<Self> {
        Ok(AttendanceRecord {
            id: AttendanceId::new(row.id),
            student_id: StudentId::new(row.student_id),
            date: row.date,
            status: parse_enum(&row.status, "status")?,
            note: row.note,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = attendance_records)]
pub struct NewAttendanceRow {
    pub student_id: i64,
    pub date: NaiveDate,
    pub status: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = grades)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GradeRow {
    pub id: i64,
    pub student_id: i64,
    pub subject: String,
    pub term: String,
    pub score: f64,
    pub recorded_at: DateTime<Utc>,
}

impl From<GradeRow> for Grade {
    fn from(row: GradeRow) -> Self {
        Grade {
            id: GradeId::new(row.id),
            student_id: StudentId::new(row.student_id),
            subject: row.subject,
            term: row.term,
            score: row.score,
            recorded_at: row.recorded_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = grades)]
pub struct NewGradeRow {
    pub student_id: i64,
    pub subject: String,
    pub term: String,
    pub score: f64,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_digest: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> RepositoryResult<Self> {
        Ok(User {
            id: UserId::new(row.id),
            username: row.username,
            password_digest: row.password_digest,
            role: parse_enum(&row.role, "role")?,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUserRow {
    pub username: String,
    pub password_digest: String,
    pub role: String,
}
