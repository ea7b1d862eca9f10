//! Public API surface for the Rust backend.
//!
//! This file consolidates the identifier newtypes and shared types exposed
//! through the HTTP API and the repository traits. All types derive
//! Serialize/Deserialize for JSON serialization.

use serde::{Deserialize, Serialize};

pub use crate::models::class::{AvailableClass, ClassOccupancy, ClassOffering, NewClassOffering};
pub use crate::models::page::{Page, PageParams, SortDirection};
pub use crate::models::payment::{NewPayment, Payment, PaymentFilter, PaymentKind, PaymentMethod};
pub use crate::models::records::{
    AttendanceRecord, AttendanceStatus, Grade, NewAttendanceRecord, NewGrade,
};
pub use crate::models::student::{
    Gender, NewParent, NewStudent, Parent, RegistrationStatus, Student, StudentFilter, StudentFlag,
    StudentSort, StudentSortField,
};
pub use crate::models::user::{NewUser, Role, User};

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(value: i64) -> Self {
                $name(value)
            }

            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

id_newtype!(
    /// Student identifier (database primary key).
    StudentId
);
id_newtype!(
    /// Parent/guardian identifier.
    ParentId
);
id_newtype!(
    /// Class offering identifier.
    ClassOfferingId
);
id_newtype!(
    /// Payment identifier.
    PaymentId
);
id_newtype!(
    /// Student flag identifier.
    FlagId
);
id_newtype!(
    /// Attendance record identifier.
    AttendanceId
);
id_newtype!(
    /// Grade identifier.
    GradeId
);
id_newtype!(
    /// User account identifier.
    UserId
);
