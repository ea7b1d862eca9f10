//! Student, guardian and registration types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::{ClassOfferingId, FlagId, ParentId, StudentId};

/// Registration lifecycle state for a student.
///
/// Only `Confirmed` students occupy a seat in their class offering. `Pending`
/// registrations form an unbounded waiting pool and are capacity-checked only
/// at confirmation time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl RegistrationStatus {
    /// Canonical lowercase name, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown registration status: {}", s)),
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
            Self::Other => "other",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "female" => Ok(Self::Female),
            "male" => Ok(Self::Male),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown gender: {}", s)),
        }
    }
}

/// A student record.
///
/// References exactly one guardian and at most one class offering. The
/// guardian and the offering are referenced, not owned: deleting a student
/// never deletes either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    /// Academic year tag, e.g. "2026-2027".
    pub academic_year: String,
    pub parent_id: ParentId,
    pub class_offering_id: Option<ClassOfferingId>,
    pub registration_status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
}

/// Data for creating a student. The registration workflow always creates
/// students in `Pending` status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub academic_year: String,
    pub class_offering_id: Option<ClassOfferingId>,
}

/// A guardian contact record. Cannot be deleted while it owns any student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parent {
    pub id: ParentId,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParent {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A mutable annotation on a student (e.g. a payment issue). Many flags may
/// exist per student; only a subset is active at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentFlag {
    pub id: FlagId,
    pub student_id: StudentId,
    pub reason: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Optional filters for student list queries, ANDed together.
///
/// `q` matches case-insensitively against first and last name. Callers cannot
/// compose arbitrary boolean expressions; only these predefined fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentFilter {
    pub q: Option<String>,
    pub status: Option<RegistrationStatus>,
    pub academic_year: Option<String>,
    pub class_offering_id: Option<ClassOfferingId>,
    pub parent_id: Option<ParentId>,
}

impl StudentFilter {
    /// True when the student matches every set filter field.
    pub fn matches(&self, student: &Student) -> bool {
        if let Some(q) = &self.q {
            let q = q.to_lowercase();
            let hit = student.first_name.to_lowercase().contains(&q)
                || student.last_name.to_lowercase().contains(&q);
            if !hit {
                return false;
            }
        }
        if let Some(status) = self.status {
            if student.registration_status != status {
                return false;
            }
        }
        if let Some(year) = &self.academic_year {
            if &student.academic_year != year {
                return false;
            }
        }
        if let Some(class_id) = self.class_offering_id {
            if student.class_offering_id != Some(class_id) {
                return false;
            }
        }
        if let Some(parent_id) = self.parent_id {
            if student.parent_id != parent_id {
                return false;
            }
        }
        true
    }
}

/// Recognized sort fields for student listings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentSortField {
    LastName,
    FirstName,
    DateOfBirth,
    CreatedAt,
}

/// Sort specification for student listings.
///
/// An unrecognized field name falls back to the default sort instead of
/// erroring; see [`StudentSort::parse`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSort {
    pub field: StudentSortField,
    pub direction: crate::models::page::SortDirection,
}

impl Default for StudentSort {
    fn default() -> Self {
        Self {
            field: StudentSortField::LastName,
            direction: crate::models::page::SortDirection::Asc,
        }
    }
}

impl StudentSort {
    /// Build a sort specification from raw query parameters.
    ///
    /// Unrecognized field names silently fall back to the default field, and
    /// unrecognized directions to ascending.
    pub fn parse(field: Option<&str>, direction: Option<&str>) -> Self {
        let field = match field {
            Some("last_name") => StudentSortField::LastName,
            Some("first_name") => StudentSortField::FirstName,
            Some("date_of_birth") => StudentSortField::DateOfBirth,
            Some("created_at") => StudentSortField::CreatedAt,
            _ => StudentSortField::LastName,
        };
        let direction = match direction {
            Some("desc") => crate::models::page::SortDirection::Desc,
            _ => crate::models::page::SortDirection::Asc,
        };
        Self { field, direction }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_status_round_trip() {
        for status in [
            RegistrationStatus::Pending,
            RegistrationStatus::Confirmed,
            RegistrationStatus::Cancelled,
        ] {
            assert_eq!(
                status.as_str().parse::<RegistrationStatus>().unwrap(),
                status
            );
        }
        assert!("enrolled".parse::<RegistrationStatus>().is_err());
    }

    #[test]
    fn test_sort_parse_falls_back_on_unknown_field() {
        let sort = StudentSort::parse(Some("shoe_size"), Some("desc"));
        assert_eq!(sort.field, StudentSortField::LastName);
        assert_eq!(sort.direction, crate::models::page::SortDirection::Desc);

        let sort = StudentSort::parse(Some("date_of_birth"), None);
        assert_eq!(sort.field, StudentSortField::DateOfBirth);
        assert_eq!(sort.direction, crate::models::page::SortDirection::Asc);
    }

    #[test]
    fn test_filter_free_text_is_case_insensitive() {
        let student = Student {
            id: StudentId::new(1),
            first_name: "Amina".to_string(),
            last_name: "Haddad".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2015, 4, 2).unwrap(),
            gender: Gender::Female,
            academic_year: "2026-2027".to_string(),
            parent_id: ParentId::new(1),
            class_offering_id: None,
            registration_status: RegistrationStatus::Pending,
            created_at: Utc::now(),
        };

        let filter = StudentFilter {
            q: Some("hadd".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&student));

        let filter = StudentFilter {
            q: Some("AMINA".to_string()),
            status: Some(RegistrationStatus::Confirmed),
            ..Default::default()
        };
        assert!(!filter.matches(&student));
    }
}
