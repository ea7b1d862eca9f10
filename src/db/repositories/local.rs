//! In-memory local repository implementation.
//!
//! Implements every repository trait over in-memory maps, providing fast,
//! deterministic, isolated execution for unit tests and local development.
//!
//! All mutating workflows take one exclusive write lock for their entire
//! read-check-write sequence, so the capacity-guarded confirm is atomic here
//! for the same external contract the Postgres backend provides with a
//! conditional UPDATE.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::{
    AttendanceId, ClassOfferingId, FlagId, GradeId, PageParams, ParentId, PaymentId, StudentId,
    UserId,
};
use crate::db::repository::*;
use crate::models::class::{ClassOccupancy, ClassOffering, NewClassOffering};
use crate::models::page::{Page, SortDirection};
use crate::models::payment::{NewPayment, Payment, PaymentFilter};
use crate::models::records::{AttendanceRecord, Grade, NewAttendanceRecord, NewGrade};
use crate::models::student::{
    NewParent, NewStudent, Parent, RegistrationStatus, Student, StudentFilter, StudentFlag,
    StudentSort, StudentSortField,
};
use crate::models::user::{NewUser, User};

/// In-memory repository.
///
/// Cloning is cheap; clones share the same underlying data.
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

#[derive(Default)]
struct LocalData {
    students: BTreeMap<StudentId, Student>,
    parents: BTreeMap<ParentId, Parent>,
    classes: BTreeMap<ClassOfferingId, ClassOffering>,
    payments: BTreeMap<PaymentId, Payment>,
    flags: BTreeMap<FlagId, StudentFlag>,
    attendance: BTreeMap<AttendanceId, AttendanceRecord>,
    grades: BTreeMap<GradeId, Grade>,
    users: BTreeMap<UserId, User>,

    next_id: i64,

    // Connection health, settable for testing failure paths.
    is_healthy: bool,
}

impl LocalData {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn confirmed_count(&self, class_id: ClassOfferingId) -> i64 {
        self.students
            .values()
            .filter(|s| {
                s.class_offering_id == Some(class_id)
                    && s.registration_status == RegistrationStatus::Confirmed
            })
            .count() as i64
    }

    fn student(&self, id: StudentId) -> RepositoryResult<&Student> {
        self.students
            .get(&id)
            .ok_or_else(|| RepositoryError::not_found(format!("Student {} not found", id)))
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData {
                is_healthy: true,
                ..Default::default()
            })),
        }
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    /// Number of students stored, any status.
    pub fn student_count(&self) -> usize {
        self.data.read().students.len()
    }

    fn check_health(&self) -> RepositoryResult<()> {
        if !self.data.read().is_healthy {
            return Err(RepositoryError::connection("Database is not healthy"));
        }
        Ok(())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_students(students: &mut [Student], sort: StudentSort) {
    students.sort_by(|a, b| {
        let ordering = match sort.field {
            StudentSortField::LastName => a
                .last_name
                .to_lowercase()
                .cmp(&b.last_name.to_lowercase()),
            StudentSortField::FirstName => a
                .first_name
                .to_lowercase()
                .cmp(&b.first_name.to_lowercase()),
            StudentSortField::DateOfBirth => a.date_of_birth.cmp(&b.date_of_birth),
            StudentSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        // Id tie-break keeps paging stable across identical keys.
        let ordering = ordering.then(a.id.cmp(&b.id));
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

#[async_trait]
impl StudentRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn create_registration(
        &self,
        guardian: GuardianRef,
        student: NewStudent,
    ) -> RepositoryResult<Student> {
        self.check_health()?;
        let mut data = self.data.write();

        if let Some(class_id) = student.class_offering_id {
            if !data.classes.contains_key(&class_id) {
                return Err(RepositoryError::not_found_with_context(
                    format!("Class offering {} not found", class_id),
                    ErrorContext::new("create_registration").with_entity("class_offering"),
                ));
            }
        }

        let parent_id = match guardian {
            GuardianRef::Existing(id) => {
                if !data.parents.contains_key(&id) {
                    return Err(RepositoryError::not_found_with_context(
                        format!("Parent {} not found", id),
                        ErrorContext::new("create_registration").with_entity("parent"),
                    ));
                }
                id
            }
            GuardianRef::New(new) => {
                let id = ParentId::new(data.next_id());
                data.parents.insert(
                    id,
                    Parent {
                        id,
                        first_name: new.first_name,
                        last_name: new.last_name,
                        phone: new.phone,
                        email: new.email,
                    },
                );
                id
            }
        };

        let id = StudentId::new(data.next_id());
        let record = Student {
            id,
            first_name: student.first_name,
            last_name: student.last_name,
            date_of_birth: student.date_of_birth,
            gender: student.gender,
            academic_year: student.academic_year,
            parent_id,
            class_offering_id: student.class_offering_id,
            registration_status: RegistrationStatus::Pending,
            created_at: Utc::now(),
        };
        data.students.insert(id, record.clone());
        Ok(record)
    }

    async fn get_student(&self, student_id: StudentId) -> RepositoryResult<Student> {
        self.check_health()?;
        self.data.read().student(student_id).cloned()
    }

    async fn search_students(
        &self,
        filter: &StudentFilter,
        sort: StudentSort,
        page: PageParams,
    ) -> RepositoryResult<Page<Student>> {
        self.check_health()?;
        let data = self.data.read();
        let mut matches: Vec<Student> = data
            .students
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        drop(data);

        sort_students(&mut matches, sort);
        Ok(Page::from_items(matches, page))
    }

    async fn confirm_student(&self, student_id: StudentId) -> RepositoryResult<Student> {
        self.check_health()?;
        // One write lock across check and transition: the in-memory
        // equivalent of the guarded UPDATE.
        let mut data = self.data.write();

        let student = data.student(student_id)?;
        let class_id = match student.registration_status {
            RegistrationStatus::Confirmed => {
                return Err(RepositoryError::conflict_with_context(
                    format!("Student {} is already confirmed", student_id),
                    ErrorContext::new("confirm_student").with_entity_id(student_id),
                ));
            }
            RegistrationStatus::Cancelled => {
                return Err(RepositoryError::conflict_with_context(
                    format!("Student {} registration is cancelled", student_id),
                    ErrorContext::new("confirm_student").with_entity_id(student_id),
                ));
            }
            RegistrationStatus::Pending => student.class_offering_id.ok_or_else(|| {
                RepositoryError::conflict_with_context(
                    format!("Student {} has no class assigned", student_id),
                    ErrorContext::new("confirm_student").with_entity_id(student_id),
                )
            })?,
        };

        let capacity = data
            .classes
            .get(&class_id)
            .map(|c| i64::from(c.capacity))
            .ok_or_else(|| {
                RepositoryError::not_found(format!("Class offering {} not found", class_id))
            })?;

        if data.confirmed_count(class_id) >= capacity {
            return Err(RepositoryError::conflict_with_context(
                "class is now full".to_string(),
                ErrorContext::new("confirm_student")
                    .with_entity("class_offering")
                    .with_entity_id(class_id),
            ));
        }

        let student = data.students.get_mut(&student_id).expect("checked above");
        student.registration_status = RegistrationStatus::Confirmed;
        Ok(student.clone())
    }

    async fn cancel_student(&self, student_id: StudentId) -> RepositoryResult<Student> {
        self.check_health()?;
        let mut data = self.data.write();

        let student = data.students.get_mut(&student_id).ok_or_else(|| {
            RepositoryError::not_found(format!("Student {} not found", student_id))
        })?;
        if student.registration_status == RegistrationStatus::Cancelled {
            return Err(RepositoryError::conflict(format!(
                "Student {} registration is already cancelled",
                student_id
            )));
        }
        student.registration_status = RegistrationStatus::Cancelled;
        Ok(student.clone())
    }

    async fn expel_student(&self, student_id: StudentId) -> RepositoryResult<()> {
        self.check_health()?;
        let mut data = self.data.write();

        if data.students.remove(&student_id).is_none() {
            return Err(RepositoryError::not_found(format!(
                "Student {} not found",
                student_id
            )));
        }
        data.payments.retain(|_, p| p.student_id != student_id);
        data.flags.retain(|_, f| f.student_id != student_id);
        data.attendance.retain(|_, a| a.student_id != student_id);
        data.grades.retain(|_, g| g.student_id != student_id);
        Ok(())
    }

    async fn insert_flag(
        &self,
        student_id: StudentId,
        reason: String,
    ) -> RepositoryResult<StudentFlag> {
        self.check_health()?;
        let mut data = self.data.write();
        data.student(student_id)?;

        let id = FlagId::new(data.next_id());
        let flag = StudentFlag {
            id,
            student_id,
            reason,
            active: true,
            created_at: Utc::now(),
            resolved_at: None,
        };
        data.flags.insert(id, flag.clone());
        Ok(flag)
    }

    async fn resolve_flag(&self, flag_id: FlagId) -> RepositoryResult<StudentFlag> {
        self.check_health()?;
        let mut data = self.data.write();

        let flag = data
            .flags
            .get_mut(&flag_id)
            .ok_or_else(|| RepositoryError::not_found(format!("Flag {} not found", flag_id)))?;
        if !flag.active {
            return Err(RepositoryError::conflict(format!(
                "Flag {} is already resolved",
                flag_id
            )));
        }
        flag.active = false;
        flag.resolved_at = Some(Utc::now());
        Ok(flag.clone())
    }

    async fn list_flags(&self, student_id: StudentId) -> RepositoryResult<Vec<StudentFlag>> {
        self.check_health()?;
        let data = self.data.read();
        let mut flags: Vec<StudentFlag> = data
            .flags
            .values()
            .filter(|f| f.student_id == student_id)
            .cloned()
            .collect();
        flags.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(flags)
    }
}

#[async_trait]
impl ClassRepository for LocalRepository {
    async fn insert_class(&self, new: NewClassOffering) -> RepositoryResult<ClassOffering> {
        self.check_health()?;
        let mut data = self.data.write();

        let id = ClassOfferingId::new(data.next_id());
        let offering = ClassOffering {
            id,
            name: new.name,
            capacity: new.capacity,
            academic_year: new.academic_year,
            level: new.level,
            time_slot: new.time_slot,
        };
        data.classes.insert(id, offering.clone());
        Ok(offering)
    }

    async fn get_class(&self, class_id: ClassOfferingId) -> RepositoryResult<ClassOffering> {
        self.check_health()?;
        self.data
            .read()
            .classes
            .get(&class_id)
            .cloned()
            .ok_or_else(|| {
                RepositoryError::not_found(format!("Class offering {} not found", class_id))
            })
    }

    async fn list_classes(
        &self,
        academic_year: Option<&str>,
    ) -> RepositoryResult<Vec<ClassOffering>> {
        self.check_health()?;
        let data = self.data.read();
        Ok(data
            .classes
            .values()
            .filter(|c| academic_year.map_or(true, |year| c.academic_year == year))
            .cloned()
            .collect())
    }

    async fn class_occupancies(
        &self,
        academic_year: &str,
    ) -> RepositoryResult<Vec<ClassOccupancy>> {
        self.check_health()?;
        let data = self.data.read();
        Ok(data
            .classes
            .values()
            .filter(|c| c.academic_year == academic_year)
            .map(|c| ClassOccupancy {
                offering: c.clone(),
                confirmed_count: data.confirmed_count(c.id),
            })
            .collect())
    }

    async fn confirmed_count(&self, class_id: ClassOfferingId) -> RepositoryResult<i64> {
        self.check_health()?;
        let data = self.data.read();
        if !data.classes.contains_key(&class_id) {
            return Err(RepositoryError::not_found(format!(
                "Class offering {} not found",
                class_id
            )));
        }
        Ok(data.confirmed_count(class_id))
    }

    async fn update_capacity(
        &self,
        class_id: ClassOfferingId,
        new_capacity: i32,
    ) -> RepositoryResult<ClassOffering> {
        self.check_health()?;
        let mut data = self.data.write();

        if !data.classes.contains_key(&class_id) {
            return Err(RepositoryError::not_found(format!(
                "Class offering {} not found",
                class_id
            )));
        }
        let confirmed = data.confirmed_count(class_id);
        if i64::from(new_capacity) < confirmed {
            return Err(RepositoryError::conflict_with_context(
                format!(
                    "Capacity {} is below current confirmed occupancy {}",
                    new_capacity, confirmed
                ),
                ErrorContext::new("update_capacity")
                    .with_entity("class_offering")
                    .with_entity_id(class_id),
            ));
        }
        let offering = data.classes.get_mut(&class_id).expect("checked above");
        offering.capacity = new_capacity;
        Ok(offering.clone())
    }

    async fn delete_class(&self, class_id: ClassOfferingId) -> RepositoryResult<()> {
        self.check_health()?;
        let mut data = self.data.write();

        if !data.classes.contains_key(&class_id) {
            return Err(RepositoryError::not_found(format!(
                "Class offering {} not found",
                class_id
            )));
        }
        let referencing = data
            .students
            .values()
            .filter(|s| s.class_offering_id == Some(class_id))
            .count();
        if referencing > 0 {
            return Err(RepositoryError::conflict_with_context(
                format!("{} students still reference this class offering", referencing),
                ErrorContext::new("delete_class")
                    .with_entity("class_offering")
                    .with_entity_id(class_id),
            ));
        }
        data.classes.remove(&class_id);
        Ok(())
    }
}

#[async_trait]
impl ParentRepository for LocalRepository {
    async fn insert_parent(&self, new: NewParent) -> RepositoryResult<Parent> {
        self.check_health()?;
        let mut data = self.data.write();

        let id = ParentId::new(data.next_id());
        let parent = Parent {
            id,
            first_name: new.first_name,
            last_name: new.last_name,
            phone: new.phone,
            email: new.email,
        };
        data.parents.insert(id, parent.clone());
        Ok(parent)
    }

    async fn get_parent(&self, parent_id: ParentId) -> RepositoryResult<Parent> {
        self.check_health()?;
        self.data
            .read()
            .parents
            .get(&parent_id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(format!("Parent {} not found", parent_id)))
    }

    async fn delete_parent(&self, parent_id: ParentId) -> RepositoryResult<()> {
        self.check_health()?;
        let mut data = self.data.write();

        if !data.parents.contains_key(&parent_id) {
            return Err(RepositoryError::not_found(format!(
                "Parent {} not found",
                parent_id
            )));
        }
        let owned = data
            .students
            .values()
            .filter(|s| s.parent_id == parent_id)
            .count();
        if owned > 0 {
            return Err(RepositoryError::conflict_with_context(
                format!("Parent still owns {} students", owned),
                ErrorContext::new("delete_parent")
                    .with_entity("parent")
                    .with_entity_id(parent_id),
            ));
        }
        data.parents.remove(&parent_id);
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for LocalRepository {
    async fn insert_payment(
        &self,
        new: NewPayment,
        receipt_number: String,
    ) -> RepositoryResult<Payment> {
        self.check_health()?;
        let mut data = self.data.write();
        data.student(new.student_id)?;

        if data
            .payments
            .values()
            .any(|p| p.receipt_number == receipt_number)
        {
            return Err(RepositoryError::conflict(format!(
                "Receipt number {} already exists",
                receipt_number
            )));
        }

        let id = PaymentId::new(data.next_id());
        let payment = Payment {
            id,
            student_id: new.student_id,
            amount_cents: new.amount_cents,
            method: new.method,
            kind: new.kind,
            receipt_number,
            recorded_at: Utc::now(),
        };
        data.payments.insert(id, payment.clone());
        Ok(payment)
    }

    async fn payments_for_student(
        &self,
        student_id: StudentId,
    ) -> RepositoryResult<Vec<Payment>> {
        self.check_health()?;
        let data = self.data.read();
        let mut payments: Vec<Payment> = data
            .payments
            .values()
            .filter(|p| p.student_id == student_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then(a.id.cmp(&b.id)));
        Ok(payments)
    }

    async fn search_payments(
        &self,
        filter: &PaymentFilter,
        page: PageParams,
    ) -> RepositoryResult<Page<Payment>> {
        self.check_health()?;
        let data = self.data.read();
        let mut matches: Vec<Payment> = data
            .payments
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        drop(data);

        matches.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        Ok(Page::from_items(matches, page))
    }
}

#[async_trait]
impl RecordsRepository for LocalRepository {
    async fn insert_attendance(
        &self,
        student_id: StudentId,
        new: NewAttendanceRecord,
    ) -> RepositoryResult<AttendanceRecord> {
        self.check_health()?;
        let mut data = self.data.write();
        data.student(student_id)?;

        let id = AttendanceId::new(data.next_id());
        let record = AttendanceRecord {
            id,
            student_id,
            date: new.date,
            status: new.status,
            note: new.note,
        };
        data.attendance.insert(id, record.clone());
        Ok(record)
    }

    async fn list_attendance(
        &self,
        student_id: StudentId,
    ) -> RepositoryResult<Vec<AttendanceRecord>> {
        self.check_health()?;
        let data = self.data.read();
        let mut records: Vec<AttendanceRecord> = data
            .attendance
            .values()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn insert_grade(&self, student_id: StudentId, new: NewGrade) -> RepositoryResult<Grade> {
        self.check_health()?;
        let mut data = self.data.write();
        data.student(student_id)?;

        let id = GradeId::new(data.next_id());
        let grade = Grade {
            id,
            student_id,
            subject: new.subject,
            term: new.term,
            score: new.score,
            recorded_at: Utc::now(),
        };
        data.grades.insert(id, grade.clone());
        Ok(grade)
    }

    async fn list_grades(&self, student_id: StudentId) -> RepositoryResult<Vec<Grade>> {
        self.check_health()?;
        let data = self.data.read();
        let mut grades: Vec<Grade> = data
            .grades
            .values()
            .filter(|g| g.student_id == student_id)
            .cloned()
            .collect();
        grades.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        Ok(grades)
    }
}

#[async_trait]
impl UserRepository for LocalRepository {
    async fn insert_user(&self, new: NewUser) -> RepositoryResult<User> {
        self.check_health()?;
        let mut data = self.data.write();

        if data.users.values().any(|u| u.username == new.username) {
            return Err(RepositoryError::conflict(format!(
                "Username {} is already taken",
                new.username
            )));
        }

        let id = UserId::new(data.next_id());
        let user = User {
            id,
            username: new.username,
            password_digest: new.password_digest,
            role: new.role,
            is_active: true,
            created_at: Utc::now(),
        };
        data.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        self.check_health()?;
        Ok(self
            .data
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn set_user_active(&self, user_id: UserId, active: bool) -> RepositoryResult<User> {
        self.check_health()?;
        let mut data = self.data.write();
        let user = data
            .users
            .get_mut(&user_id)
            .ok_or_else(|| RepositoryError::not_found(format!("User {} not found", user_id)))?;
        user.is_active = active;
        Ok(user.clone())
    }
}
