//! Postgres repository implementation using Diesel.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Automatic migration execution
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)
//!
//! ## Concurrency
//!
//! The registration confirm and the capacity reduction are single guarded
//! `UPDATE` statements: the capacity check and the status/capacity write
//! happen in one statement, so two requests racing for the last seat cannot
//! both win. A zero-rows-affected result is followed by a diagnostic read to
//! pick the precise error, which is safe because that path never mutates.

use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sql_types::{BigInt, Integer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;
use tokio::task;

use crate::api::{ClassOfferingId, FlagId, PageParams, ParentId, StudentId, UserId};
use crate::db::repository::{
    ClassRepository, ErrorContext, GuardianRef, ParentRepository, PaymentRepository,
    RecordsRepository, RepositoryError, RepositoryResult, StudentRepository, UserRepository,
};
use crate::models::class::{ClassOccupancy, ClassOffering, NewClassOffering};
use crate::models::page::{Page, SortDirection};
use crate::models::payment::{NewPayment, Payment, PaymentFilter};
use crate::models::records::{AttendanceRecord, Grade, NewAttendanceRecord, NewGrade};
use crate::models::student::{
    NewStudent, Parent, RegistrationStatus, Student, StudentFilter, StudentFlag, StudentSort,
    StudentSortField,
};
use crate::models::user::{NewUser, User};

mod models;
mod schema;

use models::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Create configuration from environment variables (see module docs for
    /// the variable list).
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        Ok(Self {
            database_url,
            max_pool_size: env_parse("PG_POOL_MAX", 10),
            min_pool_size: env_parse("PG_POOL_MIN", 1),
            connection_timeout_sec: env_parse("PG_CONN_TIMEOUT_SEC", 30),
            idle_timeout_sec: env_parse("PG_IDLE_TIMEOUT_SEC", 600),
            max_retries: env_parse("PG_MAX_RETRIES", 3),
            retry_delay_ms: env_parse("PG_RETRY_DELAY_MS", 100),
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Diesel-backed repository for Postgres.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
                RepositoryError::internal_with_context(
                    format!("Migration failed: {}", e),
                    ErrorContext::new("run_migrations"),
                )
            })?;
        }

        Ok(Self { pool, config })
    }

    /// Execute a database operation on a pooled connection, retrying
    /// transient failures (connection errors, serialization failures) with
    /// exponential backoff.
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2;
                }

                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1))
                                .retryable(),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        return Err(err);
                    }
                };

                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }
}

/// Apply the ANDed filter fields to a boxed student query.
fn apply_student_filters(
    mut query: schema::students::BoxedQuery<'static, diesel::pg::Pg>,
    filter: &StudentFilter,
) -> schema::students::BoxedQuery<'static, diesel::pg::Pg> {
    use schema::students::dsl::*;

    if let Some(q) = &filter.q {
        let pattern = format!("%{}%", q);
        query = query.filter(
            first_name
                .ilike(pattern.clone())
                .or(last_name.ilike(pattern)),
        );
    }
    if let Some(status) = filter.status {
        query = query.filter(registration_status.eq(status.as_str().to_string()));
    }
    if let Some(year) = &filter.academic_year {
        query = query.filter(academic_year.eq(year.clone()));
    }
    if let Some(class_id) = filter.class_offering_id {
        query = query.filter(class_offering_id.eq(class_id.value()));
    }
    if let Some(pid) = filter.parent_id {
        query = query.filter(parent_id.eq(pid.value()));
    }
    query
}

/// Apply the ANDed filter fields to a boxed payment query.
fn apply_payment_filters(
    mut query: schema::payments::BoxedQuery<'static, diesel::pg::Pg>,
    filter: &PaymentFilter,
) -> schema::payments::BoxedQuery<'static, diesel::pg::Pg> {
    use schema::payments::dsl::*;

    if let Some(sid) = filter.student_id {
        query = query.filter(student_id.eq(sid.value()));
    }
    if let Some(m) = filter.method {
        query = query.filter(method.eq(m.as_str().to_string()));
    }
    if let Some(k) = filter.kind {
        query = query.filter(kind.eq(k.as_str().to_string()));
    }
    if let Some(min) = filter.min_amount_cents {
        query = query.filter(amount_cents.ge(min));
    }
    if let Some(max) = filter.max_amount_cents {
        query = query.filter(amount_cents.le(max));
    }
    if let Some(from) = filter.recorded_from {
        query = query.filter(recorded_at.ge(from));
    }
    if let Some(to) = filter.recorded_to {
        query = query.filter(recorded_at.le(to));
    }
    query
}

fn load_student(conn: &mut PgConnection, id: StudentId) -> RepositoryResult<Option<Student>> {
    use schema::students::dsl::students;

    let row = students
        .find(id.value())
        .select(StudentRow::as_select())
        .first::<StudentRow>(conn)
        .optional()?;
    row.map(Student::try_from).transpose()
}

fn student_exists(conn: &mut PgConnection, id: StudentId) -> RepositoryResult<()> {
    use schema::students::dsl::students;

    let found: Option<i64> = students
        .find(id.value())
        .select(schema::students::id)
        .first(conn)
        .optional()?;
    if found.is_none() {
        return Err(RepositoryError::not_found(format!(
            "Student {} not found",
            id
        )));
    }
    Ok(())
}

#[async_trait]
impl StudentRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1").execute(conn)?;
            Ok(true)
        })
        .await
    }

    async fn create_registration(
        &self,
        guardian: GuardianRef,
        student: NewStudent,
    ) -> RepositoryResult<Student> {
        self.with_conn(move |conn| {
            conn.transaction::<Student, RepositoryError, _>(|conn| {
                if let Some(class_id) = student.class_offering_id {
                    let found: Option<i64> = schema::class_offerings::dsl::class_offerings
                        .find(class_id.value())
                        .select(schema::class_offerings::id)
                        .first(conn)
                        .optional()?;
                    if found.is_none() {
                        return Err(RepositoryError::not_found_with_context(
                            format!("Class offering {} not found", class_id),
                            ErrorContext::new("create_registration")
                                .with_entity("class_offering"),
                        ));
                    }
                }

                let guardian_id = match guardian.clone() {
                    GuardianRef::Existing(id) => {
                        let found: Option<i64> = schema::parents::dsl::parents
                            .find(id.value())
                            .select(schema::parents::id)
                            .first(conn)
                            .optional()?;
                        found.ok_or_else(|| {
                            RepositoryError::not_found_with_context(
                                format!("Parent {} not found", id),
                                ErrorContext::new("create_registration").with_entity("parent"),
                            )
                        })?
                    }
                    GuardianRef::New(new) => {
                        let row: ParentRow = diesel::insert_into(schema::parents::table)
                            .values(NewParentRow {
                                first_name: new.first_name,
                                last_name: new.last_name,
                                phone: new.phone,
                                email: new.email,
                            })
                            .get_result(conn)?;
                        row.id
                    }
                };

                let row: StudentRow = diesel::insert_into(schema::students::table)
                    .values(NewStudentRow {
                        first_name: student.first_name.clone(),
                        last_name: student.last_name.clone(),
                        date_of_birth: student.date_of_birth,
                        gender: student.gender.as_str().to_string(),
                        academic_year: student.academic_year.clone(),
                        parent_id: guardian_id,
                        class_offering_id: student.class_offering_id.map(|c| c.value()),
                        registration_status: RegistrationStatus::Pending.as_str().to_string(),
                    })
                    .get_result(conn)?;

                Student::try_from(row)
            })
        })
        .await
    }

    async fn get_student(&self, student_id: StudentId) -> RepositoryResult<Student> {
        self.with_conn(move |conn| {
            load_student(conn, student_id)?.ok_or_else(|| {
                RepositoryError::not_found(format!("Student {} not found", student_id))
            })
        })
        .await
    }

    async fn search_students(
        &self,
        filter: &StudentFilter,
        sort: StudentSort,
        page: PageParams,
    ) -> RepositoryResult<Page<Student>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            use schema::students::dsl::*;

            let total: i64 = apply_student_filters(students.into_boxed(), &filter)
                .count()
                .get_result(conn)?;

            let mut query = apply_student_filters(students.into_boxed(), &filter);
            query = match (sort.field, sort.direction) {
                (StudentSortField::LastName, SortDirection::Asc) => {
                    query.order((last_name.asc(), id.asc()))
                }
                (StudentSortField::LastName, SortDirection::Desc) => {
                    query.order((last_name.desc(), id.desc()))
                }
                (StudentSortField::FirstName, SortDirection::Asc) => {
                    query.order((first_name.asc(), id.asc()))
                }
                (StudentSortField::FirstName, SortDirection::Desc) => {
                    query.order((first_name.desc(), id.desc()))
                }
                (StudentSortField::DateOfBirth, SortDirection::Asc) => {
                    query.order((date_of_birth.asc(), id.asc()))
                }
                (StudentSortField::DateOfBirth, SortDirection::Desc) => {
                    query.order((date_of_birth.desc(), id.desc()))
                }
                (StudentSortField::CreatedAt, SortDirection::Asc) => {
                    query.order((created_at.asc(), id.asc()))
                }
                (StudentSortField::CreatedAt, SortDirection::Desc) => {
                    query.order((created_at.desc(), id.desc()))
                }
            };

            let rows: Vec<StudentRow> = query
                .limit(i64::from(page.size()))
                .offset(page.offset() as i64)
                .select(StudentRow::as_select())
                .load(conn)?;

            let items = rows
                .into_iter()
                .map(Student::try_from)
                .collect::<RepositoryResult<Vec<_>>>()?;
            Ok(Page::new(items, total as u64, page))
        })
        .await
    }

    async fn confirm_student(&self, student_id: StudentId) -> RepositoryResult<Student> {
        self.with_conn(move |conn| {
            // Capacity check and status transition in one statement. Two
            // concurrent confirms for the last seat serialize on the row
            // count inside the UPDATE; only one can win.
            let affected = sql_query(
                "UPDATE students SET registration_status = 'confirmed' \
                 WHERE id = $1 \
                   AND registration_status = 'pending' \
                   AND class_offering_id IS NOT NULL \
                   AND (SELECT COUNT(*) FROM students s2 \
                        WHERE s2.class_offering_id = students.class_offering_id \
                          AND s2.registration_status = 'confirmed') \
                       < (SELECT c.capacity FROM class_offerings c \
                          WHERE c.id = students.class_offering_id)",
            )
            .bind::<BigInt, _>(student_id.value())
            .execute(conn)?;

            if affected == 1 {
                return load_student(conn, student_id)?.ok_or_else(|| {
                    RepositoryError::internal("Confirmed student disappeared mid-request")
                });
            }

            // Nothing was updated: diagnose which precondition failed.
            let student = load_student(conn, student_id)?.ok_or_else(|| {
                RepositoryError::not_found(format!("Student {} not found", student_id))
            })?;
            let ctx = ErrorContext::new("confirm_student").with_entity_id(student_id);
            match student.registration_status {
                RegistrationStatus::Confirmed => Err(RepositoryError::conflict_with_context(
                    format!("Student {} is already confirmed", student_id),
                    ctx,
                )),
                RegistrationStatus::Cancelled => Err(RepositoryError::conflict_with_context(
                    format!("Student {} registration is cancelled", student_id),
                    ctx,
                )),
                RegistrationStatus::Pending => {
                    if student.class_offering_id.is_none() {
                        Err(RepositoryError::conflict_with_context(
                            format!("Student {} has no class assigned", student_id),
                            ctx,
                        ))
                    } else {
                        Err(RepositoryError::conflict_with_context(
                            "class is now full".to_string(),
                            ctx.with_entity("class_offering"),
                        ))
                    }
                }
            }
        })
        .await
    }

    async fn cancel_student(&self, student_id: StudentId) -> RepositoryResult<Student> {
        self.with_conn(move |conn| {
            use schema::students::dsl::*;

            let affected = diesel::update(
                students.filter(
                    id.eq(student_id.value())
                        .and(registration_status.ne("cancelled")),
                ),
            )
            .set(registration_status.eq("cancelled"))
            .execute(conn)?;

            if affected == 1 {
                return load_student(conn, student_id)?.ok_or_else(|| {
                    RepositoryError::internal("Cancelled student disappeared mid-request")
                });
            }

            match load_student(conn, student_id)? {
                None => Err(RepositoryError::not_found(format!(
                    "Student {} not found",
                    student_id
                ))),
                Some(_) => Err(RepositoryError::conflict(format!(
                    "Student {} registration is already cancelled",
                    student_id
                ))),
            }
        })
        .await
    }

    async fn expel_student(&self, student_id: StudentId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            conn.transaction::<(), RepositoryError, _>(|conn| {
                diesel::delete(
                    schema::payments::dsl::payments
                        .filter(schema::payments::student_id.eq(student_id.value())),
                )
                .execute(conn)?;
                diesel::delete(
                    schema::student_flags::dsl::student_flags
                        .filter(schema::student_flags::student_id.eq(student_id.value())),
                )
                .execute(conn)?;
                diesel::delete(
                    schema::attendance_records::dsl::attendance_records
                        .filter(schema::attendance_records::student_id.eq(student_id.value())),
                )
                .execute(conn)?;
                diesel::delete(
                    schema::grades::dsl::grades
                        .filter(schema::grades::student_id.eq(student_id.value())),
                )
                .execute(conn)?;

                let affected = diesel::delete(
                    schema::students::dsl::students
                        .filter(schema::students::id.eq(student_id.value())),
                )
                .execute(conn)?;
                if affected == 0 {
                    return Err(RepositoryError::not_found(format!(
                        "Student {} not found",
                        student_id
                    )));
                }
                Ok(())
            })
        })
        .await
    }

    async fn insert_flag(
        &self,
        student_id: StudentId,
        reason: String,
    ) -> RepositoryResult<StudentFlag> {
        self.with_conn(move |conn| {
            student_exists(conn, student_id)?;
            let row: StudentFlagRow = diesel::insert_into(schema::student_flags::table)
                .values((
                    schema::student_flags::student_id.eq(student_id.value()),
                    schema::student_flags::reason.eq(reason.clone()),
                ))
                .get_result(conn)?;
            Ok(StudentFlag::from(row))
        })
        .await
    }

    async fn resolve_flag(&self, flag_id: FlagId) -> RepositoryResult<StudentFlag> {
        self.with_conn(move |conn| {
            use schema::student_flags::dsl::*;

            let row: Option<StudentFlagRow> = diesel::update(
                student_flags.filter(id.eq(flag_id.value()).and(active.eq(true))),
            )
            .set((active.eq(false), resolved_at.eq(diesel::dsl::now)))
            .get_result(conn)
            .optional()?;

            match row {
                Some(row) => Ok(StudentFlag::from(row)),
                None => {
                    let exists: Option<i64> = student_flags
                        .find(flag_id.value())
                        .select(id)
                        .first(conn)
                        .optional()?;
                    if exists.is_some() {
                        Err(RepositoryError::conflict(format!(
                            "Flag {} is already resolved",
                            flag_id
                        )))
                    } else {
                        Err(RepositoryError::not_found(format!(
                            "Flag {} not found",
                            flag_id
                        )))
                    }
                }
            }
        })
        .await
    }

    async fn list_flags(&self, student_id: StudentId) -> RepositoryResult<Vec<StudentFlag>> {
        self.with_conn(move |conn| {
            use schema::student_flags::dsl::*;

            let rows: Vec<StudentFlagRow> = student_flags
                .filter(schema::student_flags::student_id.eq(student_id.value()))
                .order((created_at.desc(), id.desc()))
                .select(StudentFlagRow::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(StudentFlag::from).collect())
        })
        .await
    }
}

#[async_trait]
impl ClassRepository for PostgresRepository {
    async fn insert_class(&self, new: NewClassOffering) -> RepositoryResult<ClassOffering> {
        self.with_conn(move |conn| {
            let row: ClassOfferingRow = diesel::insert_into(schema::class_offerings::table)
                .values(NewClassOfferingRow {
                    name: new.name.clone(),
                    capacity: new.capacity,
                    academic_year: new.academic_year.clone(),
                    level: new.level.clone(),
                    time_slot: new.time_slot.clone(),
                })
                .get_result(conn)?;
            Ok(ClassOffering::from(row))
        })
        .await
    }

    async fn get_class(&self, class_id: ClassOfferingId) -> RepositoryResult<ClassOffering> {
        self.with_conn(move |conn| {
            let row: Option<ClassOfferingRow> = schema::class_offerings::dsl::class_offerings
                .find(class_id.value())
                .select(ClassOfferingRow::as_select())
                .first(conn)
                .optional()?;
            row.map(ClassOffering::from).ok_or_else(|| {
                RepositoryError::not_found(format!("Class offering {} not found", class_id))
            })
        })
        .await
    }

    async fn list_classes(
        &self,
        academic_year: Option<&str>,
    ) -> RepositoryResult<Vec<ClassOffering>> {
        let year = academic_year.map(|s| s.to_string());
        self.with_conn(move |conn| {
            use schema::class_offerings::dsl::*;

            let mut query = class_offerings.into_boxed();
            if let Some(year) = year.clone() {
                query = query.filter(academic_year.eq(year));
            }
            let rows: Vec<ClassOfferingRow> = query
                .order(id.asc())
                .select(ClassOfferingRow::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(ClassOffering::from).collect())
        })
        .await
    }

    async fn class_occupancies(
        &self,
        academic_year: &str,
    ) -> RepositoryResult<Vec<ClassOccupancy>> {
        let year = academic_year.to_string();
        self.with_conn(move |conn| {
            let offerings: Vec<ClassOfferingRow> = schema::class_offerings::dsl::class_offerings
                .filter(schema::class_offerings::academic_year.eq(year.clone()))
                .order(schema::class_offerings::id.asc())
                .select(ClassOfferingRow::as_select())
                .load(conn)?;

            let counts: Vec<(Option<i64>, i64)> = schema::students::dsl::students
                .filter(schema::students::registration_status.eq("confirmed"))
                .filter(schema::students::class_offering_id.is_not_null())
                .group_by(schema::students::class_offering_id)
                .select((schema::students::class_offering_id, diesel::dsl::count_star()))
                .load(conn)?;
            let by_class: std::collections::HashMap<i64, i64> = counts
                .into_iter()
                .filter_map(|(class, n)| class.map(|c| (c, n)))
                .collect();

            Ok(offerings
                .into_iter()
                .map(|row| {
                    let confirmed = by_class.get(&row.id).copied().unwrap_or(0);
                    ClassOccupancy {
                        offering: ClassOffering::from(row),
                        confirmed_count: confirmed,
                    }
                })
                .collect())
        })
        .await
    }

    async fn confirmed_count(&self, class_id: ClassOfferingId) -> RepositoryResult<i64> {
        self.with_conn(move |conn| {
            let exists: Option<i64> = schema::class_offerings::dsl::class_offerings
                .find(class_id.value())
                .select(schema::class_offerings::id)
                .first(conn)
                .optional()?;
            if exists.is_none() {
                return Err(RepositoryError::not_found(format!(
                    "Class offering {} not found",
                    class_id
                )));
            }

            let count: i64 = schema::students::dsl::students
                .filter(schema::students::class_offering_id.eq(class_id.value()))
                .filter(schema::students::registration_status.eq("confirmed"))
                .count()
                .get_result(conn)?;
            Ok(count)
        })
        .await
    }

    async fn update_capacity(
        &self,
        class_id: ClassOfferingId,
        new_capacity: i32,
    ) -> RepositoryResult<ClassOffering> {
        self.with_conn(move |conn| {
            // Guarded in one statement so a racing confirm cannot slip a
            // student in between the occupancy read and the capacity write.
            let affected = sql_query(
                "UPDATE class_offerings SET capacity = $2 \
                 WHERE id = $1 \
                   AND $2 >= (SELECT COUNT(*) FROM students \
                              WHERE class_offering_id = $1 \
                                AND registration_status = 'confirmed')",
            )
            .bind::<BigInt, _>(class_id.value())
            .bind::<Integer, _>(new_capacity)
            .execute(conn)?;

            if affected == 1 {
                let row: ClassOfferingRow = schema::class_offerings::dsl::class_offerings
                    .find(class_id.value())
                    .select(ClassOfferingRow::as_select())
                    .first(conn)?;
                return Ok(ClassOffering::from(row));
            }

            let exists: Option<i64> = schema::class_offerings::dsl::class_offerings
                .find(class_id.value())
                .select(schema::class_offerings::id)
                .first(conn)
                .optional()?;
            if exists.is_none() {
                Err(RepositoryError::not_found(format!(
                    "Class offering {} not found",
                    class_id
                )))
            } else {
                Err(RepositoryError::conflict_with_context(
                    format!(
                        "Capacity {} is below current confirmed occupancy",
                        new_capacity
                    ),
                    ErrorContext::new("update_capacity")
                        .with_entity("class_offering")
                        .with_entity_id(class_id),
                ))
            }
        })
        .await
    }

    async fn delete_class(&self, class_id: ClassOfferingId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            conn.transaction::<(), RepositoryError, _>(|conn| {
                let referencing: i64 = schema::students::dsl::students
                    .filter(schema::students::class_offering_id.eq(class_id.value()))
                    .count()
                    .get_result(conn)?;
                if referencing > 0 {
                    return Err(RepositoryError::conflict_with_context(
                        format!("{} students still reference this class offering", referencing),
                        ErrorContext::new("delete_class")
                            .with_entity("class_offering")
                            .with_entity_id(class_id),
                    ));
                }

                let affected = diesel::delete(
                    schema::class_offerings::dsl::class_offerings
                        .filter(schema::class_offerings::id.eq(class_id.value())),
                )
                .execute(conn)?;
                if affected == 0 {
                    return Err(RepositoryError::not_found(format!(
                        "Class offering {} not found",
                        class_id
                    )));
                }
                Ok(())
            })
        })
        .await
    }
}

#[async_trait]
impl ParentRepository for PostgresRepository {
    async fn insert_parent(&self, new: NewParent) -> RepositoryResult<Parent> {
        self.with_conn(move |conn| {
            let row: ParentRow = diesel::insert_into(schema::parents::table)
                .values(NewParentRow {
                    first_name: new.first_name.clone(),
                    last_name: new.last_name.clone(),
                    phone: new.phone.clone(),
                    email: new.email.clone(),
                })
                .get_result(conn)?;
            Ok(Parent::from(row))
        })
        .await
    }

    async fn get_parent(&self, parent_id: ParentId) -> RepositoryResult<Parent> {
        self.with_conn(move |conn| {
            let row: Option<ParentRow> = schema::parents::dsl::parents
                .find(parent_id.value())
                .select(ParentRow::as_select())
                .first(conn)
                .optional()?;
            row.map(Parent::from)
                .ok_or_else(|| RepositoryError::not_found(format!("Parent {} not found", parent_id)))
        })
        .await
    }

    async fn delete_parent(&self, parent_id: ParentId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            conn.transaction::<(), RepositoryError, _>(|conn| {
                let owned: i64 = schema::students::dsl::students
                    .filter(schema::students::parent_id.eq(parent_id.value()))
                    .count()
                    .get_result(conn)?;
                if owned > 0 {
                    return Err(RepositoryError::conflict_with_context(
                        format!("Parent still owns {} students", owned),
                        ErrorContext::new("delete_parent")
                            .with_entity("parent")
                            .with_entity_id(parent_id),
                    ));
                }

                let affected = diesel::delete(
                    schema::parents::dsl::parents
                        .filter(schema::parents::id.eq(parent_id.value())),
                )
                .execute(conn)?;
                if affected == 0 {
                    return Err(RepositoryError::not_found(format!(
                        "Parent {} not found",
                        parent_id
                    )));
                }
                Ok(())
            })
        })
        .await
    }
}

#[async_trait]
impl PaymentRepository for PostgresRepository {
    async fn insert_payment(
        &self,
        new: NewPayment,
        receipt_number: String,
    ) -> RepositoryResult<Payment> {
        self.with_conn(move |conn| {
            student_exists(conn, new.student_id)?;
            // Receipt uniqueness is enforced by the unique constraint; a
            // violation maps to Conflict in the error conversion.
            let row: PaymentRow = diesel::insert_into(schema::payments::table)
                .values(NewPaymentRow {
                    student_id: new.student_id.value(),
                    amount_cents: new.amount_cents,
                    method: new.method.as_str().to_string(),
                    kind: new.kind.as_str().to_string(),
                    receipt_number: receipt_number.clone(),
                })
                .get_result(conn)?;
            Payment::try_from(row)
        })
        .await
    }

    async fn payments_for_student(
        &self,
        student_id: StudentId,
    ) -> RepositoryResult<Vec<Payment>> {
        self.with_conn(move |conn| {
            use schema::payments::dsl::*;

            let rows: Vec<PaymentRow> = payments
                .filter(schema::payments::student_id.eq(student_id.value()))
                .order((recorded_at.asc(), id.asc()))
                .select(PaymentRow::as_select())
                .load(conn)?;
            rows.into_iter().map(Payment::try_from).collect()
        })
        .await
    }

    async fn search_payments(
        &self,
        filter: &PaymentFilter,
        page: PageParams,
    ) -> RepositoryResult<Page<Payment>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            use schema::payments::dsl::*;

            let total: i64 = apply_payment_filters(payments.into_boxed(), &filter)
                .count()
                .get_result(conn)?;

            let rows: Vec<PaymentRow> = apply_payment_filters(payments.into_boxed(), &filter)
                .order((recorded_at.desc(), id.desc()))
                .limit(i64::from(page.size()))
                .offset(page.offset() as i64)
                .select(PaymentRow::as_select())
                .load(conn)?;

            let items = rows
                .into_iter()
                .map(Payment::try_from)
                .collect::<RepositoryResult<Vec<_>>>()?;
            Ok(Page::new(items, total as u64, page))
        })
        .await
    }
}

#[async_trait]
impl RecordsRepository for PostgresRepository {
    async fn insert_attendance(
        &self,
        student_id: StudentId,
        new: NewAttendanceRecord,
    ) -> RepositoryResult<AttendanceRecord> {
        self.with_conn(move |conn| {
            student_exists(conn, student_id)?;
            let row: AttendanceRow = diesel::insert_into(schema::attendance_records::table)
                .values(NewAttendanceRow {
                    student_id: student_id.value(),
                    date: new.date,
                    status: new.status.as_str().to_string(),
                    note: new.note.clone(),
                })
                .get_result(conn)?;
            AttendanceRecord::try_from(row)
        })
        .await
    }

    async fn list_attendance(
        &self,
        student_id: StudentId,
    ) -> RepositoryResult<Vec<AttendanceRecord>> {
        self.with_conn(move |conn| {
            use schema::attendance_records::dsl::*;

            let rows: Vec<AttendanceRow> = attendance_records
                .filter(schema::attendance_records::student_id.eq(student_id.value()))
                .order((date.desc(), id.desc()))
                .select(AttendanceRow::as_select())
                .load(conn)?;
            rows.into_iter().map(AttendanceRecord::try_from).collect()
        })
        .await
    }

    async fn insert_grade(&self, student_id: StudentId, new: NewGrade) -> RepositoryResult<Grade> {
        self.with_conn(move |conn| {
            student_exists(conn, student_id)?;
            let row: GradeRow = diesel::insert_into(schema::grades::table)
                .values(NewGradeRow {
                    student_id: student_id.value(),
                    subject: new.subject.clone(),
                    term: new.term.clone(),
                    score: new.score,
                })
                .get_result(conn)?;
            Ok(Grade::from(row))
        })
        .await
    }

    async fn list_grades(&self, student_id: StudentId) -> RepositoryResult<Vec<Grade>> {
        self.with_conn(move |conn| {
            use schema::grades::dsl::*;

            let rows: Vec<GradeRow> = grades
                .filter(schema::grades::student_id.eq(student_id.value()))
                .order((recorded_at.desc(), id.desc()))
                .select(GradeRow::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(Grade::from).collect())
        })
        .await
    }
}

#[async_trait]
impl UserRepository for PostgresRepository {
    async fn insert_user(&self, new: NewUser) -> RepositoryResult<User> {
        self.with_conn(move |conn| {
            // Username uniqueness rides on the unique constraint.
            let row: UserRow = diesel::insert_into(schema::users::table)
                .values(NewUserRow {
                    username: new.username.clone(),
                    password_digest: new.password_digest.clone(),
                    role: new.role.as_str().to_string(),
                })
                .get_result(conn)?;
            User::try_from(row)
        })
        .await
    }

    async fn find_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            let row: Option<UserRow> = schema::users::dsl::users
                .filter(schema::users::username.eq(username.clone()))
                .select(UserRow::as_select())
                .first(conn)
                .optional()?;
            row.map(User::try_from).transpose()
        })
        .await
    }

    async fn set_user_active(&self, user_id: UserId, active: bool) -> RepositoryResult<User> {
        self.with_conn(move |conn| {
            use schema::users::dsl::*;

            let row: Option<UserRow> = diesel::update(users.find(user_id.value()))
                .set(is_active.eq(active))
                .get_result(conn)
                .optional()?;
            match row {
                Some(row) => User::try_from(row),
                None => Err(RepositoryError::not_found(format!(
                    "User {} not found",
                    user_id
                ))),
            }
        })
        .await
    }
}
