//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint: it resolves the acting user,
//! applies the role policy, and delegates to the service layer for business
//! logic. Reads require any valid token; mutations are role-gated.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::auth::AuthUser;
use super::dto::{
    ClassQuery, CreateClassRequest, CreateUserRequest, FlagRequest, HealthResponse, LoginRequest,
    LoginResponse, MessageResponse, PaymentQuery, PaymentRequest, RegisterRequest,
    SetUserActiveRequest, StudentQuery, UpdateCapacityRequest,
};
use super::error::AppError;
use super::state::AppState;
use crate::api::{
    AvailableClass, ClassOffering, ClassOfferingId, FlagId, Grade, Page, PageParams, Parent,
    ParentId, Payment, Student, StudentFlag, StudentId, User,
};
use crate::db::repository::{ClassRepository, GuardianRef, StudentRepository};
use crate::models::payment::{NewPayment, PaymentFilter};
use crate::models::records::{AttendanceRecord, NewAttendanceRecord, NewGrade};
use crate::models::student::{NewParent, NewStudent, StudentFilter, StudentSort};
use crate::models::user::Role;
use crate::services;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Roles allowed to run the registration workflow and payments.
const REGISTRAR: &[Role] = &[Role::Admin, Role::Registration];
/// Roles allowed to record attendance and grades.
const TEACHING: &[Role] = &[Role::Admin, Role::Teacher];
/// Roles allowed to administer classes, users, and expulsions.
const ADMIN_ONLY: &[Role] = &[Role::Admin];

// =============================================================================
// Health & Auth
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and the database
/// is accessible.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match state.repository.health_check().await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> HandlerResult<LoginResponse> {
    let token = services::auth::login(
        state.repository.as_ref(),
        &state.auth,
        &request.username,
        &request.password,
    )
    .await?;
    Ok(Json(LoginResponse { token }))
}

/// POST /users
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    auth.require(ADMIN_ONLY)?;
    let user = services::auth::create_user(
        state.repository.as_ref(),
        &request.username,
        &request.password,
        request.role,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /users/{id}/active
///
/// Deactivation takes effect on the target's next authenticated request;
/// outstanding tokens are not revoked.
pub async fn set_user_active(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<SetUserActiveRequest>,
) -> HandlerResult<User> {
    auth.require(ADMIN_ONLY)?;
    let user = services::auth::set_user_active(
        state.repository.as_ref(),
        crate::api::UserId::new(id),
        request.active,
    )
    .await?;
    Ok(Json(user))
}

// =============================================================================
// Registration workflow
// =============================================================================

/// POST /register
///
/// Create a Pending registration. Capacity is not checked here; seats are
/// claimed at confirmation.
pub async fn register(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Student>), AppError> {
    auth.require(REGISTRAR)?;

    let guardian = guardian_from_request(request.parent_id, request.parent)?;
    let student = NewStudent {
        first_name: request.first_name,
        last_name: request.last_name,
        date_of_birth: request.date_of_birth,
        gender: request.gender,
        academic_year: request.academic_year,
        class_offering_id: Some(request.class_offering_id),
    };

    let student = services::enrollment::register(state.repository.as_ref(), guardian, student)
        .await?;
    Ok((StatusCode::CREATED, Json(student)))
}

fn guardian_from_request(
    parent_id: Option<ParentId>,
    parent: Option<NewParent>,
) -> Result<GuardianRef, AppError> {
    match (parent_id, parent) {
        (Some(_), Some(_)) => Err(AppError::BadRequest(
            "Supply either parent_id or parent, not both".to_string(),
        )),
        (Some(id), None) => Ok(GuardianRef::Existing(id)),
        (None, Some(new)) => Ok(GuardianRef::New(new)),
        (None, None) => Err(AppError::BadRequest(
            "A guardian (parent_id or parent) is required".to_string(),
        )),
    }
}

/// PUT /registrations/{id}/confirm
///
/// Capacity-checked confirmation; 409 when the class is full.
pub async fn confirm_registration(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Student> {
    auth.require(REGISTRAR)?;
    let student =
        services::enrollment::confirm(state.repository.as_ref(), StudentId::new(id)).await?;
    Ok(Json(student))
}

/// PUT /registrations/{id}/cancel
pub async fn cancel_registration(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Student> {
    auth.require(REGISTRAR)?;
    let student =
        services::enrollment::cancel(state.repository.as_ref(), StudentId::new(id)).await?;
    Ok(Json(student))
}

// =============================================================================
// Classes
// =============================================================================

/// GET /classes
pub async fn list_classes(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ClassQuery>,
) -> HandlerResult<Vec<ClassOffering>> {
    let classes = state
        .repository
        .list_classes(query.academic_year.as_deref())
        .await?;
    Ok(Json(classes))
}

/// GET /classes/available?academic_year=
///
/// Offerings of the year with at least one free seat; occupancy is derived
/// on every call.
pub async fn available_classes(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ClassQuery>,
) -> HandlerResult<Vec<AvailableClass>> {
    let year = query.academic_year.unwrap_or_default();
    let classes =
        services::enrollment::available_classes(state.repository.as_ref(), &year).await?;
    Ok(Json(classes))
}

/// POST /classes
pub async fn create_class(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateClassRequest>,
) -> Result<(StatusCode, Json<ClassOffering>), AppError> {
    auth.require(ADMIN_ONLY)?;
    let offering = services::enrollment::create_class(
        state.repository.as_ref(),
        crate::models::class::NewClassOffering {
            name: request.name,
            capacity: request.capacity,
            academic_year: request.academic_year,
            level: request.level,
            time_slot: request.time_slot,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(offering)))
}

/// PUT /classes/{id}/capacity
///
/// 409 when the new capacity is below current confirmed occupancy.
pub async fn update_capacity(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateCapacityRequest>,
) -> HandlerResult<ClassOffering> {
    auth.require(ADMIN_ONLY)?;
    let offering = services::enrollment::update_capacity(
        state.repository.as_ref(),
        ClassOfferingId::new(id),
        request.capacity,
    )
    .await?;
    Ok(Json(offering))
}

/// DELETE /classes/{id}
///
/// 409 while any student (any status) references the offering.
pub async fn delete_class(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<MessageResponse> {
    auth.require(ADMIN_ONLY)?;
    services::enrollment::delete_class(state.repository.as_ref(), ClassOfferingId::new(id))
        .await?;
    Ok(Json(MessageResponse {
        message: format!("Class offering {} deleted", id),
    }))
}

// =============================================================================
// Students
// =============================================================================

/// GET /students
///
/// Paginated search. Unknown sort fields fall back to the default sort;
/// unknown status values are rejected.
pub async fn search_students(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<StudentQuery>,
) -> HandlerResult<Page<Student>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let filter = StudentFilter {
        q: query.q,
        status,
        academic_year: query.academic_year,
        class_offering_id: query.class_offering_id.map(ClassOfferingId::new),
        parent_id: query.parent_id.map(ParentId::new),
    };
    let sort = StudentSort::parse(query.sort.as_deref(), query.order.as_deref());
    let page = PageParams::from_query(query.page, query.size);

    let result =
        services::students::search_students(state.repository.as_ref(), &filter, sort, page)
            .await?;
    Ok(Json(result))
}

/// GET /students/{id}
pub async fn get_student(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Student> {
    let student =
        services::students::get_student(state.repository.as_ref(), StudentId::new(id)).await?;
    Ok(Json(student))
}

/// DELETE /students/{id}
///
/// Expel: destructive cascade delete, admin only.
pub async fn expel_student(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<MessageResponse> {
    auth.require(ADMIN_ONLY)?;
    services::enrollment::expel(state.repository.as_ref(), StudentId::new(id)).await?;
    Ok(Json(MessageResponse {
        message: format!("Student {} expelled", id),
    }))
}

// =============================================================================
// Flags
// =============================================================================

/// POST /students/{id}/flags
pub async fn flag_student(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<FlagRequest>,
) -> Result<(StatusCode, Json<StudentFlag>), AppError> {
    auth.require(REGISTRAR)?;
    let flag = services::students::flag_student(
        state.repository.as_ref(),
        StudentId::new(id),
        &request.reason,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(flag)))
}

/// GET /students/{id}/flags
pub async fn list_flags(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Vec<StudentFlag>> {
    let flags =
        services::students::list_flags(state.repository.as_ref(), StudentId::new(id)).await?;
    Ok(Json(flags))
}

/// PUT /flags/{id}/resolve
pub async fn resolve_flag(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<StudentFlag> {
    auth.require(REGISTRAR)?;
    let flag =
        services::students::resolve_flag(state.repository.as_ref(), FlagId::new(id)).await?;
    Ok(Json(flag))
}

// =============================================================================
// Payments
// =============================================================================

/// POST /payments
///
/// Records the payment and mints a unique receipt number. No idempotency
/// key: a client retry records a second payment.
pub async fn record_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    auth.require(REGISTRAR)?;
    let payment = services::payments::record_payment(
        state.repository.as_ref(),
        NewPayment {
            student_id: request.student_id,
            amount_cents: request.amount_cents,
            method: request.method,
            kind: request.kind,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// GET /payments
pub async fn search_payments(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PaymentQuery>,
) -> HandlerResult<Page<Payment>> {
    auth.require(REGISTRAR)?;

    let method = query
        .method
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(AppError::BadRequest)?;
    let kind = query
        .kind
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let filter = PaymentFilter {
        student_id: query.student_id.map(StudentId::new),
        method,
        kind,
        min_amount_cents: query.min_amount_cents,
        max_amount_cents: query.max_amount_cents,
        recorded_from: query.recorded_from,
        recorded_to: query.recorded_to,
    };
    let page = PageParams::from_query(query.page, query.size);

    let result =
        services::payments::search_payments(state.repository.as_ref(), &filter, page).await?;
    Ok(Json(result))
}

/// GET /students/{id}/payments
pub async fn student_payments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Vec<Payment>> {
    auth.require(REGISTRAR)?;
    let payments =
        services::payments::payments_for_student(state.repository.as_ref(), StudentId::new(id))
            .await?;
    Ok(Json(payments))
}

// =============================================================================
// Attendance & Grades
// =============================================================================

/// POST /students/{id}/attendance
pub async fn record_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<NewAttendanceRecord>,
) -> Result<(StatusCode, Json<AttendanceRecord>), AppError> {
    auth.require(TEACHING)?;
    let record = services::records::record_attendance(
        state.repository.as_ref(),
        StudentId::new(id),
        request,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /students/{id}/attendance
pub async fn list_attendance(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Vec<AttendanceRecord>> {
    let records =
        services::records::list_attendance(state.repository.as_ref(), StudentId::new(id)).await?;
    Ok(Json(records))
}

/// POST /students/{id}/grades
pub async fn record_grade(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<NewGrade>,
) -> Result<(StatusCode, Json<Grade>), AppError> {
    auth.require(TEACHING)?;
    let grade =
        services::records::record_grade(state.repository.as_ref(), StudentId::new(id), request)
            .await?;
    Ok((StatusCode::CREATED, Json(grade)))
}

/// GET /students/{id}/grades
pub async fn list_grades(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Vec<Grade>> {
    let grades =
        services::records::list_grades(state.repository.as_ref(), StudentId::new(id)).await?;
    Ok(Json(grades))
}

// =============================================================================
// Parents
// =============================================================================

/// POST /parents
pub async fn create_parent(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<NewParent>,
) -> Result<(StatusCode, Json<Parent>), AppError> {
    auth.require(REGISTRAR)?;
    let parent = services::parents::create_parent(state.repository.as_ref(), request).await?;
    Ok((StatusCode::CREATED, Json(parent)))
}

/// GET /parents/{id}
pub async fn get_parent(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<Parent> {
    let parent =
        services::parents::get_parent(state.repository.as_ref(), ParentId::new(id)).await?;
    Ok(Json(parent))
}

/// DELETE /parents/{id}
///
/// 409 while the guardian still owns any student.
pub async fn delete_parent(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> HandlerResult<MessageResponse> {
    auth.require(REGISTRAR)?;
    services::parents::delete_parent(state.repository.as_ref(), ParentId::new(id)).await?;
    Ok(Json(MessageResponse {
        message: format!("Parent {} deleted", id),
    }))
}
