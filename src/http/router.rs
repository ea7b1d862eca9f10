//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - permissive for development, should be restricted in production
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the API router with versioned endpoints
    let api_v1 = Router::new()
        // Registration workflow
        .route("/register", post(handlers::register))
        .route(
            "/registrations/{id}/confirm",
            put(handlers::confirm_registration),
        )
        .route(
            "/registrations/{id}/cancel",
            put(handlers::cancel_registration),
        )
        // Classes
        .route("/classes", get(handlers::list_classes))
        .route("/classes", post(handlers::create_class))
        .route("/classes/available", get(handlers::available_classes))
        .route("/classes/{id}/capacity", put(handlers::update_capacity))
        .route("/classes/{id}", delete(handlers::delete_class))
        // Students
        .route("/students", get(handlers::search_students))
        .route("/students/{id}", get(handlers::get_student))
        .route("/students/{id}", delete(handlers::expel_student))
        .route("/students/{id}/flags", post(handlers::flag_student))
        .route("/students/{id}/flags", get(handlers::list_flags))
        .route("/flags/{id}/resolve", put(handlers::resolve_flag))
        // Payments
        .route("/payments", post(handlers::record_payment))
        .route("/payments", get(handlers::search_payments))
        .route("/students/{id}/payments", get(handlers::student_payments))
        // Attendance & grades
        .route(
            "/students/{id}/attendance",
            post(handlers::record_attendance),
        )
        .route("/students/{id}/attendance", get(handlers::list_attendance))
        .route("/students/{id}/grades", post(handlers::record_grade))
        .route("/students/{id}/grades", get(handlers::list_grades))
        // Parents
        .route("/parents", post(handlers::create_parent))
        .route("/parents/{id}", get(handlers::get_parent))
        .route("/parents/{id}", delete(handlers::delete_parent))
        // Users
        .route("/users", post(handlers::create_user))
        .route("/users/{id}/active", put(handlers::set_user_active));

    // Combine all routes
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/auth/login", post(handlers::login))
        .nest("/v1", api_v1)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::LocalRepository;
    use crate::services::auth::AuthConfig;
    use std::sync::Arc;

    #[test]
    fn test_router_creation() {
        let repo = Arc::new(LocalRepository::new())
            as Arc<dyn crate::db::repository::FullRepository>;
        let state = AppState::new(repo, AuthConfig::with_secret("test"));
        let _router = create_router(state);
        // If we got here, router was created successfully
    }
}
