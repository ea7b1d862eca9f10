//! End-to-end routing tests: auth guard, role policy, and the registration
//! workflow through the HTTP surface.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use sams_rust::api::Role;
use sams_rust::db::repositories::LocalRepository;
use sams_rust::http::{create_router, AppState};
use sams_rust::services::auth::{self, AuthConfig};
use std::sync::Arc;

const SECRET: &str = "routes-test-secret";

async fn test_app() -> (axum::Router, LocalRepository) {
    let repo = LocalRepository::new();
    auth::create_user(&repo, "admin", "admin-password", Role::Admin)
        .await
        .unwrap();
    auth::create_user(&repo, "teacher", "teacher-password", Role::Teacher)
        .await
        .unwrap();

    let state = AppState::new(
        Arc::new(repo.clone()),
        AuthConfig::with_secret(SECRET),
    );
    (create_router(state), repo)
}

async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(v) => Body::from(v.to_string()),
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

async fn login(router: &axum::Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({"username": username, "password": password})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_needs_no_auth() {
    let (router, _repo) = test_app().await;
    let (status, body) = send(&router, json_request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_missing_token_is_401() {
    let (router, _repo) = test_app().await;
    let (status, _) = send(&router, json_request("GET", "/v1/students", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bad_login_is_401() {
    let (router, _repo) = test_app().await;
    let (status, _) = send(
        &router,
        json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({"username": "admin", "password": "nope"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_teacher_cannot_create_classes() {
    let (router, _repo) = test_app().await;
    let token = login(&router, "teacher", "teacher-password").await;

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/v1/classes",
            Some(&token),
            Some(json!({
                "name": "CM1-A",
                "capacity": 10,
                "academic_year": "2026-2027"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_registration_workflow_over_http() {
    let (router, _repo) = test_app().await;
    let token = login(&router, "admin", "admin-password").await;

    // Create a class with one seat.
    let (status, class) = send(
        &router,
        json_request(
            "POST",
            "/v1/classes",
            Some(&token),
            Some(json!({
                "name": "CM1-A",
                "capacity": 1,
                "academic_year": "2026-2027",
                "level": "CM1",
                "time_slot": "morning"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let class_id = class["id"].as_i64().unwrap();

    // Register two pending students; capacity is not checked yet.
    let mut student_ids = Vec::new();
    for last in ["Haddad", "Bello"] {
        let (status, student) = send(
            &router,
            json_request(
                "POST",
                "/v1/register",
                Some(&token),
                Some(json!({
                    "first_name": "Sam",
                    "last_name": last,
                    "date_of_birth": "2016-09-01",
                    "gender": "other",
                    "academic_year": "2026-2027",
                    "class_offering_id": class_id,
                    "parent": {
                        "first_name": "Alex",
                        "last_name": last,
                        "phone": "555-0100"
                    }
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(student["registration_status"], "pending");
        student_ids.push(student["id"].as_i64().unwrap());
    }

    // First confirm takes the seat; second gets 409.
    let (status, confirmed) = send(
        &router,
        json_request(
            "PUT",
            &format!("/v1/registrations/{}/confirm", student_ids[0]),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["registration_status"], "confirmed");

    let (status, body) = send(
        &router,
        json_request(
            "PUT",
            &format!("/v1/registrations/{}/confirm", student_ids[1]),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    // The full class no longer shows up as available.
    let (status, available) = send(
        &router,
        json_request(
            "GET",
            "/v1/classes/available?academic_year=2026-2027",
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(available.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_student_listing_pagination_and_filters() {
    let (router, _repo) = test_app().await;
    let token = login(&router, "admin", "admin-password").await;

    let (_, class) = send(
        &router,
        json_request(
            "POST",
            "/v1/classes",
            Some(&token),
            Some(json!({
                "name": "CM1-A",
                "capacity": 30,
                "academic_year": "2026-2027"
            })),
        ),
    )
    .await;
    let class_id = class["id"].as_i64().unwrap();

    for i in 0..12 {
        let (status, _) = send(
            &router,
            json_request(
                "POST",
                "/v1/register",
                Some(&token),
                Some(json!({
                    "first_name": "Sam",
                    "last_name": format!("Family{:02}", i),
                    "date_of_birth": "2016-09-01",
                    "gender": "other",
                    "academic_year": "2026-2027",
                    "class_offering_id": class_id,
                    "parent": {
                        "first_name": "Alex",
                        "last_name": format!("Family{:02}", i),
                        "phone": "555-0100"
                    }
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = send(
        &router,
        json_request("GET", "/v1/students?page=2&size=5", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 12);
    assert_eq!(page["pages"], 3);
    assert_eq!(page["items"].as_array().unwrap().len(), 5);
    assert_eq!(page["has_next"], true);
    assert_eq!(page["has_previous"], true);

    // Unknown status filter values are rejected, not silently ignored.
    let (status, _) = send(
        &router,
        json_request("GET", "/v1/students?status=enrolled", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_endpoint_validates_amount() {
    let (router, _repo) = test_app().await;
    let token = login(&router, "admin", "admin-password").await;

    let (_, class) = send(
        &router,
        json_request(
            "POST",
            "/v1/classes",
            Some(&token),
            Some(json!({"name": "C", "capacity": 5, "academic_year": "2026-2027"})),
        ),
    )
    .await;
    let (_, student) = send(
        &router,
        json_request(
            "POST",
            "/v1/register",
            Some(&token),
            Some(json!({
                "first_name": "Sam",
                "last_name": "Okafor",
                "date_of_birth": "2016-09-01",
                "gender": "other",
                "academic_year": "2026-2027",
                "class_offering_id": class["id"],
                "parent": {"first_name": "Alex", "last_name": "Okafor", "phone": "555-0100"}
            })),
        ),
    )
    .await;

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/v1/payments",
            Some(&token),
            Some(json!({
                "student_id": student["id"],
                "amount_cents": -500,
                "method": "cash",
                "kind": "tuition"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, payment) = send(
        &router,
        json_request(
            "POST",
            "/v1/payments",
            Some(&token),
            Some(json!({
                "student_id": student["id"],
                "amount_cents": 15000,
                "method": "cash",
                "kind": "tuition"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(payment["receipt_number"]
        .as_str()
        .unwrap()
        .starts_with("RECEIPT-"));
}
