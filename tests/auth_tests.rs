//! Authentication and authorization behavior against the in-memory backend.

mod support;

use sams_rust::api::Role;
use sams_rust::db::repository::RepositoryError;
use sams_rust::services::auth::{self, AuthConfig, AuthError};
use support::repo;

fn config() -> AuthConfig {
    AuthConfig::with_secret("integration-test-secret")
}

#[tokio::test]
async fn test_login_and_authenticate_round_trip() {
    let repo = repo();
    auth::create_user(&repo, "registrar", "correct-horse", Role::Registration)
        .await
        .unwrap();

    let token = auth::login(&repo, &config(), "registrar", "correct-horse")
        .await
        .unwrap();
    let user = auth::authenticate(&repo, &config(), &token).await.unwrap();
    assert_eq!(user.username, "registrar");
    assert_eq!(user.role, Role::Registration);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let repo = repo();
    auth::create_user(&repo, "registrar", "correct-horse", Role::Registration)
        .await
        .unwrap();

    assert!(matches!(
        auth::login(&repo, &config(), "registrar", "wrong").await,
        Err(AuthError::Authentication(_))
    ));
    assert!(matches!(
        auth::login(&repo, &config(), "nobody", "correct-horse").await,
        Err(AuthError::Authentication(_))
    ));
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let repo = repo();
    assert!(matches!(
        auth::authenticate(&repo, &config(), "not-a-token").await,
        Err(AuthError::Authentication(_))
    ));
}

#[tokio::test]
async fn test_deactivation_invalidates_live_tokens_on_next_request() {
    let repo = repo();
    let user = auth::create_user(&repo, "teacher", "password-123", Role::Teacher)
        .await
        .unwrap();
    let token = auth::login(&repo, &config(), "teacher", "password-123")
        .await
        .unwrap();

    // The token itself stays valid, but the per-request is_active re-check
    // rejects the deactivated account.
    auth::set_user_active(&repo, user.id, false).await.unwrap();
    assert!(matches!(
        auth::authenticate(&repo, &config(), &token).await,
        Err(AuthError::Authentication(_))
    ));

    // Reactivation restores access without re-issuing the token.
    auth::set_user_active(&repo, user.id, true).await.unwrap();
    auth::authenticate(&repo, &config(), &token).await.unwrap();
}

#[tokio::test]
async fn test_duplicate_username_is_a_conflict() {
    let repo = repo();
    auth::create_user(&repo, "admin", "password-123", Role::Admin)
        .await
        .unwrap();
    let err = auth::create_user(&repo, "admin", "password-456", Role::Teacher)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict { .. }));
}

#[tokio::test]
async fn test_short_password_is_rejected() {
    let repo = repo();
    let err = auth::create_user(&repo, "admin", "short", Role::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Validation { .. }));
}
