//! User account repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::UserId;
use crate::models::user::{NewUser, User};

/// Repository trait for staff user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Store a new user account.
    ///
    /// # Errors
    /// * `Conflict` - the username is already taken
    async fn insert_user(&self, new: NewUser) -> RepositoryResult<User>;

    /// Look up a user by username. `Ok(None)` when no such user exists;
    /// callers decide whether that is an authentication failure.
    async fn find_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;

    /// Activate or deactivate an account. A deactivated account fails
    /// authentication on its next request; already-issued tokens are not
    /// revoked.
    ///
    /// # Errors
    /// * `NotFound` - the user doesn't exist
    async fn set_user_active(&self, user_id: UserId, active: bool) -> RepositoryResult<User>;
}
