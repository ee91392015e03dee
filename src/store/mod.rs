//! Persistence seams for the authentication subsystem.
//!
//! [`RefreshTokenStore`] owns refresh tokens; [`CredentialStore`] is the
//! narrow view of the account table the subsystem needs. Each has a Postgres
//! implementation and an in-memory one for tests and local runs.

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use log::{debug, error, info};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::models::{RefreshToken, Role, User};

pub use memory::{InMemoryCredentialStore, InMemoryRefreshTokenStore};
pub use postgres::{PgCredentialStore, PgRefreshTokenStore};

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Persists a new token for `user_id` with a fresh random value.
    async fn create(
        &self,
        user_id: i32,
        issued_to_ip: &str,
        ttl: Duration,
    ) -> Result<RefreshToken, AuthError>;

    /// Looks a token up by its exact value.
    ///
    /// Fails with [`AuthError::TokenNotFound`] when no live token has it.
    async fn find_by_value(&self, value: &str) -> Result<RefreshToken, AuthError>;

    /// Deletes the token if it still exists.
    ///
    /// Returns `true` only for the call that actually removed it, so two
    /// racing callers can tell which one won. Missing ids are not an error.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AuthError>;

    /// Removes every expired token, returning how many were dropped.
    async fn delete_expired(&self) -> Result<u64, AuthError>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AuthError>;

    /// Fails with [`AuthError::UsernameTaken`] if the username exists.
    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        roles: &[Role],
    ) -> Result<User, AuthError>;

    /// Returns `false` when no account has `username`.
    async fn update_password_hash(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError>;

    async fn delete_by_id(&self, id: i32) -> Result<bool, AuthError>;
}

/// Runs a store call under a deadline.
///
/// Running out of time yields [`AuthError::Unavailable`], never a
/// not-found style error.
pub async fn within<T, F>(limit: StdDuration, call: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::Unavailable(format!(
            "store call exceeded {} ms",
            limit.as_millis()
        ))),
    }
}

/// Periodically drops expired refresh tokens.
///
/// Expiry is also enforced whenever a token is presented, so the sweep only
/// keeps the table small.
pub fn spawn_expiry_sweeper(
    store: Arc<dyn RefreshTokenStore>,
    every: StdDuration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.delete_expired().await {
                Ok(0) => debug!("Expiry sweep found nothing to delete"),
                Ok(n) => info!("Expiry sweep deleted {} refresh tokens", n),
                Err(e) => error!("Expiry sweep failed: {}", e),
            }
        }
    })
}
