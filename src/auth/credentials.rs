use std::sync::Arc;
use std::time::Duration as StdDuration;

use log::{info, warn};

use crate::auth::password::{hash_password, verify_password};
use crate::auth::AuthError;
use crate::models::{Role, User};
use crate::store::{within, CredentialStore};

/// Password-based operations on top of a [`CredentialStore`].
///
/// Hashing is bcrypt at the configured cost; the store only ever sees hashes.
pub struct Credentials {
    store: Arc<dyn CredentialStore>,
    bcrypt_cost: u32,
    timeout: StdDuration,
    // Verified against when the username is unknown, so both failure paths
    // pay for one bcrypt verification.
    decoy_hash: String,
}

impl Credentials {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        bcrypt_cost: u32,
        timeout: StdDuration,
    ) -> Result<Self, AuthError> {
        let decoy_hash = hash_password("decoy-password-never-matches", bcrypt_cost)?;
        Ok(Self {
            store,
            bcrypt_cost,
            timeout,
            decoy_hash,
        })
    }

    /// Checks `password` against the stored hash for `username`.
    ///
    /// Unknown usernames and wrong passwords both come back as
    /// [`AuthError::AuthenticationFailed`]; only the log tells them apart.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = within(self.timeout, self.store.find_by_username(username)).await?;
        let Some(user) = user else {
            let _ = verify_password(password, &self.decoy_hash);
            warn!("Authentication failed for {}: no such user", username);
            return Err(AuthError::AuthenticationFailed);
        };

        if verify_password(password, &user.password_hash)? {
            Ok(user)
        } else {
            warn!("Authentication failed for {}: password mismatch", username);
            Err(AuthError::AuthenticationFailed)
        }
    }

    /// Creates a regular account.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let hash = hash_password(password, self.bcrypt_cost)?;
        let user = within(self.timeout, self.store.insert(username, &hash, &[Role::User])).await?;
        info!("Registered user {} ({})", user.id, user.username);
        Ok(user)
    }

    /// Re-hashes and stores a new password for `username`.
    pub async fn update_password(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let hash = hash_password(password, self.bcrypt_cost)?;
        if within(self.timeout, self.store.update_password_hash(username, &hash)).await? {
            info!("Password updated for {}", username);
            Ok(())
        } else {
            warn!("Password update for unknown account {}", username);
            Err(AuthError::AccountNotFound)
        }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<User>, AuthError> {
        within(self.timeout, self.store.find_by_id(id)).await
    }

    pub async fn exists(&self, username: &str) -> Result<bool, AuthError> {
        Ok(within(self.timeout, self.store.find_by_username(username))
            .await?
            .is_some())
    }

    pub async fn delete(&self, id: i32) -> Result<bool, AuthError> {
        within(self.timeout, self.store.delete_by_id(id)).await
    }

    /// Creates the administrator account unless `username` already exists.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<User, AuthError> {
        if let Some(existing) = within(self.timeout, self.store.find_by_username(username)).await? {
            if !existing.has_role(Role::Admin) {
                warn!("Seed account {} exists without ROLE_ADMIN", username);
            }
            return Ok(existing);
        }
        let hash = hash_password(password, self.bcrypt_cost)?;
        let admin = within(
            self.timeout,
            self.store.insert(username, &hash, &[Role::User, Role::Admin]),
        )
        .await?;
        info!("Seeded administrator account {}", admin.username);
        Ok(admin)
    }
}
