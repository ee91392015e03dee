//! Process-local stores backed by mutex-guarded maps.
//!
//! No lock is held across an `.await`, so `std::sync::Mutex` is sufficient.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::{AuthError, TokenKind};
use crate::models::{RefreshToken, Role, User};
use crate::store::{CredentialStore, RefreshTokenStore};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AuthError> {
    mutex
        .lock()
        .map_err(|_| AuthError::Store("in-memory store lock poisoned".into()))
}

#[derive(Default)]
struct TokenTable {
    by_id: HashMap<Uuid, RefreshToken>,
    id_by_value: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    table: Mutex<TokenTable>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tokens, expired ones included.
    pub fn len(&self) -> usize {
        self.table.lock().map(|t| t.by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn create(
        &self,
        user_id: i32,
        issued_to_ip: &str,
        ttl: Duration,
    ) -> Result<RefreshToken, AuthError> {
        let mut table = lock(&self.table)?;
        let mut token = RefreshToken::issue(user_id, issued_to_ip, ttl);
        while table.id_by_value.contains_key(&token.value) {
            token = RefreshToken::issue(user_id, issued_to_ip, ttl);
        }
        table.id_by_value.insert(token.value.clone(), token.id);
        table.by_id.insert(token.id, token.clone());
        Ok(token)
    }

    async fn find_by_value(&self, value: &str) -> Result<RefreshToken, AuthError> {
        let table = lock(&self.table)?;
        table
            .id_by_value
            .get(value)
            .and_then(|id| table.by_id.get(id))
            .cloned()
            .ok_or(AuthError::TokenNotFound(TokenKind::Refresh))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AuthError> {
        let mut table = lock(&self.table)?;
        match table.by_id.remove(&id) {
            Some(token) => {
                table.id_by_value.remove(&token.value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_expired(&self) -> Result<u64, AuthError> {
        let now = Utc::now();
        let mut table = lock(&self.table)?;
        let expired: Vec<(Uuid, String)> = table
            .by_id
            .values()
            .filter(|t| t.is_expired_at(now))
            .map(|t| (t.id, t.value.clone()))
            .collect();
        for (id, value) in &expired {
            table.by_id.remove(id);
            table.id_by_value.remove(value);
        }
        Ok(expired.len() as u64)
    }
}

#[derive(Default)]
struct UserTable {
    next_id: i32,
    by_id: HashMap<i32, User>,
    id_by_username: HashMap<String, i32>,
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    table: Mutex<UserTable>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        let table = lock(&self.table)?;
        Ok(table
            .id_by_username
            .get(username)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AuthError> {
        Ok(lock(&self.table)?.by_id.get(&id).cloned())
    }

    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        roles: &[Role],
    ) -> Result<User, AuthError> {
        let mut table = lock(&self.table)?;
        if table.id_by_username.contains_key(username) {
            return Err(AuthError::UsernameTaken);
        }
        table.next_id += 1;
        let user = User {
            id: table.next_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            roles: roles.to_vec(),
            created_at: Utc::now(),
        };
        table.id_by_username.insert(user.username.clone(), user.id);
        table.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_password_hash(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let mut table = lock(&self.table)?;
        let Some(id) = table.id_by_username.get(username).copied() else {
            return Ok(false);
        };
        match table.by_id.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_id(&self, id: i32) -> Result<bool, AuthError> {
        let mut table = lock(&self.table)?;
        match table.by_id.remove(&id) {
            Some(user) => {
                table.id_by_username.remove(&user.username);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refresh_token_lifecycle() {
        let store = InMemoryRefreshTokenStore::new();
        let token = store.create(3, "10.0.0.1", Duration::hours(1)).await.unwrap();

        let found = store.find_by_value(&token.value).await.unwrap();
        assert_eq!(found.id, token.id);
        assert_eq!(found.user_id, 3);
        assert_eq!(found.issued_to_ip, "10.0.0.1");

        assert!(store.delete_by_id(token.id).await.unwrap());
        // Second delete is a no-op, not an error.
        assert!(!store.delete_by_id(token.id).await.unwrap());
        assert!(matches!(
            store.find_by_value(&token.value).await,
            Err(AuthError::TokenNotFound(TokenKind::Refresh))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_find_requires_exact_value() {
        let store = InMemoryRefreshTokenStore::new();
        let token = store.create(1, "10.0.0.1", Duration::hours(1)).await.unwrap();

        assert!(store.find_by_value(&token.value[..63]).await.is_err());
        assert!(store.find_by_value(&format!("{}x", token.value)).await.is_err());
        assert!(store.find_by_value("").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_expired_keeps_live_tokens() {
        let store = InMemoryRefreshTokenStore::new();
        store.create(1, "ip", Duration::zero()).await.unwrap();
        store.create(2, "ip", Duration::zero()).await.unwrap();
        let live = store.create(3, "ip", Duration::days(1)).await.unwrap();

        assert_eq!(store.delete_expired().await.unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.find_by_value(&live.value).await.is_ok());
    }

    #[tokio::test]
    async fn test_credential_store_round_trip() {
        let store = InMemoryCredentialStore::new();
        let user = store
            .insert("test@example.com", "hash-1", &[Role::User])
            .await
            .unwrap();

        assert!(matches!(
            store.insert("test@example.com", "hash-2", &[Role::User]).await,
            Err(AuthError::UsernameTaken)
        ));

        assert!(store.update_password_hash("test@example.com", "hash-3").await.unwrap());
        assert!(!store.update_password_hash("nobody@example.com", "x").await.unwrap());

        let reloaded = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "hash-3");

        assert!(store.delete_by_id(user.id).await.unwrap());
        assert!(store.find_by_username("test@example.com").await.unwrap().is_none());
        assert!(!store.delete_by_id(user.id).await.unwrap());
    }
}
