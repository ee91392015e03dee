use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::warn;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::auth::{AuthError, TokenKind};
use crate::models::{RefreshToken, Role, User};
use crate::store::{CredentialStore, RefreshTokenStore};

/// Attempts at drawing a value that is not already taken.
const CREATE_ATTEMPTS: usize = 3;

pub async fn connect(database_url: &str, acquire_timeout: StdDuration) -> Result<PgPool, AuthError> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
        .map_err(AuthError::from)
}

/// Applies the embedded migrations under `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AuthError> {
    sqlx::migrate!()
        .run(pool)
        .await
        .map_err(|e| AuthError::Store(format!("migration failed: {}", e)))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn create(
        &self,
        user_id: i32,
        issued_to_ip: &str,
        ttl: Duration,
    ) -> Result<RefreshToken, AuthError> {
        for _ in 0..CREATE_ATTEMPTS {
            let token = RefreshToken::issue(user_id, issued_to_ip, ttl);
            let inserted = sqlx::query(
                "INSERT INTO refresh_tokens (id, value, user_id, issued_to_ip, created_at, expires_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(token.id)
            .bind(&token.value)
            .bind(token.user_id)
            .bind(&token.issued_to_ip)
            .bind(token.created_at)
            .bind(token.expires_at)
            .execute(&self.pool)
            .await;

            match inserted {
                Ok(_) => return Ok(token),
                Err(e) if is_unique_violation(&e) => {
                    warn!("Refresh token value collision, drawing a new one");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::InternalError(
            "Could not generate a unique refresh token".into(),
        ))
    }

    async fn find_by_value(&self, value: &str) -> Result<RefreshToken, AuthError> {
        sqlx::query_as::<_, RefreshToken>(
            "SELECT id, value, user_id, issued_to_ip, created_at, expires_at \
             FROM refresh_tokens WHERE value = $1",
        )
        .bind(value)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AuthError::TokenNotFound(TokenKind::Refresh))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired(&self) -> Result<u64, AuthError> {
        // Same clock and same boundary as RefreshToken::is_expired_at.
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i32,
    username: String,
    password_hash: String,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AuthError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let roles = row
            .roles
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(AuthError::Store)?;
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            roles,
            created_at: row.created_at,
        })
    }
}

const USER_COLUMNS: &str = "id, username, password_hash, roles, created_at";

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AuthError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        roles: &[Role],
    ) -> Result<User, AuthError> {
        let role_names: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();
        let sql = format!(
            "INSERT INTO users (username, password_hash, roles) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .bind(password_hash)
            .bind(role_names)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AuthError::UsernameTaken
                } else {
                    AuthError::from(e)
                }
            })?;
        User::try_from(row)
    }

    async fn update_password_hash(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE username = $2")
            .bind(password_hash)
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_id(&self, id: i32) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
