use chrono::{DateTime, Duration, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Length of an opaque token value, in alphanumeric characters (~381 bits).
pub const TOKEN_VALUE_LEN: usize = 64;

/// Generates a random alphanumeric token value from the thread-local CSPRNG.
pub fn generate_token_value() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_VALUE_LEN)
        .map(char::from)
        .collect()
}

/// A persisted refresh token. One row is one live session.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub value: String,
    pub user_id: i32,
    pub issued_to_ip: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Builds a fresh token with a new random value, expiring `ttl` from now.
    pub fn issue(user_id: i32, issued_to_ip: &str, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            value: generate_token_value(),
            user_id,
            issued_to_ip: issued_to_ip.to_string(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Expiry is exclusive: the token is dead from `expires_at` onwards.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_values_are_alphanumeric_and_distinct() {
        let a = generate_token_value();
        let b = generate_token_value();
        assert_eq!(a.len(), TOKEN_VALUE_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let token = RefreshToken::issue(1, "127.0.0.1", Duration::minutes(5));
        assert_eq!(token.expires_at - token.created_at, Duration::minutes(5));

        assert!(!token.is_expired_at(token.expires_at - Duration::milliseconds(1)));
        assert!(token.is_expired_at(token.expires_at));
        assert!(token.is_expired_at(token.expires_at + Duration::seconds(1)));
        assert!(!token.is_expired());
    }

    #[test]
    fn test_zero_ttl_is_expired_immediately() {
        let token = RefreshToken::issue(1, "127.0.0.1", Duration::zero());
        assert!(token.is_expired());
    }
}
