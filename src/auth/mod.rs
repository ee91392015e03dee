//! Authentication and session tokens.
//!
//! Access tokens are stateless HS256 JWTs ([`token`]); refresh tokens are opaque
//! values persisted through [`crate::store::RefreshTokenStore`] and rotated on
//! every use ([`service`]). Password resets go through a separate single-use
//! token channel ([`reset`]).

pub mod credentials;
pub mod extractors;
pub mod middleware;
pub mod password;
pub mod reset;
pub mod service;
pub mod signing;
pub mod token;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

pub use credentials::Credentials;
pub use extractors::AuthenticatedUser;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use reset::{
    LocalResetChannel, LogNotifier, PasswordResetBridge, QueuedNotifier, ResetChannel,
    ResetNotifier,
};
pub use service::{TokenPair, TokenService, TokenTtl};
pub use signing::SigningKey;
pub use token::{resolve_bearer, AccessClaims, AccessTokenCodec};

pub const REFRESH_TOKEN_REJECTED: &str =
    "Refresh token is not valid or expired, please, try to log in";
pub const RESET_TOKEN_REJECTED: &str = "Password reset token is not valid or expired";
pub const TOKEN_REQUIRED: &str = "Token is required";
pub const PASSWORD_REQUIRED: &str = "Password is required";
pub const PASSWORD_LENGTH_INVALID: &str = "Password must be 6 to 128 characters";
/// Bounds on new passwords, in characters. Mirrored by `RegisterRequest`.
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 128;

/// Which kind of opaque token could not be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Refresh,
    PasswordReset,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Refresh => f.write_str(REFRESH_TOKEN_REJECTED),
            TokenKind::PasswordReset => f.write_str(RESET_TOKEN_REJECTED),
        }
    }
}

/// Failures of the authentication subsystem.
///
/// Only [`AuthError::Unavailable`] is transient; everything else describes a
/// definite outcome and is surfaced to the caller as is.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username or wrong password. The two are deliberately
    /// indistinguishable here; the log records which one it was.
    #[error("Username Not Found / Incorrect Password")]
    AuthenticationFailed,

    /// Access token with a bad signature, bad structure or past expiry.
    #[error("Expired or invalid JWT token")]
    TokenInvalid,

    /// Refresh token past its expiry.
    #[error("{}", REFRESH_TOKEN_REJECTED)]
    TokenExpired,

    #[error("{0}")]
    TokenNotFound(TokenKind),

    #[error("{0}")]
    BadRequest(String),

    /// A refresh token outlived the account that owned it.
    #[error("Refresh token owner not found")]
    OwnerNotFound,

    #[error("Username Not Found")]
    AccountNotFound,

    #[error("Username already in use")]
    UsernameTaken,

    #[error("Access denied")]
    Forbidden,

    #[error("{0}")]
    InternalError(String),

    /// Non-transient storage failure.
    #[error("Storage error: {0}")]
    Store(String),

    /// Storage unreachable or too slow; safe to retry.
    #[error("Service temporarily unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Unavailable(_))
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(error: sqlx::Error) -> AuthError {
        match error {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::WorkerCrashed => AuthError::Unavailable(error.to_string()),
            _ => AuthError::Store(error.to_string()),
        }
    }
}

/// Represents the payload for a user login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Account name; accounts are keyed by email address.
    #[validate(email(message = "Not a valid email address"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Represents the payload for a new user registration request.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Not a valid email address"))]
    pub username: String,
    /// Must be at least 6 characters long.
    #[validate(length(min = 6, max = 128, message = "Password must be 6 to 128 characters"))]
    pub password: String,
}

/// Response body after a successful registration.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: i32,
    pub username: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Not a valid email address"))]
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_login_request_validation() {
        let valid_login = LoginRequest {
            username: "admin@mail.com".to_string(),
            password: "admin".to_string(),
        };
        assert!(valid_login.validate().is_ok());

        let invalid_email_login = LoginRequest {
            username: "notValidUsername".to_string(),
            password: "password123".to_string(),
        };
        assert!(invalid_email_login.validate().is_err());

        let empty_password_login = LoginRequest {
            username: "test@example.com".to_string(),
            password: String::new(),
        };
        assert!(empty_password_login.validate().is_err());
    }

    #[test]
    fn test_register_request_validation() {
        let valid_register = RegisterRequest {
            username: "username@mail.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(valid_register.validate().is_ok());

        let short_password_register = RegisterRequest {
            username: "username@mail.com".to_string(),
            password: "1".to_string(),
        };
        assert!(short_password_register.validate().is_err());
    }

    #[test]
    fn test_error_messages_stay_generic() {
        assert_eq!(
            AuthError::AuthenticationFailed.to_string(),
            "Username Not Found / Incorrect Password"
        );
        assert_eq!(
            AuthError::TokenNotFound(TokenKind::Refresh).to_string(),
            AuthError::TokenExpired.to_string()
        );
        assert!(AuthError::Unavailable("pool timed out".into()).is_retryable());
        assert!(!AuthError::TokenNotFound(TokenKind::Refresh).is_retryable());
    }
}
