//!
//! # Custom Error Handling
//!
//! This module defines `AppError`, the error type returned by every HTTP handler.
//! Domain failures from the authentication subsystem ([`AuthError`]) are mapped onto
//! it here, which is the single place where error kinds turn into status codes.
//!
//! `AppError` implements `actix_web::error::ResponseError`, rendering a JSON body of
//! the form `{"error": "<status reason>", "message": "<human readable text>"}`.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

use crate::auth::{AuthError, TokenKind};

/// Represents all possible errors that can reach an HTTP client.
#[derive(Debug)]
pub enum AppError {
    /// Missing, malformed or expired access token (HTTP 401).
    Unauthorized(String),
    /// Authenticated, but lacking the required role (HTTP 403).
    Forbidden(String),
    /// Malformed or unacceptable request (HTTP 400).
    BadRequest(String),
    /// Requested resource, or credentials, not found (HTTP 404).
    NotFound(String),
    /// Unexpected server-side error (HTTP 500).
    InternalServerError(String),
    /// Error originating from database operations (HTTP 500).
    DatabaseError(String),
    /// Transient backend failure; the client may retry (HTTP 503).
    ServiceUnavailable(String),
}

impl AppError {
    fn message(&self) -> &str {
        match self {
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::InternalServerError(msg)
            | AppError::DatabaseError(msg)
            | AppError::ServiceUnavailable(msg) => msg,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service Unavailable: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": self.message(),
        }))
    }
}

/// Maps the authentication taxonomy onto HTTP semantics.
///
/// Both credential failures share one 404 with one message. Expired and
/// unknown refresh tokens share one 400 with one message.
impl From<AuthError> for AppError {
    fn from(error: AuthError) -> AppError {
        let msg = error.to_string();
        match error {
            AuthError::AuthenticationFailed => AppError::NotFound(msg),
            AuthError::TokenInvalid => AppError::Unauthorized(msg),
            AuthError::TokenExpired
            | AuthError::TokenNotFound(TokenKind::Refresh)
            | AuthError::TokenNotFound(TokenKind::PasswordReset)
            | AuthError::BadRequest(_)
            | AuthError::OwnerNotFound
            | AuthError::AccountNotFound
            | AuthError::UsernameTaken => AppError::BadRequest(msg),
            AuthError::Forbidden => AppError::Forbidden(msg),
            AuthError::InternalError(_) => AppError::InternalServerError(msg),
            AuthError::Store(_) => AppError::DatabaseError(msg),
            AuthError::Unavailable(_) => AppError::ServiceUnavailable(msg),
        }
    }
}

/// Converts `sqlx::Error` into `AppError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            other => AuthError::from(other).into(),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::BadRequest`.
///
/// The message is the field's own validation message, e.g. "Not a valid email
/// address"; several failing fields are joined in field order.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        let mut fields: Vec<_> = error.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        let messages: Vec<String> = fields
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();

        if messages.is_empty() {
            AppError::BadRequest(error.to_string())
        } else {
            AppError::BadRequest(messages.join("; "))
        }
    }
}

/// Converts `bcrypt::BcryptError` into `AppError::InternalServerError`.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}
