use crate::auth::AuthError;
use bcrypt::{hash, verify};

pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    hash(password, cost)
        .map_err(|e| AuthError::InternalError(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AuthError> {
    verify(password, hashed_password)
        .map_err(|e| AuthError::InternalError(format!("Failed to verify password: {}", e)))
}
