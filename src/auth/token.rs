use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::auth::signing::SigningKey;
use crate::auth::AuthError;
use crate::models::Role;

/// Represents the claims encoded within an access token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AccessClaims {
    /// Subject of the token, the user's id.
    pub sub: i32,
    /// Role names granted to the subject at issue time.
    pub roles: Vec<Role>,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiration, seconds since epoch.
    pub exp: i64,
}

impl AccessClaims {
    pub fn subject_id(&self) -> i32 {
        self.sub
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Signs and verifies HS256 access tokens with a fixed key.
///
/// Stateless: any instance holding the same [`SigningKey`] accepts tokens
/// minted by any other.
pub struct AccessTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl AccessTokenCodec {
    pub fn new(key: &SigningKey) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked to the second, without grace.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(key.key()),
            decoding: DecodingKey::from_secret(key.key()),
            validation,
        }
    }

    /// Mints a token for `subject_id` carrying `roles`, valid for `ttl` from now.
    pub fn encode(&self, subject_id: i32, roles: &[Role], ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: subject_id,
            roles: roles.to_vec(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        self.encode_claims(&claims)
    }

    pub(crate) fn encode_claims(&self, claims: &AccessClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::InternalError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies the signature and expiry of `token` and returns its claims.
    ///
    /// Every failure (bad signature, malformed token, expired token) is
    /// reported as [`AuthError::TokenInvalid`].
    pub fn decode(&self, token: &str) -> Result<AccessClaims, AuthError> {
        decode::<AccessClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Rejected access token: {}", e);
                AuthError::TokenInvalid
            })
    }
}

/// Extracts the token from an `Authorization` header value.
///
/// The `Bearer ` prefix is matched case-insensitively. A value without the
/// prefix is taken as the token itself, so `Authorization: <token>` is
/// accepted too. Returns `None` for an empty token.
pub fn resolve_bearer(header_value: &str) -> Option<&str> {
    const PREFIX: &str = "bearer ";
    let value = header_value.trim_start();
    let token = match value.get(..PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(PREFIX) => value[PREFIX.len()..].trim(),
        _ => value.trim_end(),
    };
    (!token.is_empty()).then_some(token)
}
