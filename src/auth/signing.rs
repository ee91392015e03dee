use std::fmt;

use crate::config::ConfigError;

/// Minimum secret length accepted for HS256 (the digest size of SHA-256).
pub const MIN_SECRET_LEN: usize = 32;

/// Symmetric secret used to sign and verify access tokens.
///
/// Built once from configuration and handed to [`AccessTokenCodec::new`];
/// it never changes afterwards.
///
/// [`AccessTokenCodec::new`]: crate::auth::token::AccessTokenCodec::new
#[derive(Clone)]
pub struct SigningKey {
    secret: Vec<u8>,
}

impl SigningKey {
    pub fn from_secret(secret: &[u8]) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret {
                len: secret.len(),
                min: MIN_SECRET_LEN,
            });
        }
        Ok(Self {
            secret: secret.to_vec(),
        })
    }

    pub fn key(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("len", &self.secret.len())
            .finish_non_exhaustive()
    }
}
