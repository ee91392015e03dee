//! Login, refresh-token rotation and logout.
//!
//! A session is one live refresh token. Every successful refresh deletes the
//! presented token and issues a new one, so a refresh value can be exchanged
//! at most once; replaying it afterwards yields
//! [`AuthError::TokenNotFound`].

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::auth::credentials::Credentials;
use crate::auth::token::AccessTokenCodec;
use crate::auth::{AuthError, TokenKind};
use crate::models::User;
use crate::store::{within, RefreshTokenStore};

pub const TOKEN_TYPE: &str = "Bearer";

/// Lifetimes of the two halves of a token pair.
#[derive(Debug, Clone, Copy)]
pub struct TokenTtl {
    pub access: Duration,
    pub refresh: Duration,
}

/// Response body of login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub access_token_expires: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_token_expires: i64,
}

pub struct TokenService {
    codec: Arc<AccessTokenCodec>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    credentials: Arc<Credentials>,
    ttl: TokenTtl,
    store_timeout: StdDuration,
}

impl TokenService {
    pub fn new(
        codec: Arc<AccessTokenCodec>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        credentials: Arc<Credentials>,
        ttl: TokenTtl,
        store_timeout: StdDuration,
    ) -> Self {
        Self {
            codec,
            refresh_tokens,
            credentials,
            ttl,
            store_timeout,
        }
    }

    pub fn codec(&self) -> &AccessTokenCodec {
        &self.codec
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client_ip: &str,
    ) -> Result<TokenPair, AuthError> {
        let user = self.credentials.authenticate(username, password).await?;
        let pair = self.issue_pair(&user, client_ip).await?;
        info!("User {} logged in from {}", user.id, client_ip);
        Ok(pair)
    }

    /// Exchanges a refresh token for a new pair, consuming the old token.
    pub async fn refresh(&self, value: Option<&str>, client_ip: &str) -> Result<TokenPair, AuthError> {
        let value = match value.map(str::trim) {
            Some(v) if !v.is_empty() => v,
            _ => return Err(AuthError::BadRequest(crate::auth::TOKEN_REQUIRED.into())),
        };

        let old = within(self.store_timeout, self.refresh_tokens.find_by_value(value)).await?;

        if old.is_expired() {
            within(self.store_timeout, self.refresh_tokens.delete_by_id(old.id)).await?;
            debug!("Refresh token {} of user {} expired", old.id, old.user_id);
            return Err(AuthError::TokenExpired);
        }

        // Only the caller whose delete removed the row may continue.
        if !within(self.store_timeout, self.refresh_tokens.delete_by_id(old.id)).await? {
            warn!(
                "Refresh token {} of user {} was consumed concurrently",
                old.id, old.user_id
            );
            return Err(AuthError::TokenNotFound(TokenKind::Refresh));
        }

        let owner = self
            .credentials
            .find_by_id(old.user_id)
            .await?
            .ok_or_else(|| {
                warn!("Refresh token {} outlived user {}", old.id, old.user_id);
                AuthError::OwnerNotFound
            })?;

        let pair = self.issue_pair(&owner, client_ip).await?;
        debug!("Rotated refresh token {} for user {}", old.id, owner.id);
        Ok(pair)
    }

    /// Ends the session behind `value`. Unknown values count as already logged out.
    pub async fn logout(&self, value: &str) -> Result<(), AuthError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(());
        }
        match within(self.store_timeout, self.refresh_tokens.find_by_value(value)).await {
            Ok(token) => {
                within(self.store_timeout, self.refresh_tokens.delete_by_id(token.id)).await?;
                info!("User {} logged out", token.user_id);
                Ok(())
            }
            Err(AuthError::TokenNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn issue_pair(&self, user: &User, client_ip: &str) -> Result<TokenPair, AuthError> {
        let access_token = self.codec.encode(user.id, &user.roles, self.ttl.access)?;
        let refresh = within(
            self.store_timeout,
            self.refresh_tokens.create(user.id, client_ip, self.ttl.refresh),
        )
        .await?;

        Ok(TokenPair {
            access_token,
            refresh_token: refresh.value,
            token_type: TOKEN_TYPE.to_string(),
            access_token_expires: self.ttl.access.num_seconds(),
            refresh_token_expires: self.ttl.refresh.num_seconds(),
        })
    }
}
