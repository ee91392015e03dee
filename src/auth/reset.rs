//! Password reset through single-use tokens.
//!
//! [`PasswordResetBridge`] validates requests and drives a [`ResetChannel`].
//! The channel owns the tokens: it decides whether an account exists, issues
//! and delivers the token, and later exchanges it for the account's email.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info};
use tokio::sync::mpsc;

use crate::auth::credentials::Credentials;
use crate::auth::{
    AuthError, TokenKind, PASSWORD_LENGTH_INVALID, PASSWORD_MAX_LEN, PASSWORD_MIN_LEN,
    PASSWORD_REQUIRED, TOKEN_REQUIRED,
};
use crate::models::generate_token_value;

#[async_trait]
pub trait ResetChannel: Send + Sync {
    /// Issues a reset token for `email` and delivers it out of band.
    ///
    /// Unknown addresses are not an error; only infrastructure failures are.
    async fn send(&self, email: &str) -> Result<(), AuthError>;

    /// Consumes `token` and returns the email it was issued for.
    ///
    /// Fails with [`AuthError::TokenNotFound`] for unknown, used or expired
    /// tokens.
    async fn exchange(&self, token: &str) -> Result<String, AuthError>;
}

/// Delivers reset tokens to account holders.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn notify(&self, email: &str, token: &str) -> Result<(), AuthError>;
}

/// Writes the reset token to the log instead of sending mail. Development only.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn notify(&self, email: &str, token: &str) -> Result<(), AuthError> {
        info!("Password reset token for {}: {}", email, token);
        Ok(())
    }
}

/// Hands tokens to a background task that delivers them through `inner`.
///
/// Accepting a reset request then costs the same whether or not the account
/// exists, however slow the real delivery is. Delivery failures are logged;
/// `notify` itself only fails once the queue has stopped.
pub struct QueuedNotifier {
    queue: mpsc::Sender<(String, String)>,
}

impl QueuedNotifier {
    /// Spawns the delivery task. Must be called inside a Tokio runtime.
    pub fn spawn(inner: Arc<dyn ResetNotifier>, capacity: usize) -> Self {
        let (queue, mut pending) = mpsc::channel::<(String, String)>(capacity.max(1));
        tokio::spawn(async move {
            while let Some((email, token)) = pending.recv().await {
                if let Err(e) = inner.notify(&email, &token).await {
                    error!("Failed to deliver password reset token to {}: {}", email, e);
                }
            }
            debug!("Reset notification queue closed");
        });
        Self { queue }
    }
}

#[async_trait]
impl ResetNotifier for QueuedNotifier {
    async fn notify(&self, email: &str, token: &str) -> Result<(), AuthError> {
        self.queue
            .send((email.to_string(), token.to_string()))
            .await
            .map_err(|_| {
                AuthError::InternalError("An error occurred while generating the token".into())
            })
    }
}

struct PendingReset {
    email: String,
    expires_at: DateTime<Utc>,
}

/// In-process [`ResetChannel`] keeping pending tokens in memory.
///
/// Requesting a new token for an account invalidates the previous one.
pub struct LocalResetChannel {
    credentials: Arc<Credentials>,
    notifier: Arc<dyn ResetNotifier>,
    ttl: Duration,
    pending: Mutex<HashMap<String, PendingReset>>,
}

impl LocalResetChannel {
    pub fn new(credentials: Arc<Credentials>, notifier: Arc<dyn ResetNotifier>, ttl: Duration) -> Self {
        Self {
            credentials,
            notifier,
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn with_pending<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, PendingReset>) -> T,
    ) -> Result<T, AuthError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| AuthError::InternalError("reset token table lock poisoned".into()))?;
        Ok(f(&mut pending))
    }
}

#[async_trait]
impl ResetChannel for LocalResetChannel {
    async fn send(&self, email: &str) -> Result<(), AuthError> {
        let token = generate_token_value();
        if !self.credentials.exists(email).await? {
            info!("Password reset requested for unknown account {}", email);
            return Ok(());
        }

        let now = Utc::now();
        self.with_pending(|pending| {
            pending.retain(|_, p| p.email != email && p.expires_at > now);
            pending.insert(
                token.clone(),
                PendingReset {
                    email: email.to_string(),
                    expires_at: now + self.ttl,
                },
            );
        })?;

        if let Err(e) = self.notifier.notify(email, &token).await {
            self.with_pending(|pending| pending.remove(&token))?;
            error!("Failed to deliver password reset token to {}: {}", email, e);
            return Err(e);
        }
        Ok(())
    }

    async fn exchange(&self, token: &str) -> Result<String, AuthError> {
        let entry = self.with_pending(|pending| pending.remove(token))?;
        match entry {
            Some(p) if Utc::now() < p.expires_at => Ok(p.email),
            Some(p) => {
                info!("Expired password reset token presented for {}", p.email);
                Err(AuthError::TokenNotFound(TokenKind::PasswordReset))
            }
            None => Err(AuthError::TokenNotFound(TokenKind::PasswordReset)),
        }
    }
}

pub struct PasswordResetBridge {
    channel: Arc<dyn ResetChannel>,
    credentials: Arc<Credentials>,
}

impl PasswordResetBridge {
    pub fn new(channel: Arc<dyn ResetChannel>, credentials: Arc<Credentials>) -> Self {
        Self {
            channel,
            credentials,
        }
    }

    pub async fn request_reset(&self, email: &str) -> Result<(), AuthError> {
        self.channel.send(email.trim()).await
    }

    /// Sets a new password using a reset token.
    ///
    /// Both inputs are checked before the token is exchanged, so a malformed
    /// request never burns a token. New passwords follow the registration
    /// length rule.
    pub async fn redeem(
        &self,
        token: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<(), AuthError> {
        let token = match token.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Err(AuthError::BadRequest(TOKEN_REQUIRED.into())),
        };
        let new_password = match new_password {
            Some(p) if !p.trim().is_empty() => p,
            _ => return Err(AuthError::BadRequest(PASSWORD_REQUIRED.into())),
        };
        let len = new_password.chars().count();
        if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
            return Err(AuthError::BadRequest(PASSWORD_LENGTH_INVALID.into()));
        }

        let email = self.channel.exchange(token).await?;
        if email.trim().is_empty() {
            error!("Reset token exchange returned no account");
            return Err(AuthError::InternalError(
                "An error occurred while generating the token".into(),
            ));
        }

        self.credentials.update_password(&email, new_password).await?;
        info!("Password for {} was reset", email);
        Ok(())
    }
}
