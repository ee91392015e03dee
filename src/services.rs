//! Assembles the authentication services from configuration and stores.
//!
//! The binary and the integration tests build an [`AppServices`] once and
//! share it across workers; handlers receive the pieces through `web::Data`.

use std::sync::Arc;

use actix_web::web;
use log::info;

use crate::auth::{
    AccessTokenCodec, AuthError, AuthMiddleware, Credentials, LocalResetChannel,
    PasswordResetBridge, ResetNotifier, TokenService, TokenTtl,
};
use crate::config::{AdminSeed, Config};
use crate::store::{CredentialStore, RefreshTokenStore};

#[derive(Clone)]
pub struct AppServices {
    pub codec: Arc<AccessTokenCodec>,
    pub credentials: Arc<Credentials>,
    pub tokens: Arc<TokenService>,
    pub resets: Arc<PasswordResetBridge>,
}

impl AppServices {
    pub fn build(
        config: &Config,
        users: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        notifier: Arc<dyn ResetNotifier>,
    ) -> Result<Self, AuthError> {
        let codec = Arc::new(AccessTokenCodec::new(&config.signing_key));
        let credentials = Arc::new(Credentials::new(
            users,
            config.bcrypt_cost,
            config.store_timeout,
        )?);

        let tokens = Arc::new(TokenService::new(
            codec.clone(),
            refresh_tokens,
            credentials.clone(),
            TokenTtl {
                access: config.access_token_ttl,
                refresh: config.refresh_token_ttl,
            },
            config.store_timeout,
        ));

        let channel = Arc::new(LocalResetChannel::new(
            credentials.clone(),
            notifier,
            config.reset_token_ttl,
        ));
        let resets = Arc::new(PasswordResetBridge::new(channel, credentials.clone()));

        Ok(Self {
            codec,
            credentials,
            tokens,
            resets,
        })
    }

    /// Creates the configured administrator account if it is missing.
    pub async fn seed_admin(&self, seed: Option<&AdminSeed>) -> Result<(), AuthError> {
        match seed {
            Some(seed) => {
                self.credentials
                    .ensure_admin(&seed.username, &seed.password)
                    .await?;
                Ok(())
            }
            None => {
                info!("No administrator account configured");
                Ok(())
            }
        }
    }

    pub fn auth_middleware(&self) -> AuthMiddleware {
        AuthMiddleware::new(self.codec.clone())
    }

    /// Registers the shared services as application data.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::from(self.tokens.clone()))
            .app_data(web::Data::from(self.credentials.clone()))
            .app_data(web::Data::from(self.resets.clone()));
    }
}
