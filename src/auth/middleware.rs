use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use log::debug;

use crate::auth::token::{resolve_bearer, AccessTokenCodec};
use crate::error::AppError;

/// Paths under the wrapped scope reachable without an access token.
const PUBLIC_PREFIXES: &[&str] = &["/api/auth/"];

/// Requires a valid access token on every request outside [`PUBLIC_PREFIXES`].
///
/// On success the decoded [`AccessClaims`](crate::auth::AccessClaims) are
/// stored in the request extensions for [`AuthenticatedUser`](crate::auth::AuthenticatedUser).
pub struct AuthMiddleware {
    codec: Arc<AccessTokenCodec>,
}

impl AuthMiddleware {
    pub fn new(codec: Arc<AccessTokenCodec>) -> Self {
        Self { codec }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            codec: self.codec.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    codec: Arc<AccessTokenCodec>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let path = req.path();
        if PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
            return Box::pin(self.service.call(req));
        }

        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(resolve_bearer)
            .map(str::to_owned);

        let Some(token) = token else {
            let app_err = AppError::Unauthorized("Missing token".into());
            return Box::pin(async move { Err(app_err.into()) });
        };

        match self.codec.decode(&token) {
            Ok(claims) => {
                debug!("Authenticated user {} for {}", claims.sub, req.path());
                req.extensions_mut().insert(claims);
                Box::pin(self.service.call(req))
            }
            Err(auth_err) => {
                let app_err = AppError::from(auth_err);
                Box::pin(async move { Err(app_err.into()) })
            }
        }
    }
}
