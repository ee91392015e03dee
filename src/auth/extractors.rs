use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::token::AccessClaims;
use crate::auth::AuthError;
use crate::error::AppError;
use crate::models::Role;

/// The caller identified by the access token, as decoded by `AuthMiddleware`.
///
/// Only usable on routes behind `AuthMiddleware`; elsewhere the extensions
/// hold no claims and extraction fails with 401.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub id: i32,
    pub roles: Vec<Role>,
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden.into())
        }
    }
}

impl From<&AccessClaims> for AuthenticatedUser {
    fn from(claims: &AccessClaims) -> Self {
        Self {
            id: claims.subject_id(),
            roles: claims.roles().to_vec(),
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<AccessClaims>() {
            Some(claims) => ready(Ok(AuthenticatedUser::from(claims))),
            None => {
                let err = AppError::Unauthorized(AuthError::TokenInvalid.to_string());
                ready(Err(err.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::dev::Payload;
    use actix_web::http::StatusCode;
    use actix_web::test;

    fn claims(sub: i32, roles: Vec<Role>) -> AccessClaims {
        AccessClaims {
            sub,
            roles,
            iat: 0,
            exp: 0,
        }
    }

    #[actix_rt::test]
    async fn test_authenticated_user_extractor_success() {
        let req = test::TestRequest::default().to_http_request();
        req.extensions_mut()
            .insert(claims(123, vec![Role::User, Role::Admin]));

        let mut payload = Payload::None;
        let user = AuthenticatedUser::from_request(&req, &mut payload)
            .await
            .unwrap();
        assert_eq!(user.id, 123);
        assert!(user.has_role(Role::Admin));
    }

    #[actix_rt::test]
    async fn test_authenticated_user_extractor_failure() {
        let req = test::TestRequest::default().to_http_request();

        let mut payload = Payload::None;
        let result = AuthenticatedUser::from_request(&req, &mut payload).await;
        assert!(result.is_err());

        let response = result.unwrap_err().error_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn test_require_role() {
        let user = AuthenticatedUser::from(&claims(7, vec![Role::User]));
        assert!(user.require_role(Role::User).is_ok());

        let denied = user.require_role(Role::Admin).unwrap_err();
        assert!(matches!(denied, AppError::Forbidden(_)));
    }
}
