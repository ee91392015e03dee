use crate::{
    auth::{
        Credentials, ForgotPasswordRequest, LoginRequest, PasswordResetBridge, RegisterRequest,
        RegisterResponse, TokenService,
    },
    error::AppError,
};
use actix_web::{post, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

/// Header carrying the refresh token on `/token` and `/logout`.
pub const REFRESH_TOKEN_HEADER: &str = "token";

fn client_ip(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string()
}

fn refresh_header(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
}

/// Register a new user
///
/// Creates an account with `ROLE_USER`. The username must be an email address.
#[post("/register")]
pub async fn register(
    credentials: web::Data<Credentials>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;

    let user = credentials
        .register(&register_data.username, &register_data.password)
        .await?;

    Ok(HttpResponse::Created().json(RegisterResponse {
        user_id: user.id,
        username: user.username,
    }))
}

/// Login user
///
/// Returns an access/refresh token pair. Unknown usernames and wrong
/// passwords get the same 404.
#[post("/login")]
pub async fn login(
    tokens: web::Data<TokenService>,
    login_data: web::Json<LoginRequest>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let pair = tokens
        .login(&login_data.username, &login_data.password, &client_ip(&req))
        .await?;
    Ok(HttpResponse::Ok().json(pair))
}

/// Exchange a refresh token for a new token pair
///
/// The presented token is consumed; presenting it again fails with 400.
#[post("/token")]
pub async fn refresh(
    tokens: web::Data<TokenService>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let pair = tokens.refresh(refresh_header(&req), &client_ip(&req)).await?;
    Ok(HttpResponse::Ok().json(pair))
}

#[post("/logout")]
pub async fn logout(
    tokens: web::Data<TokenService>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    tokens.logout(refresh_header(&req).unwrap_or("")).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Logged out" })))
}

/// Start a password reset
///
/// Always answers 200 for well-formed addresses, whether or not an account exists.
#[post("/password/forgot")]
pub async fn forgot_password(
    resets: web::Data<PasswordResetBridge>,
    forgot_data: web::Json<ForgotPasswordRequest>,
) -> Result<impl Responder, AppError> {
    forgot_data.validate()?;

    resets.request_reset(&forgot_data.email).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "If the account exists, a reset link has been sent"
    })))
}

#[derive(Debug, Deserialize)]
pub struct ResetQuery {
    pub token: Option<String>,
}

/// Complete a password reset
///
/// The body is read leniently so that a missing or malformed body reports
/// "Password is required" rather than a JSON parse error.
#[post("/password/reset")]
pub async fn reset_password(
    resets: web::Data<PasswordResetBridge>,
    query: web::Query<ResetQuery>,
    body: web::Bytes,
) -> Result<impl Responder, AppError> {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let password = body.get("password").and_then(Value::as_str);

    resets.redeem(query.token.as_deref(), password).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Password has been reset" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    #[actix_rt::test]
    async fn test_client_ip_prefers_forwarded_header() {
        let req = test::TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.9"))
            .to_http_request();
        assert_eq!(client_ip(&req), "203.0.113.9");

        let bare = test::TestRequest::default().to_http_request();
        assert_eq!(client_ip(&bare), "unknown");
    }
}
