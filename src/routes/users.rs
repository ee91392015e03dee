use crate::{
    auth::{AuthenticatedUser, Credentials},
    error::AppError,
    models::{Role, UserProfile},
};
use actix_web::{delete, get, web, HttpResponse, Responder};
use log::info;

/// Returns the profile of the caller identified by the access token.
///
/// ## Responses:
/// - `200 OK`: `{id, username, roles}`.
/// - `401 Unauthorized`: missing or invalid access token.
/// - `404 Not Found`: the account was deleted after the token was issued.
#[get("/me")]
pub async fn me(
    user: AuthenticatedUser,
    credentials: web::Data<Credentials>,
) -> Result<impl Responder, AppError> {
    match credentials.find_by_id(user.id).await? {
        Some(account) => Ok(HttpResponse::Ok().json(UserProfile::from(&account))),
        None => Err(AppError::NotFound("User not found".into())),
    }
}

/// Deletes an account. Requires `ROLE_ADMIN`.
///
/// Refresh tokens held by the deleted account are left in place and are
/// rejected on their next use.
#[delete("/{id}")]
pub async fn delete_user(
    user: AuthenticatedUser,
    credentials: web::Data<Credentials>,
    user_id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    user.require_role(Role::Admin)?;
    let target = user_id.into_inner();

    if !credentials.delete(target).await? {
        return Err(AppError::NotFound("User not found".into()));
    }

    info!("User {} deleted by administrator {}", target, user.id);
    Ok(HttpResponse::NoContent().finish())
}
