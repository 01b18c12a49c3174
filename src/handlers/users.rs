use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use super::crud;
use crate::database::models::{Role, UserPatch};
use crate::error::ApiError;
use crate::middleware::{restrict_to, ApiResponse, CurrentUser};
use crate::query::QueryParams;
use crate::state::AppState;

// Self-service -------------------------------------------------------------

pub async fn get_me(
    CurrentUser(user): CurrentUser,
) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse::success(user))
}

#[derive(Debug, Deserialize)]
struct UpdateMeRequest {
    name: Option<String>,
    email: Option<String>,
}

/// Profile update with a hard whitelist: only name and email. Password
/// changes must go through the dedicated flow so `password_changed_at`
/// bookkeeping cannot be skipped.
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<Value>,
) -> Result<ApiResponse, ApiError> {
    if body.get("password").is_some() || body.get("password_confirm").is_some() {
        return Err(ApiError::ValidationFailed(vec![
            "this route is not for password updates; please use /update-password".to_string(),
        ]));
    }
    let req: UpdateMeRequest = crud::decode_body(body)?;
    let updated = state
        .users()
        .update_profile(user.id, req.name.as_deref(), req.email.as_deref())
        .await?
        .ok_or_else(crud::not_found)?;
    Ok(ApiResponse::success(updated))
}

/// Soft delete: the account is deactivated, not removed.
pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ApiResponse, ApiError> {
    state.users().deactivate(user.id).await?;
    Ok(ApiResponse::no_content())
}

// Admin --------------------------------------------------------------------

pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<QueryParams>,
) -> Result<ApiResponse, ApiError> {
    restrict_to(&user, &[Role::Admin])?;
    crud::list(&state.users(), &params, None).await
}

pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<ApiResponse, ApiError> {
    restrict_to(&user, &[Role::Admin])?;
    let id = crud::parse_id(&id)?;
    crud::get_one(&state.users(), id).await
}

pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<ApiResponse, ApiError> {
    restrict_to(&user, &[Role::Admin])?;
    let id = crud::parse_id(&id)?;
    let patch: UserPatch = crud::decode_body(body)?;
    let updated = crud::update_one(&state.users(), id, patch).await?;
    Ok(ApiResponse::success(updated))
}

pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<ApiResponse, ApiError> {
    restrict_to(&user, &[Role::Admin])?;
    let id = crud::parse_id(&id)?;
    crud::delete_one(&state.users(), id).await
}
