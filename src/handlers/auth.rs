use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use super::crud;
use crate::database::models::user::{validate_new_password, validate_signup};
use crate::database::models::{Role, User, UserDraft};
use crate::database::repository::Collection;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, CurrentUser};
use crate::state::AppState;
use crate::token::TokenService;

const BCRYPT_COST: u32 = 12;

// A real-looking hash keeps verification time flat when the email is
// unknown, so responses do not reveal which accounts exist.
const DUMMY_HASH: &str = "$2b$12$C6UzMDM.H6dfI/f/IKcEeO5cE3lqqlXUoCmOr6hLrmbVpGSsvBO9K";

#[derive(Debug, Deserialize)]
struct SignupRequest {
    name: String,
    email: String,
    password: String,
    password_confirm: String,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let req: SignupRequest = crud::decode_body(body)?;
    validate_signup(&req.name, &req.email, &req.password, &req.password_confirm)?;

    let password_hash = bcrypt::hash(&req.password, BCRYPT_COST).map_err(ApiError::unexpected)?;
    let user = state
        .users()
        .create(UserDraft {
            name: req.name,
            email: req.email,
            photo: "default.jpg".to_string(),
            role: Role::User,
            password_hash,
        })
        .await?;

    // Welcome mail is best-effort; a broken relay must not block signup.
    if let Err(err) = state.mailer.send_welcome(&user.email, &user.name).await {
        tracing::warn!(email = %user.email, error = %err, "welcome email failed");
    }

    send_session(&state, user, StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let req: LoginRequest = crud::decode_body(body)?;
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(ApiError::ValidationFailed(vec![
            "please enter email and password".to_string(),
        ]));
    };

    let user = state.users().find_by_email(&email).await?;
    let Some(user) = user else {
        // Burn a verification anyway; see DUMMY_HASH.
        let _ = bcrypt::verify(&password, DUMMY_HASH);
        return Err(incorrect_credentials());
    };

    if !bcrypt::verify(&password, &user.password).map_err(ApiError::unexpected)? {
        return Err(incorrect_credentials());
    }

    send_session(&state, user, StatusCode::OK)
}

pub async fn logout(State(state): State<AppState>) -> Result<Response, ApiError> {
    let mut response = ApiResponse::ok().into_response();
    append_cookie(&mut response, &state.tokens.logout_cookie())?;
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct ForgotPasswordRequest {
    email: String,
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<ApiResponse, ApiError> {
    let req: ForgotPasswordRequest = crud::decode_body(body)?;
    let user = state
        .users()
        .find_by_email(&req.email)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("there is no user corresponding to this email".to_string())
        })?;

    // New token overwrites any outstanding one; only its hash is stored.
    let reset = state.tokens.new_reset_token();
    state
        .users()
        .set_reset_token(user.id, &reset.hash, reset.expires_at)
        .await?;

    if let Err(err) = state
        .mailer
        .send_password_reset(&user.email, &user.name, &reset.plaintext)
        .await
    {
        // The token is useless if it never reached the user; remove it so
        // a later attempt starts clean.
        state.users().clear_reset_token(user.id).await?;
        return Err(ApiError::unexpected(err));
    }

    Ok(ApiResponse::message("token sent to email"))
}

#[derive(Debug, Deserialize)]
struct ResetPasswordRequest {
    password: String,
    password_confirm: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let req: ResetPasswordRequest = crud::decode_body(body)?;

    // One lookup covers both "unknown" and "expired"; callers cannot tell
    // which failed.
    let hash = TokenService::hash_reset_token(&token);
    let user = state
        .users()
        .find_by_reset_hash(&hash)
        .await?
        .ok_or(ApiError::TokenInvalid)?;

    validate_new_password(&req.password, &req.password_confirm)?;
    let password_hash = bcrypt::hash(&req.password, BCRYPT_COST).map_err(ApiError::unexpected)?;
    // Also clears the stored hash and expiry: the token is single-use.
    state.users().set_password(user.id, &password_hash).await?;

    send_session(&state, user, StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct UpdatePasswordRequest {
    current_password: String,
    password: String,
    password_confirm: String,
}

pub async fn update_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let req: UpdatePasswordRequest = crud::decode_body(body)?;

    if !bcrypt::verify(&req.current_password, &user.password).map_err(ApiError::unexpected)? {
        return Err(ApiError::NoCredential("your current password is wrong".to_string()));
    }

    validate_new_password(&req.password, &req.password_confirm)?;
    let password_hash = bcrypt::hash(&req.password, BCRYPT_COST).map_err(ApiError::unexpected)?;
    state.users().set_password(user.id, &password_hash).await?;

    // Older tokens are now stale; hand back a fresh session.
    send_session(&state, user, StatusCode::OK)
}

fn incorrect_credentials() -> ApiError {
    ApiError::NoCredential("incorrect email or password".to_string())
}

/// Issues a session token and delivers it twice: in the body and as the
/// http-only cookie.
fn send_session(state: &AppState, user: User, status: StatusCode) -> Result<Response, ApiError> {
    let token = state.tokens.issue(user.id)?;
    let cookie = state.tokens.session_cookie(&token);
    let mut response = ApiResponse::session(status, &token, &user).into_response();
    append_cookie(&mut response, &cookie)?;
    Ok(response)
}

fn append_cookie(response: &mut Response, cookie: &str) -> Result<(), ApiError> {
    let value = HeaderValue::from_str(cookie).map_err(ApiError::unexpected)?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(())
}
