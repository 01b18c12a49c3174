use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};

use crate::database::models::{Role, User};
use crate::database::repository::Collection;
use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated identity, resolved by extraction on protected
/// handlers. Extraction rejects the request outright on any failure:
/// missing credential, bad signature, expired token, vanished subject or a
/// password change newer than the token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Non-blocking variant: the same resolution, but every failure simply
/// yields an anonymous request. Never rejects.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        authenticate(state, &parts.headers).await.map(CurrentUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        Ok(MaybeUser(authenticate(state, &parts.headers).await.ok()))
    }
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    // 1) credential: bearer header first, then the session cookie
    let token = extract_token(headers, state.tokens.cookie_name())
        .ok_or_else(|| ApiError::NoCredential("you are not logged in".to_string()))?;

    // 2) signature and expiry
    let claims = state.tokens.verify(&token)?;

    // 3) the subject must still exist (and not be soft-deleted)
    let user = state
        .users()
        .find_by_id(claims.sub)
        .await?
        .ok_or(ApiError::SubjectGone)?;

    // 4) a password change after issuance kills every older token
    if user.changed_password_after(claims.iat) {
        return Err(ApiError::StaleToken);
    }

    Ok(user)
}

/// Pure role gate, composed explicitly into each restricted route. Roles
/// are matched verbatim; there is no hierarchy.
pub fn restrict_to(user: &User, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&user.role()) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            if !token.trim().is_empty() {
                return Some(token.trim().to_string());
            }
        }
    }
    cookie_value(headers, cookie_name)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    for cookie in raw.split(';') {
        if let Some((key, value)) = cookie.trim().split_once('=') {
            if key == name && !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::services::email::Mailer;
    use axum::http::HeaderValue;
    use chrono::Utc;
    use uuid::Uuid;

    fn user_with_role(role: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            photo: "default.jpg".to_string(),
            role: role.to_string(),
            password: "$2b$12$hash".to_string(),
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
            lock_version: 0,
        }
    }

    // A lazily connecting pool never touches the network for these paths;
    // both guards fail before any subject lookup.
    fn test_state() -> AppState {
        let mut config = AppConfig::from_env();
        config.email.file_outbox = Some(std::env::temp_dir().display().to_string());
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/trailhead_test")
            .expect("lazy pool");
        let mailer = Mailer::new(&config.email).expect("mailer");
        AppState::new(pool, config, mailer)
    }

    #[test]
    fn role_gate_is_checked_verbatim() {
        let standard = user_with_role("user");
        let admin = user_with_role("admin");
        let allowed = [Role::Admin, Role::LeadGuide];
        assert!(matches!(
            restrict_to(&standard, &allowed),
            Err(ApiError::Forbidden)
        ));
        assert!(restrict_to(&admin, &allowed).is_ok());
        // A guide is not a lead guide; no hierarchy inference.
        let guide = user_with_role("guide");
        assert!(restrict_to(&guide, &allowed).is_err());
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer header-token"),
        );
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("jwt=cookie-token; theme=dark"),
        );
        assert_eq!(extract_token(&headers, "jwt").as_deref(), Some("header-token"));
    }

    #[test]
    fn cookie_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; jwt=cookie-token"),
        );
        assert_eq!(extract_token(&headers, "jwt").as_deref(), Some("cookie-token"));
    }

    #[test]
    fn absent_credentials_yield_none() {
        let headers = HeaderMap::new();
        assert!(extract_token(&headers, "jwt").is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_token(&headers, "jwt").is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_token(&headers, "jwt").is_none());
    }

    #[tokio::test]
    async fn missing_credential_rejects() {
        let state = test_state();
        let err = authenticate(&state, &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::NoCredential(_)));
    }

    #[tokio::test]
    async fn forged_token_rejects_before_subject_lookup() {
        let state = test_state();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer not.a.token"),
        );
        let err = authenticate(&state, &headers).await.unwrap_err();
        assert!(matches!(err, ApiError::TokenInvalid));
    }

    #[tokio::test]
    async fn non_blocking_variant_never_rejects() {
        let state = test_state();
        let request = axum::http::Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, "Bearer not.a.token")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts, &state)
            .await
            .expect("maybe_user is infallible");
        assert!(user.is_none());
    }
}
