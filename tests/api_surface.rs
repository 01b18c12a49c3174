use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use trailhead_api::config::AppConfig;
use trailhead_api::routes;
use trailhead_api::services::email::Mailer;
use trailhead_api::state::AppState;

// These tests drive the assembled router in-process. They cover the parts
// of the surface that resolve before any database access, so the lazily
// connecting pool never needs a server behind it.

fn test_app() -> Result<Router> {
    let mut config = AppConfig::from_env();
    config.email.file_outbox = Some(std::env::temp_dir().display().to_string());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgres://localhost/trailhead_test")?;
    let mailer = Mailer::new(&config.email)?;
    Ok(routes::app(AppState::new(pool, config, mailer)))
}

async fn body_json(response: axum::response::Response) -> Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn root_serves_anonymous_requests() -> Result<()> {
    let res = test_app()?
        .oneshot(Request::builder().uri("/").body(Body::empty())?)
        .await?;

    assert_eq!(res.status(), StatusCode::OK);
    let payload = body_json(res).await?;
    assert_eq!(payload["status"], "success");
    assert!(payload["data"]["user"].is_null(), "expected no user: {}", payload);
    Ok(())
}

#[tokio::test]
async fn protected_route_without_credential_is_401() -> Result<()> {
    let res = test_app()?
        .oneshot(Request::builder().uri("/api/v1/users/me").body(Body::empty())?)
        .await?;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let payload = body_json(res).await?;
    assert_eq!(payload["status"], "fail");
    assert_eq!(payload["message"], "you are not logged in");
    Ok(())
}

#[tokio::test]
async fn tour_mutation_without_credential_is_401() -> Result<()> {
    let request = Request::builder()
        .method("PATCH")
        .uri("/api/v1/tours/2ac1bbdc-8a07-43b7-9788-e473b1beabae")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "price": 1.0 }).to_string()))?;
    let res = test_app()?.oneshot(request).await?;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn malformed_tour_id_is_400() -> Result<()> {
    let res = test_app()?
        .oneshot(
            Request::builder()
                .uri("/api/v1/tours/not-a-uuid")
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let payload = body_json(res).await?;
    assert_eq!(payload["status"], "fail");
    assert_eq!(payload["message"], "invalid id: not-a-uuid");
    Ok(())
}

#[tokio::test]
async fn signup_with_mismatched_passwords_is_400() -> Result<()> {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/users/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "name": "Alice",
                "email": "alice@example.com",
                "password": "password123",
                "password_confirm": "password124",
            })
            .to_string(),
        ))?;
    let res = test_app()?.oneshot(request).await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let payload = body_json(res).await?;
    assert_eq!(payload["status"], "fail");
    assert!(
        payload["message"]
            .as_str()
            .unwrap_or_default()
            .contains("not the same"),
        "unexpected message: {}",
        payload
    );
    Ok(())
}

#[tokio::test]
async fn logout_overwrites_the_session_cookie() -> Result<()> {
    let res = test_app()?
        .oneshot(
            Request::builder()
                .uri("/api/v1/users/logout")
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(res.status(), StatusCode::OK);
    let cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("jwt=loggedout"), "unexpected cookie: {}", cookie);
    Ok(())
}
