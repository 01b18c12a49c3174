use axum::extract::State;
use axum::routing::{get, patch, post};
use axum::Router;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::database::manager;
use crate::handlers::{auth, reviews, tours, users};
use crate::middleware::MaybeUser;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(tour_routes())
        .merge(user_routes())
        .merge(review_routes())
        .with_state(state)
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn tour_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/tours",
            get(tours::list_tours).post(tours::create_tour),
        )
        .route("/api/v1/tours/top-5", get(tours::top_tours))
        .route("/api/v1/tours/stats", get(tours::tour_stats))
        .route("/api/v1/tours/monthly-plan/:year", get(tours::monthly_plan))
        .route(
            "/api/v1/tours/within/:distance/center/:latlng/unit/:unit",
            get(tours::tours_within),
        )
        .route(
            "/api/v1/tours/distances/:latlng/unit/:unit",
            get(tours::tour_distances),
        )
        .route(
            "/api/v1/tours/:tour_id",
            get(tours::get_tour)
                .patch(tours::update_tour)
                .delete(tours::delete_tour),
        )
        // Nested reviews, scoped to one tour
        .route(
            "/api/v1/tours/:tour_id/reviews",
            get(reviews::list_tour_reviews).post(reviews::create_tour_review),
        )
}

fn user_routes() -> Router<AppState> {
    Router::new()
        // Public auth surface
        .route("/api/v1/users/signup", post(auth::signup))
        .route("/api/v1/users/login", post(auth::login))
        .route("/api/v1/users/logout", get(auth::logout))
        .route("/api/v1/users/forgot-password", post(auth::forgot_password))
        .route(
            "/api/v1/users/reset-password/:token",
            patch(auth::reset_password),
        )
        // Session required
        .route("/api/v1/users/update-password", patch(auth::update_password))
        .route(
            "/api/v1/users/me",
            get(users::get_me)
                .patch(users::update_me)
                .delete(users::delete_me),
        )
        // Admin only (enforced by the role gate in each handler)
        .route("/api/v1/users", get(users::list_users))
        .route(
            "/api/v1/users/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
}

fn review_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/api/v1/reviews/:id",
            get(reviews::get_review)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        )
}

async fn root(MaybeUser(viewer): MaybeUser) -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "status": "success",
        "data": {
            "name": "Trailhead API",
            "version": version,
            "user": viewer.map(|u| u.name),
            "endpoints": {
                "tours": "/api/v1/tours",
                "users": "/api/v1/users",
                "reviews": "/api/v1/reviews",
                "health": "/health",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match manager::health_check(&state.db).await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "status": "success",
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "status": "error",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
