use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::{json, Value};

use super::crud;
use crate::database::models::{ReviewDraft, ReviewPatch, Role};
use crate::database::repository::Collection;
use crate::error::ApiError;
use crate::middleware::{restrict_to, ApiResponse, CurrentUser};
use crate::query::QueryParams;
use crate::state::AppState;

pub async fn list_reviews(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<ApiResponse, ApiError> {
    crud::list(&state.reviews(), &params, None).await
}

/// Reviews scoped to one tour, from the nested route.
pub async fn list_tour_reviews(
    State(state): State<AppState>,
    Path(tour_id): Path<String>,
    Query(params): Query<QueryParams>,
) -> Result<ApiResponse, ApiError> {
    let tour_id = crud::parse_id(&tour_id)?;
    crud::list(&state.reviews(), &params, Some(("tour_id", json!(tour_id)))).await
}

pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse, ApiError> {
    let id = crud::parse_id(&id)?;
    crud::get_one(&state.reviews(), id).await
}

pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<Value>,
) -> Result<ApiResponse, ApiError> {
    create(state, user, None, body).await
}

/// Nested creation: the tour id comes from the route.
pub async fn create_tour_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(tour_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<ApiResponse, ApiError> {
    let tour_id = crud::parse_id(&tour_id)?;
    create(state, user, Some(tour_id), body).await
}

async fn create(
    state: AppState,
    user: crate::database::models::User,
    tour_id: Option<uuid::Uuid>,
    body: Value,
) -> Result<ApiResponse, ApiError> {
    restrict_to(&user, &[Role::User])?;
    let mut draft: ReviewDraft = crud::decode_body(body)?;
    draft.tour_id = tour_id.or(draft.tour_id);
    // The author is always the authenticated identity, never the body.
    draft.user_id = Some(user.id);

    let store = state.reviews();
    let review = crud::create_one(&store, draft).await?;
    store.recalculate_tour_ratings(review.tour_id).await?;
    Ok(ApiResponse::created(review))
}

pub async fn update_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<ApiResponse, ApiError> {
    restrict_to(&user, &[Role::User, Role::Admin])?;
    let id = crud::parse_id(&id)?;
    let patch: ReviewPatch = crud::decode_body(body)?;

    let store = state.reviews();
    let review = crud::update_one(&store, id, patch).await?;
    store.recalculate_tour_ratings(review.tour_id).await?;
    Ok(ApiResponse::success(review))
}

pub async fn delete_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<ApiResponse, ApiError> {
    restrict_to(&user, &[Role::User, Role::Admin])?;
    let id = crud::parse_id(&id)?;

    let store = state.reviews();
    // The owning tour is needed for the recompute once the row is gone.
    let review = store.find_by_id(id).await?.ok_or_else(crud::not_found)?;
    let response = crud::delete_one(&store, id).await?;
    store.recalculate_tour_ratings(review.tour_id).await?;
    Ok(response)
}
