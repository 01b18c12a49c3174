use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::Value;

use super::crud;
use crate::database::models::{Role, TourAttributes, TourPatch};
use crate::error::ApiError;
use crate::middleware::{restrict_to, ApiResponse, CurrentUser};
use crate::query::QueryParams;
use crate::state::AppState;

pub async fn list_tours(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<ApiResponse, ApiError> {
    crud::list(&state.tours(), &params, None).await
}

/// Canned listing: the five cheapest of the best-rated tours, trimmed to
/// the fields the overview cards need.
pub async fn top_tours(
    State(state): State<AppState>,
    Query(mut params): Query<QueryParams>,
) -> Result<ApiResponse, ApiError> {
    params.insert("limit".to_string(), "5".to_string());
    params.insert("sort".to_string(), "price,-ratings_average".to_string());
    params.insert(
        "fields".to_string(),
        "name,price,ratings_average,summary,difficulty".to_string(),
    );
    crud::list(&state.tours(), &params, None).await
}

pub async fn get_tour(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse, ApiError> {
    let id = crud::parse_id(&id)?;
    match state.tours().find_detail(id).await? {
        Some(detail) => Ok(ApiResponse::success(detail)),
        None => Err(crud::not_found()),
    }
}

pub async fn create_tour(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<Value>,
) -> Result<ApiResponse, ApiError> {
    restrict_to(&user, &[Role::Admin, Role::LeadGuide])?;
    let draft: TourAttributes = crud::decode_body(body)?;
    let tour = crud::create_one(&state.tours(), draft).await?;
    Ok(ApiResponse::created(tour))
}

pub async fn update_tour(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<ApiResponse, ApiError> {
    restrict_to(&user, &[Role::Admin, Role::LeadGuide])?;
    let id = crud::parse_id(&id)?;
    let patch: TourPatch = crud::decode_body(body)?;
    let tour = crud::update_one(&state.tours(), id, patch).await?;
    Ok(ApiResponse::success(tour))
}

pub async fn delete_tour(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<ApiResponse, ApiError> {
    restrict_to(&user, &[Role::Admin, Role::LeadGuide])?;
    let id = crud::parse_id(&id)?;
    crud::delete_one(&state.tours(), id).await
}

pub async fn tour_stats(State(state): State<AppState>) -> Result<ApiResponse, ApiError> {
    let stats = state.tours().stats().await?;
    Ok(ApiResponse::list(&stats))
}

pub async fn monthly_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(year): Path<String>,
) -> Result<ApiResponse, ApiError> {
    restrict_to(&user, &[Role::Admin, Role::LeadGuide, Role::Guide])?;
    let year: i32 = year.parse().map_err(|_| ApiError::InvalidField {
        field: "year".to_string(),
        value: year.clone(),
    })?;
    let plan = state.tours().monthly_plan(year).await?;
    Ok(ApiResponse::list(&plan))
}

pub async fn tours_within(
    State(state): State<AppState>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> Result<ApiResponse, ApiError> {
    let distance: f64 = distance.parse().map_err(|_| ApiError::InvalidField {
        field: "distance".to_string(),
        value: distance.clone(),
    })?;
    let (lat, lng) = parse_latlng(&latlng)?;
    let tours = state.tours().within(distance, lat, lng, &unit).await?;
    Ok(ApiResponse::list(&tours))
}

pub async fn tour_distances(
    State(state): State<AppState>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<ApiResponse, ApiError> {
    let (lat, lng) = parse_latlng(&latlng)?;
    let distances = state.tours().distances(lat, lng, &unit).await?;
    Ok(ApiResponse::list(&distances))
}

fn parse_latlng(raw: &str) -> Result<(f64, f64), ApiError> {
    let invalid = || ApiError::InvalidField {
        field: "latlng".to_string(),
        value: format!("{} (expected lat,lng)", raw),
    };
    let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    Ok((lat, lng))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latlng_parsing() {
        assert_eq!(parse_latlng("34.1,-118.1").unwrap(), (34.1, -118.1));
        assert!(parse_latlng("34.1").is_err());
        assert!(parse_latlng("north,west").is_err());
    }
}
