use serde_json::Value;
use uuid::Uuid;

use crate::database::repository::Collection;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::query::QueryParams;

/// Generic operation templates shared by every resource. List and get
/// never mutate; create, update and delete are the only mutating entry
/// points, and update re-validates through the collection exactly as
/// create does.

/// List documents, optionally pre-filtered by a parent-resource id taken
/// from the route. All remaining parameter interpretation is the query
/// builder's.
pub async fn list<C: Collection>(
    collection: &C,
    params: &QueryParams,
    scope: Option<(&str, Value)>,
) -> Result<ApiResponse, ApiError> {
    let docs = collection.find(params, scope).await?;
    Ok(ApiResponse::list(&docs))
}

pub async fn get_one<C: Collection>(collection: &C, id: Uuid) -> Result<ApiResponse, ApiError> {
    match collection.find_by_id(id).await? {
        Some(entity) => Ok(ApiResponse::success(entity)),
        None => Err(not_found()),
    }
}

/// Returns the created entity so resource handlers can run their post-write
/// hooks before shaping the response.
pub async fn create_one<C: Collection>(
    collection: &C,
    draft: C::Draft,
) -> Result<C::Entity, ApiError> {
    collection.create(draft).await
}

pub async fn update_one<C: Collection>(
    collection: &C,
    id: Uuid,
    patch: C::Patch,
) -> Result<C::Entity, ApiError> {
    collection.update_by_id(id, patch).await?.ok_or_else(not_found)
}

pub async fn delete_one<C: Collection>(collection: &C, id: Uuid) -> Result<ApiResponse, ApiError> {
    if collection.delete_by_id(id).await? {
        Ok(ApiResponse::no_content())
    } else {
        Err(not_found())
    }
}

pub fn not_found() -> ApiError {
    ApiError::NotFound("no document found".to_string())
}

/// Parses a route id, reporting malformed values the same way a failed
/// database cast would.
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidField {
        field: "id".to_string(),
        value: raw.to_string(),
    })
}

/// Decodes a JSON body into a typed payload, routing shape errors through
/// the validation taxonomy instead of the framework's rejection.
pub fn decode_body<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::ValidationFailed(vec![e.to_string()]))
}
