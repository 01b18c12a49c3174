use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ApiError;

pub const MAX_REVIEW_LENGTH: usize = 500;

/// A review row as served to clients, read from the `reviews_with_author`
/// view so the author's public fields ride along without a second query.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub body: String,
    pub rating: i32,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub lock_version: i64,
    pub author_name: String,
    pub author_photo: String,
}

impl Review {
    pub const VIEW: &'static str = "reviews_with_author";

    pub const COLUMNS: &'static [&'static str] = &[
        "id",
        "body",
        "rating",
        "tour_id",
        "user_id",
        "created_at",
        "lock_version",
        "author_name",
        "author_photo",
    ];
}

#[derive(Debug, Deserialize)]
pub struct ReviewDraft {
    #[serde(alias = "review")]
    pub body: String,
    pub rating: i32,
    pub tour_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl ReviewDraft {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_fields(&self.body, self.rating)
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewPatch {
    #[serde(alias = "review")]
    pub body: Option<String>,
    pub rating: Option<i32>,
}

impl ReviewPatch {
    pub fn validate_against(&self, current: &Review) -> Result<(), ApiError> {
        let body = self.body.as_deref().unwrap_or(&current.body);
        let rating = self.rating.unwrap_or(current.rating);
        validate_fields(body, rating)
    }
}

fn validate_fields(body: &str, rating: i32) -> Result<(), ApiError> {
    let mut messages = vec![];
    if body.trim().is_empty() {
        messages.push("a review cannot be empty".to_string());
    }
    if body.chars().count() > MAX_REVIEW_LENGTH {
        messages.push("a review cannot be more than 500 characters".to_string());
    }
    if !(1..=5).contains(&rating) {
        messages.push("a rating must be between 1 and 5".to_string());
    }
    if messages.is_empty() {
        Ok(())
    } else {
        Err(ApiError::ValidationFailed(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        assert!(validate_fields("great tour", 1).is_ok());
        assert!(validate_fields("great tour", 5).is_ok());
        assert!(validate_fields("great tour", 0).is_err());
        assert!(validate_fields("great tour", 6).is_err());
    }

    #[test]
    fn body_rules() {
        assert!(validate_fields("", 4).is_err());
        assert!(validate_fields(&"x".repeat(501), 4).is_err());
        assert!(validate_fields(&"x".repeat(500), 4).is_ok());
    }
}
