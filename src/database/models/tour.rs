use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ApiError;

pub const DIFFICULTIES: [&str; 3] = ["easy", "medium", "difficult"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
    pub ratings_average: f64,
    pub ratings_quantity: i64,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: String,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    pub start_lat: Option<f64>,
    pub start_lng: Option<f64>,
    pub start_address: Option<String>,
    pub start_description: Option<String>,
    pub guide_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub lock_version: i64,
}

impl Tour {
    pub const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "slug",
        "duration",
        "max_group_size",
        "difficulty",
        "ratings_average",
        "ratings_quantity",
        "price",
        "price_discount",
        "summary",
        "description",
        "image_cover",
        "images",
        "start_dates",
        "secret_tour",
        "start_lat",
        "start_lng",
        "start_address",
        "start_description",
        "guide_ids",
        "created_at",
        "lock_version",
    ];
}

/// The writable surface of a tour; used whole for create and, merged with
/// the current row, for update so both paths validate identically.
#[derive(Debug, Clone, Deserialize)]
pub struct TourAttributes {
    pub name: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
    pub price: f64,
    pub price_discount: Option<f64>,
    #[serde(default)]
    pub summary: String,
    pub description: String,
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub secret_tour: bool,
    pub start_lat: Option<f64>,
    pub start_lng: Option<f64>,
    pub start_address: Option<String>,
    pub start_description: Option<String>,
    #[serde(default)]
    pub guide_ids: Vec<Uuid>,
}

impl TourAttributes {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut messages = vec![];
        let name_len = self.name.trim().chars().count();
        if name_len < 10 {
            messages.push("a tour name must have >= 10 characters".to_string());
        }
        if name_len > 40 {
            messages.push("a tour name must have <= 40 characters".to_string());
        }
        if !DIFFICULTIES.contains(&self.difficulty.as_str()) {
            messages.push("difficulty must be either: easy, medium, difficult".to_string());
        }
        if self.duration <= 0 {
            messages.push("a tour must have a positive duration".to_string());
        }
        if self.max_group_size <= 0 {
            messages.push("a tour must have a positive group size".to_string());
        }
        if self.price <= 0.0 {
            messages.push("a tour must have a positive price".to_string());
        }
        if let Some(discount) = self.price_discount {
            if discount >= self.price {
                messages.push(format!(
                    "discount price ({}) should be lower than the price",
                    discount
                ));
            }
        }
        if self.description.trim().is_empty() {
            messages.push("a tour must have a description".to_string());
        }
        if self.image_cover.trim().is_empty() {
            messages.push("a tour must have an image cover".to_string());
        }
        if messages.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationFailed(messages))
        }
    }

    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

#[derive(Debug, Deserialize)]
pub struct TourPatch {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<String>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
    pub start_lat: Option<f64>,
    pub start_lng: Option<f64>,
    pub start_address: Option<String>,
    pub start_description: Option<String>,
    pub guide_ids: Option<Vec<Uuid>>,
}

impl TourPatch {
    /// Overlays the patch onto the current row, yielding the full attribute
    /// set so update re-validates exactly as create does.
    pub fn merge_into(self, current: &Tour) -> TourAttributes {
        TourAttributes {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            duration: self.duration.unwrap_or(current.duration),
            max_group_size: self.max_group_size.unwrap_or(current.max_group_size),
            difficulty: self.difficulty.unwrap_or_else(|| current.difficulty.clone()),
            price: self.price.unwrap_or(current.price),
            price_discount: self.price_discount.or(current.price_discount),
            summary: self.summary.unwrap_or_else(|| current.summary.clone()),
            description: self.description.unwrap_or_else(|| current.description.clone()),
            image_cover: self.image_cover.unwrap_or_else(|| current.image_cover.clone()),
            images: self.images.unwrap_or_else(|| current.images.clone()),
            start_dates: self.start_dates.unwrap_or_else(|| current.start_dates.clone()),
            secret_tour: self.secret_tour.unwrap_or(current.secret_tour),
            start_lat: self.start_lat.or(current.start_lat),
            start_lng: self.start_lng.or(current.start_lng),
            start_address: self.start_address.or_else(|| current.start_address.clone()),
            start_description: self
                .start_description
                .or_else(|| current.start_description.clone()),
            guide_ids: self.guide_ids.unwrap_or_else(|| current.guide_ids.clone()),
        }
    }
}

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes() -> TourAttributes {
        TourAttributes {
            name: "The Forest Hiker".to_string(),
            duration: 5,
            max_group_size: 25,
            difficulty: "easy".to_string(),
            price: 397.0,
            price_discount: None,
            summary: "Breathtaking hike".to_string(),
            description: "A lovely walk through the woods".to_string(),
            image_cover: "tour-1-cover.jpg".to_string(),
            images: vec![],
            start_dates: vec![],
            secret_tour: false,
            start_lat: None,
            start_lng: None,
            start_address: None,
            start_description: None,
            guide_ids: vec![],
        }
    }

    #[test]
    fn valid_attributes_pass() {
        assert!(attributes().validate().is_ok());
    }

    #[test]
    fn name_length_bounds() {
        let mut a = attributes();
        a.name = "Too short".to_string();
        assert!(a.validate().is_err());
        a.name = "x".repeat(41);
        assert!(a.validate().is_err());
    }

    #[test]
    fn difficulty_must_be_in_closed_set() {
        let mut a = attributes();
        a.difficulty = "extreme".to_string();
        let err = a.validate().unwrap_err();
        assert!(err
            .message()
            .contains("difficulty must be either: easy, medium, difficult"));
    }

    #[test]
    fn discount_must_undercut_price() {
        let mut a = attributes();
        a.price_discount = Some(400.0);
        assert!(a.validate().is_err());
        a.price_discount = Some(300.0);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("The Forest Hiker"), "the-forest-hiker");
        assert_eq!(slugify("  Sea & Sky!  "), "sea-sky");
    }
}
