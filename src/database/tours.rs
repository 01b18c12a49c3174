use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::database::models::{Review, Tour, TourAttributes, TourPatch, User};
use crate::database::repository::Collection;
use crate::database::users::UserStore;
use crate::error::ApiError;
use crate::query::ListQuery;

/// Great-circle distance in kilometres from ($1, $2) to a tour's start
/// point. `least(1.0, ...)` guards acos against floating-point overshoot.
const HAVERSINE_KM: &str = "6371 * acos(least(1.0, \
    cos(radians($1)) * cos(radians(start_lat)) * cos(radians(start_lng) - radians($2)) \
    + sin(radians($1)) * sin(radians(start_lat))))";

const MILES_PER_KM: f64 = 0.621371;

/// A tour with its related entities expanded for detail responses.
#[derive(Debug, Serialize)]
pub struct TourDetail {
    #[serde(flatten)]
    pub tour: Tour,
    pub guides: Vec<User>,
    pub reviews: Vec<Review>,
}

/// Tour persistence. Secret tours are filtered out of every public read by
/// an explicit `secret_tour = FALSE` predicate.
#[derive(Clone)]
pub struct TourStore {
    pool: PgPool,
}

impl TourStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Detail fetch with guides and reviews eagerly expanded.
    pub async fn find_detail(&self, id: Uuid) -> Result<Option<TourDetail>, ApiError> {
        let Some(tour) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let guides = UserStore::new(self.pool.clone())
            .find_many(&tour.guide_ids)
            .await?;
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews_with_author WHERE tour_id = $1 ORDER BY created_at DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(TourDetail { tour, guides, reviews }))
    }

    /// Per-difficulty aggregates over well-rated tours.
    pub async fn stats(&self) -> Result<Vec<Value>, ApiError> {
        let rows = sqlx::query(
            "SELECT row_to_json(t) AS row FROM ( \
               SELECT upper(difficulty) AS difficulty, \
                      count(*) AS num_tours, \
                      avg(ratings_average) AS avg_rating, \
                      avg(price) AS avg_price, \
                      min(price) AS min_price, \
                      max(price) AS max_price \
               FROM tours \
               WHERE ratings_average >= 4.5 AND secret_tour = FALSE \
               GROUP BY difficulty \
               ORDER BY avg_price \
             ) t",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get::<Value, _>("row").map_err(ApiError::from))
            .collect()
    }

    /// Departure counts per month for one calendar year, busiest first.
    pub async fn monthly_plan(&self, year: i32) -> Result<Vec<Value>, ApiError> {
        let from = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single().ok_or_else(|| {
            ApiError::InvalidField {
                field: "year".to_string(),
                value: year.to_string(),
            }
        })?;
        let to = Utc.with_ymd_and_hms(year, 12, 31, 23, 59, 59).single().ok_or_else(|| {
            ApiError::InvalidField {
                field: "year".to_string(),
                value: year.to_string(),
            }
        })?;

        let rows = sqlx::query(
            "SELECT row_to_json(t) AS row FROM ( \
               SELECT extract(month FROM d)::int AS month, \
                      count(*) AS num_tour_starts, \
                      array_agg(name) AS tours \
               FROM tours, unnest(start_dates) AS d \
               WHERE d >= $1 AND d <= $2 AND secret_tour = FALSE \
               GROUP BY month \
               ORDER BY num_tour_starts DESC \
               LIMIT 6 \
             ) t",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get::<Value, _>("row").map_err(ApiError::from))
            .collect()
    }

    /// Tours starting within `distance` (in `unit`) of the given point.
    pub async fn within(
        &self,
        distance: f64,
        lat: f64,
        lng: f64,
        unit: &str,
    ) -> Result<Vec<Tour>, ApiError> {
        let radius_km = if unit == "mi" { distance / MILES_PER_KM } else { distance };
        let sql = format!(
            "SELECT * FROM tours \
             WHERE start_lat IS NOT NULL AND start_lng IS NOT NULL \
             AND secret_tour = FALSE AND {} <= $3",
            HAVERSINE_KM
        );
        sqlx::query_as::<_, Tour>(&sql)
            .bind(lat)
            .bind(lng)
            .bind(radius_km)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::from)
    }

    /// Name and distance from the given point for every locatable tour.
    pub async fn distances(&self, lat: f64, lng: f64, unit: &str) -> Result<Vec<Value>, ApiError> {
        let multiplier = if unit == "mi" { MILES_PER_KM } else { 1.0 };
        let sql = format!(
            "SELECT row_to_json(t) AS row FROM ( \
               SELECT name, {} * $3 AS distance FROM tours \
               WHERE start_lat IS NOT NULL AND start_lng IS NOT NULL \
               AND secret_tour = FALSE \
               ORDER BY distance \
             ) t",
            HAVERSINE_KM
        );
        let rows = sqlx::query(&sql)
            .bind(lat)
            .bind(lng)
            .bind(multiplier)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<Value, _>("row").map_err(ApiError::from))
            .collect()
    }
}

#[async_trait]
impl Collection for TourStore {
    type Entity = Tour;
    type Draft = TourAttributes;
    type Patch = TourPatch;

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn list_query(&self) -> ListQuery {
        let mut query = ListQuery::new("tours", Tour::COLUMNS);
        query.scope_eq("secret_tour", json!(false));
        query
    }

    async fn create(&self, draft: TourAttributes) -> Result<Tour, ApiError> {
        draft.validate()?;
        insert_or_replace(&self.pool, None, &draft).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tour>, ApiError> {
        sqlx::query_as::<_, Tour>(
            "SELECT * FROM tours WHERE id = $1 AND secret_tour = FALSE",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::from)
    }

    async fn update_by_id(&self, id: Uuid, patch: TourPatch) -> Result<Option<Tour>, ApiError> {
        let Some(current) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let merged = patch.merge_into(&current);
        merged.validate()?;
        insert_or_replace(&self.pool, Some(id), &merged).await.map(Some)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM tours WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Create and update share one statement shape so validation and column
/// handling cannot drift between the two paths.
async fn insert_or_replace(
    pool: &PgPool,
    id: Option<Uuid>,
    attributes: &TourAttributes,
) -> Result<Tour, ApiError> {
    let sql = match id {
        None => {
            "INSERT INTO tours (name, slug, duration, max_group_size, difficulty, price, \
             price_discount, summary, description, image_cover, images, start_dates, \
             secret_tour, start_lat, start_lng, start_address, start_description, guide_ids) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18) RETURNING *"
        }
        Some(_) => {
            "UPDATE tours SET name = $1, slug = $2, duration = $3, max_group_size = $4, \
             difficulty = $5, price = $6, price_discount = $7, summary = $8, \
             description = $9, image_cover = $10, images = $11, start_dates = $12, \
             secret_tour = $13, start_lat = $14, start_lng = $15, start_address = $16, \
             start_description = $17, guide_ids = $18, lock_version = lock_version + 1 \
             WHERE id = $19 RETURNING *"
        }
    };

    let mut query = sqlx::query_as::<_, Tour>(sql)
        .bind(&attributes.name)
        .bind(attributes.slug())
        .bind(attributes.duration)
        .bind(attributes.max_group_size)
        .bind(&attributes.difficulty)
        .bind(attributes.price)
        .bind(attributes.price_discount)
        .bind(&attributes.summary)
        .bind(&attributes.description)
        .bind(&attributes.image_cover)
        .bind(&attributes.images)
        .bind(&attributes.start_dates)
        .bind(attributes.secret_tour)
        .bind(attributes.start_lat)
        .bind(attributes.start_lng)
        .bind(&attributes.start_address)
        .bind(&attributes.start_description)
        .bind(&attributes.guide_ids);
    if let Some(id) = id {
        query = query.bind(id);
    }
    query.fetch_one(pool).await.map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn public_reads_exclude_secret_tours() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/trailhead_test")
            .expect("lazy pool");
        let sql = TourStore::new(pool).list_query().to_sql();
        assert!(sql.query.contains("WHERE \"secret_tour\" = $1"));
        assert_eq!(sql.params, vec![json!(false)]);
    }
}
