use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::ApiError;
use crate::query::{ListQuery, QueryParams, SqlResult};

/// The abstract collection capability the generic CRUD templates run
/// against: create, find-by-id, update-by-id, delete-by-id and a
/// parameter-driven find. Every entity store implements this once.
#[async_trait]
pub trait Collection: Send + Sync {
    type Entity: Serialize + Send + Sync;
    type Draft: Send;
    type Patch: Send;

    fn pool(&self) -> &PgPool;

    /// Base retrieval for list calls: table, column set and the standing
    /// predicates (soft-delete, secrecy) composed ahead of caller filters.
    fn list_query(&self) -> ListQuery;

    async fn create(&self, draft: Self::Draft) -> Result<Self::Entity, ApiError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Self::Entity>, ApiError>;

    /// Partial update that re-validates the merged record exactly as create
    /// does. `None` when no live row matches the id.
    async fn update_by_id(
        &self,
        id: Uuid,
        patch: Self::Patch,
    ) -> Result<Option<Self::Entity>, ApiError>;

    /// `false` when no row matched.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, ApiError>;

    /// List documents per the raw query parameters, optionally scoped to a
    /// parent resource. Projections make the row shape dynamic, so results
    /// come back as JSON documents rather than typed entities.
    async fn find(
        &self,
        params: &QueryParams,
        scope: Option<(&str, Value)>,
    ) -> Result<Vec<Value>, ApiError> {
        let mut query = self.list_query();
        if let Some((column, value)) = scope {
            query.scope_eq(column, value);
        }
        query.apply(params);
        fetch_json_rows(self.pool(), &query.to_sql()).await
    }
}

/// Runs an assembled retrieval and returns each row as a JSON document.
/// Wrapping in `row_to_json` keeps projected queries decodable without a
/// typed row mapping per projection.
pub async fn fetch_json_rows(pool: &PgPool, sql: &SqlResult) -> Result<Vec<Value>, ApiError> {
    let wrapped = format!("SELECT row_to_json(t) AS row FROM ({}) t", sql.query);
    let mut query = sqlx::query(&wrapped);
    for param in &sql.params {
        query = bind_value(query, param);
    }
    let rows = match query.fetch_all(pool).await {
        Ok(rows) => rows,
        // Filtering or sorting on a field the entity does not have matches
        // no documents; it is not an error. SQLSTATE 42703: undefined column.
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("42703") => {
            return Ok(vec![]);
        }
        Err(err) => return Err(err.into()),
    };
    rows.iter()
        .map(|row| row.try_get::<Value, _>("row").map_err(ApiError::from))
        .collect()
}

/// Binds a JSON scalar with its natural Postgres type.
pub fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    value: &Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        // Id scopes and id filters must reach Postgres typed; uuid columns
        // have no comparison against text.
        Value::String(s) => match Uuid::parse_str(s) {
            Ok(id) => query.bind(id),
            Err(_) => query.bind(s.clone()),
        },
        // Composite values do not occur in comparison filters; bind as JSONB.
        other => query.bind(other.clone()),
    }
}
