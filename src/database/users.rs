use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::{User, UserDraft, UserPatch};
use crate::database::repository::Collection;
use crate::error::ApiError;
use crate::query::ListQuery;

/// User persistence. Every read composes `active = TRUE` explicitly;
/// deactivated accounts are invisible to the whole API surface.
#[derive(Clone)]
pub struct UserStore {
    pool: PgPool,
}

impl UserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE email = lower($1) AND active = TRUE",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::from)
    }

    /// Reset-token lookup: the stored hash must match AND the expiry must
    /// still be in the future. Callers cannot tell which check failed.
    pub async fn find_by_reset_hash(&self, hash: &str) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users \
             WHERE password_reset_token = $1 AND password_reset_expires > now() \
             AND active = TRUE",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::from)
    }

    pub async fn set_reset_token(
        &self,
        id: Uuid,
        hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE users SET password_reset_token = $2, password_reset_expires = $3, \
             lock_version = lock_version + 1 WHERE id = $1",
        )
        .bind(id)
        .bind(hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_reset_token(&self, id: Uuid) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE users SET password_reset_token = NULL, password_reset_expires = NULL, \
             lock_version = lock_version + 1 WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Sets a new password hash, stamps the change a second in the past so
    /// a session issued in the same instant stays valid, and burns any
    /// outstanding reset token.
    pub async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE users SET password = $2, \
             password_changed_at = now() - interval '1 second', \
             password_reset_token = NULL, password_reset_expires = NULL, \
             lock_version = lock_version + 1 WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Self-service profile update; only name and email are writable here.
    pub async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET name = COALESCE($2, name), \
             email = COALESCE(lower($3), email), \
             lock_version = lock_version + 1 \
             WHERE id = $1 AND active = TRUE RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::from)
    }

    /// Soft delete: the record stays, the account disappears.
    pub async fn deactivate(&self, id: Uuid) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE users SET active = FALSE, lock_version = lock_version + 1 WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, ApiError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = ANY($1) AND active = TRUE",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::from)
    }
}

#[async_trait]
impl Collection for UserStore {
    type Entity = User;
    type Draft = UserDraft;
    type Patch = UserPatch;

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn list_query(&self) -> ListQuery {
        let mut query = ListQuery::new("users", User::COLUMNS);
        query.scope_eq("active", json!(true));
        query
    }

    async fn create(&self, draft: UserDraft) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (name, email, photo, role, password) \
             VALUES ($1, lower($2), $3, $4, $5) RETURNING *",
        )
        .bind(&draft.name)
        .bind(&draft.email)
        .bind(&draft.photo)
        .bind(draft.role.as_str())
        .bind(&draft.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(ApiError::from)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND active = TRUE")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::from)
    }

    async fn update_by_id(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, ApiError> {
        patch.validate()?;
        let Some(current) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        sqlx::query_as::<_, User>(
            "UPDATE users SET name = $2, email = lower($3), photo = $4, role = $5, \
             active = $6, lock_version = lock_version + 1 \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(patch.name.as_deref().unwrap_or(&current.name))
        .bind(patch.email.as_deref().unwrap_or(&current.email))
        .bind(patch.photo.as_deref().unwrap_or(&current.photo))
        .bind(patch.role.as_deref().unwrap_or(&current.role))
        .bind(patch.active.unwrap_or(current.active))
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::from)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_list_read_is_scoped_to_active_accounts() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/trailhead_test")
            .expect("lazy pool");
        let sql = UserStore::new(pool).list_query().to_sql();
        assert!(sql.query.contains("WHERE \"active\" = $1"));
        assert_eq!(sql.params, vec![json!(true)]);
    }
}
