use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::User;
use crate::{db::bounded, error::AppResult};

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn insert(&self, name: &str, email: &str, password_hash: &str) -> AppResult<User>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    /// Display names for the given ids; unknown ids are absent from the map.
    async fn names_by_ids(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>>;
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<()>;
}

pub struct PgUserRepo {
    db: PgPool,
    timeout: Duration,
}

impl PgUserRepo {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn insert(&self, name: &str, email: &str, password_hash: &str) -> AppResult<User> {
        let query = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db);
        bounded(self.timeout, query).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let query = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db);
        bounded(self.timeout, query).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let query = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db);
        bounded(self.timeout, query).await
    }

    async fn names_by_ids(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = sqlx::query_as::<_, (Uuid, String)>(
            r#"SELECT id, name FROM users WHERE id = ANY($1)"#,
        )
        .bind(ids)
        .fetch_all(&self.db);
        let rows = bounded(self.timeout, query).await?;
        Ok(rows.into_iter().collect())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let query = sqlx::query(r#"UPDATE users SET password_hash = $2 WHERE id = $1"#)
            .bind(id)
            .bind(password_hash)
            .execute(&self.db);
        let done = bounded(self.timeout, query).await?;
        if done.rows_affected() == 0 {
            return Err(crate::error::AppError::not_found("User not found"));
        }
        Ok(())
    }
}
