use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::Review;
use crate::{db::bounded, error::AppResult};

#[async_trait]
pub trait ReviewRepo: Send + Sync {
    /// Fails with `NotFound` if the product disappeared meanwhile.
    async fn insert(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        rating: i32,
        comment: &str,
    ) -> AppResult<Review>;
    /// Reviews of the given products, in insertion order.
    async fn list_for_products(&self, product_ids: &[Uuid]) -> AppResult<Vec<Review>>;
}

pub struct PgReviewRepo {
    db: PgPool,
    timeout: Duration,
}

impl PgReviewRepo {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl ReviewRepo for PgReviewRepo {
    async fn insert(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        rating: i32,
        comment: &str,
    ) -> AppResult<Review> {
        let query = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (id, product_id, user_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, product_id, user_id, rating, comment, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(user_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(&self.db);
        bounded(self.timeout, query).await
    }

    async fn list_for_products(&self, product_ids: &[Uuid]) -> AppResult<Vec<Review>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = sqlx::query_as::<_, Review>(
            r#"
            SELECT id, product_id, user_id, rating, comment, created_at
            FROM reviews
            WHERE product_id = ANY($1)
            ORDER BY seq ASC
            "#,
        )
        .bind(product_ids)
        .fetch_all(&self.db);
        bounded(self.timeout, query).await
    }
}
