use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewProduct, Product, ProductChanges};
use crate::{db::bounded, error::AppResult};

#[async_trait]
pub trait ProductRepo: Send + Sync {
    /// Fails with `Conflict` when (title, version) is taken. The check and
    /// the insert are one atomic step.
    async fn insert(&self, new: NewProduct) -> AppResult<Product>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Product>>;
    async fn list_all(&self) -> AppResult<Vec<Product>>;
    async fn list_by_title(&self, title: &str) -> AppResult<Vec<Product>>;
    /// Newest first.
    async fn list_by_seller(&self, seller_id: Uuid) -> AppResult<Vec<Product>>;
    /// Fails with `NotFound` if absent, `Conflict` if the change collides
    /// with another (title, version).
    async fn update(&self, id: Uuid, changes: ProductChanges) -> AppResult<Product>;
    /// Removes the product and its reviews. Returns false if it was absent.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

const COLUMNS: &str = "id, title, version, description, price, category, license, \
    oncodash_version, file_key, file_url, external_url, image_key, image_url, \
    seller_id, created_at";

pub struct PgProductRepo {
    db: PgPool,
    timeout: Duration,
}

impl PgProductRepo {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl ProductRepo for PgProductRepo {
    async fn insert(&self, new: NewProduct) -> AppResult<Product> {
        let sql = format!(
            r#"
            INSERT INTO products (id, title, version, description, price, category, license,
                                  oncodash_version, file_key, file_url, external_url,
                                  image_key, image_url, seller_id)
            VALUES ($1, $2, $3, $4, 0, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {COLUMNS}
            "#
        );
        let query = sqlx::query_as::<_, Product>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.title)
            .bind(&new.version)
            .bind(&new.description)
            .bind(&new.category)
            .bind(&new.license)
            .bind(&new.oncodash_version)
            .bind(&new.file_key)
            .bind(&new.file_url)
            .bind(&new.external_url)
            .bind(&new.image_key)
            .bind(&new.image_url)
            .bind(new.seller_id)
            .fetch_one(&self.db);
        bounded(self.timeout, query).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Product>> {
        let sql = format!("SELECT {COLUMNS} FROM products WHERE id = $1");
        let query = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.db);
        bounded(self.timeout, query).await
    }

    async fn list_all(&self) -> AppResult<Vec<Product>> {
        let sql = format!("SELECT {COLUMNS} FROM products ORDER BY title, version");
        let query = sqlx::query_as::<_, Product>(&sql).fetch_all(&self.db);
        bounded(self.timeout, query).await
    }

    async fn list_by_title(&self, title: &str) -> AppResult<Vec<Product>> {
        let sql = format!("SELECT {COLUMNS} FROM products WHERE title = $1");
        let query = sqlx::query_as::<_, Product>(&sql)
            .bind(title)
            .fetch_all(&self.db);
        bounded(self.timeout, query).await
    }

    async fn list_by_seller(&self, seller_id: Uuid) -> AppResult<Vec<Product>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM products WHERE seller_id = $1 ORDER BY created_at DESC, id"
        );
        let query = sqlx::query_as::<_, Product>(&sql)
            .bind(seller_id)
            .fetch_all(&self.db);
        bounded(self.timeout, query).await
    }

    async fn update(&self, id: Uuid, changes: ProductChanges) -> AppResult<Product> {
        let sql = format!(
            r#"
            UPDATE products SET
                title            = COALESCE($2, title),
                version          = COALESCE($3, version),
                description      = COALESCE($4, description),
                category         = COALESCE($5, category),
                license          = COALESCE($6, license),
                oncodash_version = COALESCE($7, oncodash_version),
                external_url     = COALESCE($8, external_url),
                image_key        = CASE WHEN $9::TEXT IS NULL THEN image_key ELSE NULL END,
                image_url        = COALESCE($9, image_url)
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        );
        let query = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(&changes.title)
            .bind(&changes.version)
            .bind(&changes.description)
            .bind(&changes.category)
            .bind(&changes.license)
            .bind(&changes.oncodash_version)
            .bind(&changes.external_url)
            .bind(&changes.image_url)
            .fetch_one(&self.db);
        // RowNotFound classifies as NotFound.
        bounded(self.timeout, query).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        // reviews go with it through ON DELETE CASCADE
        let query = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.db);
        let done = bounded(self.timeout, query).await?;
        Ok(done.rows_affected() > 0)
    }
}
