use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Product record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub version: String,
    pub description: String,
    pub price: f64, // frozen at zero, never written after insert
    pub category: String,
    pub license: String,
    pub oncodash_version: Option<String>,
    pub file_key: Option<String>,
    pub file_url: Option<String>,
    pub external_url: Option<String>,
    pub image_key: Option<String>,
    pub image_url: Option<String>,
    pub seller_id: Uuid,
    pub created_at: OffsetDateTime,
}

impl Product {
    /// Object-store keys owned by this product.
    pub fn stored_keys(&self) -> Vec<String> {
        self.file_key.iter().chain(self.image_key.iter()).cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub version: String,
    pub description: String,
    pub category: String,
    pub license: String,
    pub oncodash_version: Option<String>,
    pub file_key: Option<String>,
    pub file_url: Option<String>,
    pub external_url: Option<String>,
    pub image_key: Option<String>,
    pub image_url: Option<String>,
    pub seller_id: Uuid,
}

/// Column-level update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductChanges {
    pub title: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub license: Option<String>,
    pub oncodash_version: Option<String>,
    pub external_url: Option<String>,
    /// Replaces the image reference; any uploaded image key is dropped.
    pub image_url: Option<String>,
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
