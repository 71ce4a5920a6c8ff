use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::Product;
use crate::reviews::dto::ReviewSummary;

#[derive(Debug, Clone, Serialize)]
pub struct SellerRef {
    pub id: Uuid,
    pub name: String,
}

/// Product as served to clients, with its reviews aggregated.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: Uuid,
    pub title: String,
    pub version: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub license: String,
    pub oncodash_version: Option<String>,
    pub file_url: Option<String>,
    pub external_url: Option<String>,
    pub image_url: Option<String>,
    pub seller: SellerRef,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub is_latest: bool,
    #[serde(flatten)]
    pub reviews: ReviewSummary,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VersionRef {
    pub id: Uuid,
    pub version: String,
}

/// Single product plus its lineage, newest version first.
#[derive(Debug, Serialize)]
pub struct ProductDetails {
    #[serde(flatten)]
    pub product: ProductView,
    pub versions: Vec<VersionRef>,
}

/// Row of the caller's own product list.
#[derive(Debug, Serialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub title: String,
    pub version: String,
    pub description: String,
    pub category: String,
    pub license: String,
    pub oncodash_version: Option<String>,
    pub file_url: Option<String>,
    pub external_url: Option<String>,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Product> for ProductSummary {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            title: p.title,
            version: p.version,
            description: p.description,
            category: p.category,
            license: p.license,
            oncodash_version: p.oncodash_version,
            file_url: p.file_url,
            external_url: p.external_url,
            image_url: p.image_url,
            created_at: p.created_at,
        }
    }
}

/// Fields an owner may change. Keys outside this list, `price` included,
/// are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub license: Option<String>,
    pub oncodash_version: Option<String>,
    pub external_url: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductEnvelope {
    pub message: &'static str,
    pub product: ProductView,
}
