use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AddReviewRequest {
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub rating: i32,
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Reviews of one product with aggregates computed from them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewSummary {
    pub reviews: Vec<ReviewView>,
    pub review_count: usize,
    pub average_rating: Option<f64>,
}
