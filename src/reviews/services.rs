use std::collections::HashMap;

use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{AddReviewRequest, ReviewSummary, ReviewView},
    repo_types::Review,
};
use crate::{
    auth::repo_types::User,
    error::{AppError, AppResult},
    state::AppState,
};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;
pub const MAX_COMMENT_CHARS: usize = 5_000;

fn view(review: Review, user_name: String) -> ReviewView {
    ReviewView {
        id: review.id,
        product_id: review.product_id,
        user_id: review.user_id,
        user_name,
        rating: review.rating,
        comment: review.comment,
        created_at: review.created_at,
    }
}

fn validate(req: AddReviewRequest) -> AppResult<(i32, String)> {
    let rating = req
        .rating
        .ok_or_else(|| AppError::validation("Rating is required"))?;
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::validation(format!(
            "Rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    let comment = req.comment.as_deref().map(str::trim).unwrap_or_default();
    if comment.is_empty() {
        return Err(AppError::validation("Comment is required"));
    }
    if comment.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::validation(format!(
            "Comment must be at most {MAX_COMMENT_CHARS} characters"
        )));
    }
    // range checked above
    Ok((rating as i32, comment.to_string()))
}

pub async fn add_review(
    st: &AppState,
    actor: &User,
    product_id: Uuid,
    req: AddReviewRequest,
) -> AppResult<ReviewView> {
    if st.products.find_by_id(product_id).await?.is_none() {
        return Err(AppError::not_found("Product not found"));
    }
    let (rating, comment) = validate(req).inspect_err(|e| {
        warn!(%product_id, error = %e, "rejected review");
    })?;

    let review = st
        .reviews
        .insert(product_id, actor.id, rating, &comment)
        .await?;
    info!(review_id = %review.id, %product_id, user_id = %actor.id, rating, "review added");
    Ok(view(review, actor.name.clone()))
}

/// Count and average are derived from `reviews` every time; nothing is
/// stored alongside the product.
pub fn summarize(reviews: Vec<ReviewView>) -> ReviewSummary {
    let review_count = reviews.len();
    let average_rating = (review_count > 0).then(|| {
        let total: i64 = reviews.iter().map(|r| i64::from(r.rating)).sum();
        total as f64 / review_count as f64
    });
    ReviewSummary {
        reviews,
        review_count,
        average_rating,
    }
}

/// Review summaries for several products at once. Every requested id gets
/// an entry, empty if it has no reviews.
pub async fn summaries_for(
    st: &AppState,
    product_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, ReviewSummary>> {
    let reviews = st.reviews.list_for_products(product_ids).await?;

    let mut reviewer_ids: Vec<Uuid> = reviews.iter().map(|r| r.user_id).collect();
    reviewer_ids.sort_unstable();
    reviewer_ids.dedup();
    let names = st.users.names_by_ids(&reviewer_ids).await?;

    let mut grouped: HashMap<Uuid, Vec<ReviewView>> =
        product_ids.iter().map(|id| (*id, Vec::new())).collect();
    for review in reviews {
        let name = names.get(&review.user_id).cloned().unwrap_or_default();
        grouped
            .entry(review.product_id)
            .or_default()
            .push(view(review, name));
    }
    Ok(grouped
        .into_iter()
        .map(|(id, views)| (id, summarize(views)))
        .collect())
}
