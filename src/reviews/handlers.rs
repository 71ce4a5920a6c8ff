use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{AddReviewRequest, ReviewView},
    services,
};
use crate::{auth::extractors::CurrentUser, error::AppResult, state::AppState};

pub fn review_routes() -> Router<AppState> {
    Router::new().route("/reviews/:product_id", post(add_review))
}

#[instrument(skip(state, user, payload))]
pub async fn add_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
    payload: Result<Json<AddReviewRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ReviewView>)> {
    let Json(payload) = payload?;
    let review = services::add_review(&state, &user, product_id, payload).await?;
    Ok((StatusCode::CREATED, Json(review)))
}
