use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    dto::{ProductDetails, ProductEnvelope, ProductPatch, ProductSummary, ProductView},
    services::{self, ProductDraft},
};
use crate::{
    artifacts::Upload,
    auth::{dto::MessageResponse, extractors::CurrentUser},
    error::{AppError, AppResult},
    state::AppState,
};

// --- routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
        .route("/user/products", get(list_my_products))
}

pub fn write_routes(upload_limit_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route(
            "/products/:id",
            axum::routing::put(update_product).delete(delete_product),
        )
        .layer(DefaultBodyLimit::max(upload_limit_bytes))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_products(State(state): State<AppState>) -> AppResult<Json<Vec<ProductView>>> {
    Ok(Json(services::list_latest(&state).await?))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProductDetails>> {
    Ok(Json(services::get_by_id(&state, id).await?))
}

#[instrument(skip_all)]
pub async fn list_my_products(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<ProductSummary>>> {
    Ok(Json(services::list_for_seller(&state, &user).await?))
}

/// POST /products (multipart)
/// Text fields: title, version, description, license, category,
/// oncodash_version, external_url. Files: `files` (artifact), `images`.
#[instrument(skip_all)]
pub async fn create_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut mp: Multipart,
) -> AppResult<(StatusCode, HeaderMap, Json<ProductEnvelope>)> {
    let mut draft = ProductDraft::default();
    while let Some(field) = mp.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "files" | "files[]" | "images" | "images[]" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field.bytes().await?;
                // browsers send an empty part when no file was picked
                if file_name.is_empty() && body.is_empty() {
                    continue;
                }
                let upload = Upload {
                    file_name,
                    content_type,
                    body,
                };
                if name.starts_with("files") {
                    draft.file = Some(upload);
                } else {
                    draft.image = Some(upload);
                }
            }
            "title" => draft.title = field.text().await?,
            "version" => draft.version = field.text().await?,
            "description" => draft.description = field.text().await?,
            "license" => draft.license = field.text().await?,
            "category" => draft.category = field.text().await?,
            "oncodash_version" => draft.oncodash_version = Some(field.text().await?),
            "external_url" => draft.external_url = Some(field.text().await?),
            other => warn!(field = %other, "ignoring unknown multipart field"),
        }
    }

    let product = services::create_product(&state, &user, draft).await?;

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/api/products/{}", product.id))
        .map_err(|e| AppError::internal(e.to_string()))?;
    headers.insert(header::LOCATION, location);

    Ok((
        StatusCode::CREATED,
        headers,
        Json(ProductEnvelope {
            message: "Product created successfully",
            product,
        }),
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn update_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<ProductPatch>, JsonRejection>,
) -> AppResult<Json<ProductEnvelope>> {
    let Json(patch) = payload?;
    let product = services::update_product(&state, &user, id, patch).await?;
    Ok(Json(ProductEnvelope {
        message: "Product updated successfully",
        product,
    }))
}

#[instrument(skip(state, user))]
pub async fn delete_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    services::delete_product(&state, &user, id).await?;
    Ok(Json(MessageResponse {
        message: "Product deleted successfully",
    }))
}
