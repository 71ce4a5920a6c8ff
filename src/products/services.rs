use std::collections::BTreeMap;

use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{ProductDetails, ProductPatch, ProductSummary, ProductView, SellerRef, VersionRef},
    repo_types::{NewProduct, Product, ProductChanges},
    versioning::VersionOrdering,
};
use crate::{
    artifacts::{self, StoredObject, Upload},
    auth::repo_types::User,
    authz::require_owner,
    error::{AppError, AppResult},
    reviews::services::summaries_for,
    state::AppState,
};

/// Everything a seller submits to publish a product.
#[derive(Debug, Default)]
pub struct ProductDraft {
    pub title: String,
    pub version: String,
    pub description: String,
    pub license: String,
    pub category: String,
    pub oncodash_version: Option<String>,
    pub external_url: Option<String>,
    pub file: Option<Upload>,
    pub image: Option<Upload>,
}

fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_url(url: &str) -> AppResult<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(AppError::validation("External URL must start with http:// or https://"))
    }
}

/// Member of `lineage` that ranks highest under `ordering`.
pub fn latest_of(ordering: VersionOrdering, lineage: &[Product]) -> Option<&Product> {
    lineage
        .iter()
        .max_by(|a, b| ordering.compare(&a.version, &b.version))
}

/// Builds views for `products`, each paired with its latest flag, resolving
/// seller names and review aggregates in bulk.
async fn assemble(st: &AppState, products: Vec<(Product, bool)>) -> AppResult<Vec<ProductView>> {
    let ids: Vec<Uuid> = products.iter().map(|(p, _)| p.id).collect();
    let mut seller_ids: Vec<Uuid> = products.iter().map(|(p, _)| p.seller_id).collect();
    seller_ids.sort_unstable();
    seller_ids.dedup();

    let sellers = st.users.names_by_ids(&seller_ids).await?;
    let mut summaries = summaries_for(st, &ids).await?;

    Ok(products
        .into_iter()
        .map(|(p, is_latest)| ProductView {
            seller: SellerRef {
                id: p.seller_id,
                name: sellers.get(&p.seller_id).cloned().unwrap_or_default(),
            },
            reviews: summaries.remove(&p.id).unwrap_or_default(),
            id: p.id,
            title: p.title,
            version: p.version,
            description: p.description,
            price: p.price,
            category: p.category,
            license: p.license,
            oncodash_version: p.oncodash_version,
            file_url: p.file_url,
            external_url: p.external_url,
            image_url: p.image_url,
            created_at: p.created_at,
            is_latest,
        })
        .collect())
}

async fn view_one(st: &AppState, product: Product, is_latest: bool) -> AppResult<ProductView> {
    assemble(st, vec![(product, is_latest)])
        .await?
        .pop()
        .ok_or_else(|| AppError::internal("product view missing"))
}

async fn is_latest(st: &AppState, product: &Product) -> AppResult<bool> {
    let lineage = st.products.list_by_title(&product.title).await?;
    Ok(latest_of(st.ordering(), &lineage).map(|p| p.id) == Some(product.id))
}

async fn find_or_404(st: &AppState, id: Uuid) -> AppResult<Product> {
    st.products
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))
}

/// Stores the artifact and image, recording each key in `stored` as soon as
/// it exists so the caller can roll back.
async fn store_uploads(
    st: &AppState,
    file: Option<Upload>,
    image: Option<Upload>,
    stored: &mut Vec<String>,
) -> AppResult<(Option<StoredObject>, Option<StoredObject>)> {
    let mut out = [None, None];
    for (slot, upload) in out.iter_mut().zip([file, image]) {
        if let Some(upload) = upload {
            let obj = artifacts::store(st, upload).await?;
            stored.push(obj.key.clone());
            *slot = Some(obj);
        }
    }
    let [file, image] = out;
    Ok((file, image))
}

/// Publishes a new product owned by `actor`. Uploaded objects are removed
/// again if the product cannot be recorded.
pub async fn create_product(
    st: &AppState,
    actor: &User,
    draft: ProductDraft,
) -> AppResult<ProductView> {
    let title = required("Title", &draft.title)?;
    let version = required("Version", &draft.version)?;
    let description = required("Description", &draft.description)?;
    let license = required("License", &draft.license)?;
    let external_url = non_blank(draft.external_url);
    if let Some(url) = &external_url {
        check_url(url)?;
    }
    if draft.file.is_none() && external_url.is_none() {
        return Err(AppError::validation(
            "Either a file or an external URL must be provided",
        ));
    }

    let mut stored: Vec<String> = Vec::new();
    let uploaded = store_uploads(st, draft.file, draft.image, &mut stored).await;
    let (file, image) = match uploaded {
        Ok(v) => v,
        Err(e) => {
            artifacts::discard(st, &stored).await;
            return Err(e);
        }
    };

    let new = NewProduct {
        title,
        version,
        description,
        license,
        category: draft.category.trim().to_string(),
        oncodash_version: non_blank(draft.oncodash_version),
        file_key: file.as_ref().map(|f| f.key.clone()),
        file_url: file.map(|f| f.url),
        external_url,
        image_key: image.as_ref().map(|i| i.key.clone()),
        image_url: image.map(|i| i.url),
        seller_id: actor.id,
    };

    let product = match st.products.insert(new).await {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, seller_id = %actor.id, "product insert failed; removing uploads");
            artifacts::discard(st, &stored).await;
            return Err(e);
        }
    };

    info!(
        product_id = %product.id,
        title = %product.title,
        version = %product.version,
        seller_id = %actor.id,
        "product created"
    );
    let latest = is_latest(st, &product).await?;
    view_one(st, product, latest).await
}

/// One product per title: the latest member of each lineage, ordered by title.
pub async fn list_latest(st: &AppState) -> AppResult<Vec<ProductView>> {
    let ordering = st.ordering();
    let mut latest: BTreeMap<String, Product> = BTreeMap::new();
    for product in st.products.list_all().await? {
        let newer = latest.get(&product.title).map_or(true, |current| {
            ordering.compare(&product.version, &current.version).is_gt()
        });
        if newer {
            latest.insert(product.title.clone(), product);
        }
    }
    assemble(st, latest.into_values().map(|p| (p, true)).collect()).await
}

pub async fn get_by_id(st: &AppState, id: Uuid) -> AppResult<ProductDetails> {
    let product = find_or_404(st, id).await?;
    let ordering = st.ordering();

    let mut lineage = st.products.list_by_title(&product.title).await?;
    ordering.sort_desc(&mut lineage, |p| p.version.as_str());
    let versions: Vec<VersionRef> = lineage
        .iter()
        .map(|p| VersionRef {
            id: p.id,
            version: p.version.clone(),
        })
        .collect();
    let latest = versions.first().map(|v| v.id) == Some(product.id);

    Ok(ProductDetails {
        product: view_one(st, product, latest).await?,
        versions,
    })
}

pub async fn list_for_seller(st: &AppState, actor: &User) -> AppResult<Vec<ProductSummary>> {
    let products = st.products.list_by_seller(actor.id).await?;
    Ok(products.into_iter().map(ProductSummary::from).collect())
}

fn changes_from(patch: ProductPatch) -> AppResult<ProductChanges> {
    let req = |field: &str, v: Option<String>| v.map(|v| required(field, &v)).transpose();
    let external_url = non_blank(patch.external_url);
    if let Some(url) = &external_url {
        check_url(url)?;
    }
    Ok(ProductChanges {
        title: req("Title", patch.title)?,
        version: req("Version", patch.version)?,
        description: req("Description", patch.description)?,
        license: req("License", patch.license)?,
        category: patch.category.map(|v| v.trim().to_string()),
        oncodash_version: non_blank(patch.oncodash_version),
        external_url,
        image_url: non_blank(patch.image_url),
    })
}

pub async fn update_product(
    st: &AppState,
    actor: &User,
    id: Uuid,
    patch: ProductPatch,
) -> AppResult<ProductView> {
    let existing = find_or_404(st, id).await?;
    require_owner(actor, existing.seller_id)?;
    let mut changes = changes_from(patch)?;
    if changes.image_url.is_some() && changes.image_url == existing.image_url {
        changes.image_url = None;
    }

    let product = if changes.is_empty() {
        existing
    } else {
        let replaces_image = changes.image_url.is_some();
        let updated = st.products.update(id, changes).await?;
        if replaces_image {
            if let Some(old) = existing.image_key {
                artifacts::discard(st, &[old]).await;
            }
        }
        info!(product_id = %id, seller_id = %actor.id, "product updated");
        updated
    };

    let latest = is_latest(st, &product).await?;
    view_one(st, product, latest).await
}

/// Removes the product, its reviews and its stored objects.
pub async fn delete_product(st: &AppState, actor: &User, id: Uuid) -> AppResult<()> {
    let existing = find_or_404(st, id).await?;
    require_owner(actor, existing.seller_id)?;

    if !st.products.delete(id).await? {
        return Err(AppError::not_found("Product not found"));
    }
    artifacts::discard(st, &existing.stored_keys()).await;
    info!(product_id = %id, seller_id = %actor.id, "product deleted");
    Ok(())
}
