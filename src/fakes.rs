//! In-memory stand-ins for Postgres and the object store, used by tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{repo::UserRepo, repo_types::User},
    error::{AppError, AppResult},
    products::{
        repo::ProductRepo,
        repo_types::{NewProduct, Product, ProductChanges},
    },
    reviews::{repo::ReviewRepo, repo_types::Review},
    state::AppState,
    storage::StorageClient,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    products: Vec<Product>,
    reviews: Vec<Review>,
}

/// Every repository over one lock, so check-then-write sequences are atomic
/// the way the database constraints make them.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn duplicate_version() -> AppError {
    AppError::conflict("A product with this title and version already exists")
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn insert(&self, name: &str, email: &str, password_hash: &str) -> AppResult<User> {
        let mut t = self.lock();
        if t.users.iter().any(|u| u.email == email) {
            return Err(AppError::conflict("Email already registered"));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn names_by_ids(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .map(|u| (u.id, u.name.clone()))
            .collect())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let mut t = self.lock();
        let user = t
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::not_found("User not found"))?;
        user.password_hash = password_hash.into();
        Ok(())
    }
}

#[async_trait]
impl ProductRepo for MemoryStore {
    async fn insert(&self, new: NewProduct) -> AppResult<Product> {
        let mut t = self.lock();
        if t
            .products
            .iter()
            .any(|p| p.title == new.title && p.version == new.version)
        {
            return Err(duplicate_version());
        }
        let product = Product {
            id: Uuid::new_v4(),
            title: new.title,
            version: new.version,
            description: new.description,
            price: 0.0,
            category: new.category,
            license: new.license,
            oncodash_version: new.oncodash_version,
            file_key: new.file_key,
            file_url: new.file_url,
            external_url: new.external_url,
            image_key: new.image_key,
            image_url: new.image_url,
            seller_id: new.seller_id,
            created_at: OffsetDateTime::now_utc(),
        };
        t.products.push(product.clone());
        Ok(product)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.lock().products.iter().find(|p| p.id == id).cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Product>> {
        Ok(self.lock().products.clone())
    }

    async fn list_by_title(&self, title: &str) -> AppResult<Vec<Product>> {
        Ok(self
            .lock()
            .products
            .iter()
            .filter(|p| p.title == title)
            .cloned()
            .collect())
    }

    async fn list_by_seller(&self, seller_id: Uuid) -> AppResult<Vec<Product>> {
        Ok(self
            .lock()
            .products
            .iter()
            .rev()
            .filter(|p| p.seller_id == seller_id)
            .cloned()
            .collect())
    }

    async fn update(&self, id: Uuid, changes: ProductChanges) -> AppResult<Product> {
        let mut t = self.lock();
        let current = t
            .products
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Record not found"))?;

        let title = changes.title.unwrap_or(current.title);
        let version = changes.version.unwrap_or(current.version);
        if t
            .products
            .iter()
            .any(|p| p.id != id && p.title == title && p.version == version)
        {
            return Err(duplicate_version());
        }

        let p = t
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::not_found("Record not found"))?;
        p.title = title;
        p.version = version;
        if let Some(v) = changes.description {
            p.description = v;
        }
        if let Some(v) = changes.category {
            p.category = v;
        }
        if let Some(v) = changes.license {
            p.license = v;
        }
        if let Some(v) = changes.oncodash_version {
            p.oncodash_version = Some(v);
        }
        if let Some(v) = changes.external_url {
            p.external_url = Some(v);
        }
        if let Some(v) = changes.image_url {
            p.image_key = None;
            p.image_url = Some(v);
        }
        Ok(p.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut t = self.lock();
        let before = t.products.len();
        t.products.retain(|p| p.id != id);
        let removed = t.products.len() != before;
        if removed {
            t.reviews.retain(|r| r.product_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl ReviewRepo for MemoryStore {
    async fn insert(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        rating: i32,
        comment: &str,
    ) -> AppResult<Review> {
        let mut t = self.lock();
        if !t.products.iter().any(|p| p.id == product_id) {
            return Err(AppError::not_found("Referenced record not found"));
        }
        let review = Review {
            id: Uuid::new_v4(),
            product_id,
            user_id,
            rating,
            comment: comment.into(),
            created_at: OffsetDateTime::now_utc(),
        };
        t.reviews.push(review.clone());
        Ok(review)
    }

    async fn list_for_products(&self, product_ids: &[Uuid]) -> AppResult<Vec<Review>> {
        Ok(self
            .lock()
            .reviews
            .iter()
            .filter(|r| product_ids.contains(&r.product_id))
            .cloned()
            .collect())
    }
}

/// Object store kept in a map. Clones share the same objects.
#[derive(Clone, Default)]
pub struct FakeStorage {
    objects: Arc<Mutex<BTreeMap<String, Bytes>>>,
    fail_puts: Arc<AtomicBool>,
}

impl FakeStorage {
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(&self, key: &str, body: Bytes, _ct: &str) -> anyhow::Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            anyhow::bail!("object store unavailable");
        }
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), body);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("https://fake.local/{}", key)
    }
}

/// Inserts a user directly, skipping password hashing.
pub async fn seed_user(st: &AppState, name: &str) -> User {
    let email = format!("{}-{}@example.com", name.to_lowercase(), Uuid::new_v4());
    st.users
        .insert(name, &email, "not-a-real-hash")
        .await
        .expect("seed user")
}

pub async fn seed_product(st: &AppState, seller: &User, title: &str, version: &str) -> Product {
    st.products
        .insert(NewProduct {
            title: title.into(),
            version: version.into(),
            description: "seeded".into(),
            category: String::new(),
            license: "MIT".into(),
            oncodash_version: None,
            file_key: None,
            file_url: None,
            external_url: Some("https://example.com/seeded".into()),
            image_key: None,
            image_url: None,
            seller_id: seller.id,
        })
        .await
        .expect("seed product")
}
