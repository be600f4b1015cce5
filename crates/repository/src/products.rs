//! Product catalog, served from the cache first
//!
//! The cache only ever holds products a customer can buy: active and in
//! stock. Writes go to the server first and are mirrored locally after.

use reparto_core::{AppError, Product, ProductId, Resource};
use reparto_database::{CacheStore, Snapshots};
use reparto_network::ProductApi;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct ProductRepository {
    api: Arc<dyn ProductApi>,
    store: CacheStore,
}

impl ProductRepository {
    pub fn new(api: Arc<dyn ProductApi>, store: CacheStore) -> Self {
        Self { api, store }
    }

    /// Cached catalog, re-emitted after every change
    pub fn observe_products(&self) -> Snapshots<Product> {
        self.store.observe_products()
    }

    pub fn observe_category(&self, category: impl Into<String>) -> Snapshots<Product> {
        self.store.observe_category(category)
    }

    /// Current cache contents, without touching the network
    pub async fn cached_products(&self) -> Resource<Vec<Product>> {
        self.store.list_products().await.into()
    }

    /// Replaces the cache with the server's buyable products
    ///
    /// Returns how many products were cached.
    pub async fn refresh_products(&self) -> Resource<usize> {
        self.try_refresh().await.into()
    }

    async fn try_refresh(&self) -> Result<usize, AppError> {
        let remote = self.api.list_products().await?;
        let total = remote.len();
        let available: Vec<Product> = remote.into_iter().filter(Product::is_available).collect();

        self.store.replace_products(&available).await?;
        log::info!(
            "Cached {} of {} products from the server",
            available.len(),
            total
        );
        Ok(available.len())
    }

    /// Cache first, then the server; a server hit is written through
    pub async fn get_product(&self, id: ProductId) -> Resource<Product> {
        self.try_get(id).await.into()
    }

    async fn try_get(&self, id: ProductId) -> Result<Product, AppError> {
        if let Some(product) = self.store.find_product(id).await? {
            return Ok(product);
        }

        log::debug!("Product {} not cached, asking the server", id);
        let product = self.api.get_product(id).await?;
        self.mirror(&product).await?;
        Ok(product)
    }

    pub async fn create_product(&self, product: &Product) -> Resource<Product> {
        self.try_create(product).await.into()
    }

    async fn try_create(&self, product: &Product) -> Result<Product, AppError> {
        validate(product)?;
        let created = self.api.create_product(product).await?;
        self.mirror(&created).await?;
        Ok(created)
    }

    pub async fn update_product(&self, product: &Product) -> Resource<()> {
        self.try_update(product).await.into()
    }

    async fn try_update(&self, product: &Product) -> Result<(), AppError> {
        validate(product)?;
        self.api.update_product(product).await?;
        self.mirror(product).await
    }

    /// Activates or deactivates a product on the server
    pub async fn set_active(&self, id: ProductId, active: bool) -> Resource<()> {
        self.try_set_active(id, active).await.into()
    }

    async fn try_set_active(&self, id: ProductId, active: bool) -> Result<(), AppError> {
        self.api.set_product_active(id, active).await?;

        if !active {
            self.store.delete_product(id).await?;
        } else if let Some(cached) = self.store.find_product(id).await? {
            self.store.upsert_product(&cached.with_active(true)).await?;
        }
        Ok(())
    }

    pub async fn delete_product(&self, id: ProductId) -> Resource<()> {
        self.try_delete(id).await.into()
    }

    async fn try_delete(&self, id: ProductId) -> Result<(), AppError> {
        self.api.delete_product(id).await?;
        self.store.delete_product(id).await?;
        Ok(())
    }

    /// Keeps the cache limited to buyable products
    async fn mirror(&self, product: &Product) -> Result<(), AppError> {
        if product.is_available() {
            self.store.upsert_product(product).await
        } else {
            self.store.delete_product(product.id).await.map(|_| ())
        }
    }
}

fn validate(product: &Product) -> Result<(), AppError> {
    use reparto_core::Validator;

    product
        .validate()
        .map_err(|errors| AppError::validation("product", errors.join("; ")))
}

/// Case-insensitive substring match on name, description or category
///
/// An empty (or blank) query returns every product.
pub fn search(products: &[Product], query: &str) -> Vec<Product> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return products.to_vec();
    }

    products
        .iter()
        .filter(|p| {
            p.name.to_lowercase().contains(&needle)
                || p.description.to_lowercase().contains(&needle)
                || p.category.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Products whose category equals `category`, ignoring case
pub fn filter_by_category(products: &[Product], category: &str) -> Vec<Product> {
    let category = category.trim();
    products
        .iter()
        .filter(|p| p.category.eq_ignore_ascii_case(category))
        .cloned()
        .collect()
}

/// Distinct categories, sorted
pub fn categories(products: &[Product]) -> Vec<String> {
    products
        .iter()
        .map(|p| p.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
