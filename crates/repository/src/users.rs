//! User and courier directory

use reparto_core::{AppError, Resource, User};
use reparto_database::CacheStore;
use reparto_network::UserApi;
use std::sync::Arc;

pub struct UserRepository {
    api: Arc<dyn UserApi>,
    store: CacheStore,
}

impl UserRepository {
    pub fn new(api: Arc<dyn UserApi>, store: CacheStore) -> Self {
        Self { api, store }
    }

    /// Every user on the server; the cached directory is replaced as a side effect
    pub async fn list_users(&self) -> Resource<Vec<User>> {
        self.try_list_users().await.into()
    }

    async fn try_list_users(&self) -> Result<Vec<User>, AppError> {
        let users = self.api.list_users().await?;
        if let Err(e) = self.store.replace_users(&users).await {
            log::warn!("User directory not cached: {}", e);
        }
        Ok(users)
    }

    pub async fn list_couriers(&self) -> Resource<Vec<User>> {
        self.api.list_couriers().await.map_err(AppError::from).into()
    }
}
