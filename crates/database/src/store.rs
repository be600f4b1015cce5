//! Cache store: the single write path into the local database
//!
//! Every write goes through [`CacheStore`] so the matching table versions are
//! bumped and observers re-query. Reads can go straight to `queries`.

use crate::connection::{connect, DatabaseConfig, DbPool};
use crate::migrations::run_migrations;
use crate::notify::{ChangeNotifier, Table};
use crate::queries::{locations, orders, products, routes, users};
use futures::stream::{self, BoxStream, StreamExt};
use reparto_core::{
    AppError, LocationPing, Order, OrderId, OrderLine, OrderStatus, Product, ProductId, Route,
    RouteId, RouteOrder, RouteStatus, Timestamp, User, UserId,
};
use std::future::Future;

/// Row counts per cache table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCounts {
    pub products: i64,
    pub users: i64,
    pub orders: i64,
    pub order_lines: i64,
    pub routes: i64,
    pub route_orders: i64,
    pub location_pings: i64,
    pub pending_pings: i64,
}

/// Stream of full table snapshots
pub type Snapshots<T> = BoxStream<'static, Result<Vec<T>, AppError>>;

/// Local cache shared by repositories, the sync worker and the tracker
///
/// Cloning is cheap: clones share the pool and the notifier.
#[derive(Clone, Debug)]
pub struct CacheStore {
    pool: DbPool,
    notifier: ChangeNotifier,
}

impl CacheStore {
    /// Opens the database and brings the schema up to date
    pub async fn open(config: DatabaseConfig) -> Result<Self, AppError> {
        let pool = connect(config).await?;
        Self::from_pool(pool).await
    }

    /// Private in-memory cache
    pub async fn in_memory() -> Result<Self, AppError> {
        Self::open(DatabaseConfig::in_memory()).await
    }

    /// Wraps an existing pool, running migrations first
    pub async fn from_pool(pool: DbPool) -> Result<Self, AppError> {
        if run_migrations(&pool).await? {
            log::info!("Local cache was rebuilt and starts empty");
        }
        let released = locations::release_all_claims(&pool).await?;
        if released > 0 {
            log::info!("Requeued {} ping(s) from an interrupted upload", released);
        }
        Ok(Self {
            pool,
            notifier: ChangeNotifier::new(),
        })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ===== Observation =====

    /// Emits `query`'s result now and again after every change to `table`
    ///
    /// The stream ends once every clone of this store has been dropped.
    pub fn observe<T, F, Fut>(
        &self,
        table: Table,
        query: F,
    ) -> BoxStream<'static, Result<T, AppError>>
    where
        T: Send + 'static,
        F: Fn(DbPool) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let changes = self.notifier.subscribe(table);
        let pool = self.pool.clone();

        stream::unfold(
            (pool, changes, query, true),
            move |(pool, mut changes, query, first)| async move {
                if !first && changes.changed().await.is_err() {
                    return None;
                }
                let snapshot = query(pool.clone()).await;
                if let Err(e) = &snapshot {
                    log::warn!("Cache snapshot of {} failed: {}", table, e);
                }
                Some((snapshot, (pool, changes, query, false)))
            },
        )
        .boxed()
    }

    /// All cached products by name
    pub fn observe_products(&self) -> Snapshots<Product> {
        self.observe(Table::Products, |pool| async move {
            products::list_products(&pool).await
        })
    }

    /// Cached products of one category
    pub fn observe_category(&self, category: impl Into<String>) -> Snapshots<Product> {
        let category = category.into();
        self.observe(Table::Products, move |pool| {
            let category = category.clone();
            async move { products::list_products_by_category(&pool, &category).await }
        })
    }

    /// All cached routes with their order ids
    pub fn observe_routes(&self) -> Snapshots<Route> {
        self.observe(Table::Routes, |pool| async move {
            routes::list_routes(&pool).await
        })
    }

    /// Cached routes of one courier
    pub fn observe_courier_routes(&self, courier_id: UserId) -> Snapshots<Route> {
        self.observe(Table::Routes, move |pool| async move {
            routes::routes_for_courier(&pool, courier_id).await
        })
    }

    /// All cached orders with their lines
    pub fn observe_orders(&self) -> Snapshots<Order> {
        self.observe(Table::Orders, |pool| async move {
            orders::list_orders(&pool).await
        })
    }

    /// Pings still waiting for the server
    pub fn observe_pending_pings(&self) -> Snapshots<LocationPing> {
        self.observe(Table::LocationPings, |pool| async move {
            locations::pending_pings(&pool).await
        })
    }

    // ===== Products =====

    pub async fn upsert_product(&self, product: &Product) -> Result<(), AppError> {
        products::upsert_product(&self.pool, product).await?;
        self.notifier.notify(Table::Products);
        Ok(())
    }

    pub async fn upsert_products(&self, items: &[Product]) -> Result<(), AppError> {
        products::upsert_products(&self.pool, items).await?;
        self.notifier.notify(Table::Products);
        Ok(())
    }

    /// Swaps the whole catalog in one transaction
    pub async fn replace_products(&self, items: &[Product]) -> Result<(), AppError> {
        products::replace_products(&self.pool, items).await?;
        self.notifier.notify(Table::Products);
        Ok(())
    }

    pub async fn delete_product(&self, id: ProductId) -> Result<bool, AppError> {
        let deleted = products::delete_product(&self.pool, id).await?;
        if deleted {
            self.notifier.notify(Table::Products);
        }
        Ok(deleted)
    }

    pub async fn delete_all_products(&self) -> Result<u64, AppError> {
        let deleted = products::delete_all_products(&self.pool).await?;
        self.notifier.notify(Table::Products);
        Ok(deleted)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, AppError> {
        products::get_product(&self.pool, id).await
    }

    pub async fn find_product(&self, id: ProductId) -> Result<Option<Product>, AppError> {
        products::find_product(&self.pool, id).await
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        products::list_products(&self.pool).await
    }

    // ===== Orders =====

    pub async fn upsert_order(&self, order: &Order) -> Result<(), AppError> {
        orders::upsert_order(&self.pool, order).await?;
        self.notifier.notify_all(&[Table::Orders, Table::OrderLines]);
        Ok(())
    }

    pub async fn upsert_orders(&self, items: &[Order]) -> Result<(), AppError> {
        orders::upsert_orders(&self.pool, items).await?;
        self.notifier.notify_all(&[Table::Orders, Table::OrderLines]);
        Ok(())
    }

    pub async fn upsert_order_line(&self, line: &OrderLine) -> Result<(), AppError> {
        orders::upsert_order_line(&self.pool, line).await?;
        // Order snapshots embed their lines
        self.notifier.notify_all(&[Table::OrderLines, Table::Orders]);
        Ok(())
    }

    pub async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, AppError> {
        let updated = orders::set_order_status(&self.pool, id, status).await?;
        if updated {
            self.notifier.notify(Table::Orders);
        }
        Ok(updated)
    }

    pub async fn delete_order(&self, id: OrderId) -> Result<bool, AppError> {
        let deleted = orders::delete_order(&self.pool, id).await?;
        if deleted {
            self.notifier.notify_all(&[Table::Orders, Table::OrderLines]);
        }
        Ok(deleted)
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order, AppError> {
        orders::get_order(&self.pool, id).await
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, AppError> {
        orders::list_orders(&self.pool).await
    }

    // ===== Routes =====

    pub async fn upsert_route(&self, route: &Route) -> Result<(), AppError> {
        routes::upsert_route(&self.pool, route).await?;
        self.notifier.notify_all(&[Table::Routes, Table::RouteOrders]);
        Ok(())
    }

    pub async fn replace_routes(&self, items: &[Route]) -> Result<(), AppError> {
        routes::replace_routes(&self.pool, items).await?;
        self.notifier.notify_all(&[Table::Routes, Table::RouteOrders]);
        Ok(())
    }

    pub async fn replace_courier_routes(
        &self,
        courier_id: UserId,
        items: &[Route],
    ) -> Result<(), AppError> {
        routes::replace_courier_routes(&self.pool, courier_id, items).await?;
        self.notifier.notify_all(&[Table::Routes, Table::RouteOrders]);
        Ok(())
    }

    pub async fn set_route_status(
        &self,
        id: RouteId,
        status: RouteStatus,
    ) -> Result<bool, AppError> {
        let updated = routes::set_route_status(&self.pool, id, status).await?;
        if updated {
            self.notifier.notify(Table::Routes);
        }
        Ok(updated)
    }

    pub async fn delete_route(&self, id: RouteId) -> Result<bool, AppError> {
        let deleted = routes::delete_route(&self.pool, id).await?;
        if deleted {
            self.notifier.notify_all(&[Table::Routes, Table::RouteOrders]);
        }
        Ok(deleted)
    }

    pub async fn get_route(&self, id: RouteId) -> Result<Route, AppError> {
        routes::get_route(&self.pool, id).await
    }

    pub async fn route_orders(&self, route_id: RouteId) -> Result<Vec<RouteOrder>, AppError> {
        routes::route_orders(&self.pool, route_id).await
    }

    pub async fn orders_in_route(&self, route_id: RouteId) -> Result<Vec<Order>, AppError> {
        routes::orders_in_route(&self.pool, route_id).await
    }

    // ===== Location pings =====

    /// Queues a ping for upload and returns its local id
    pub async fn insert_ping(&self, ping: &LocationPing) -> Result<i64, AppError> {
        let id = locations::insert_ping(&self.pool, ping).await?;
        self.notifier.notify(Table::LocationPings);
        Ok(id)
    }

    pub async fn pending_pings(&self) -> Result<Vec<LocationPing>, AppError> {
        locations::pending_pings(&self.pool).await
    }

    /// Claims a queued ping so no other uploader sends it too
    pub async fn claim_ping(&self, id: i64) -> Result<bool, AppError> {
        locations::claim_ping(&self.pool, id).await
    }

    pub async fn release_ping(&self, id: i64) -> Result<bool, AppError> {
        locations::release_ping(&self.pool, id).await
    }

    pub async fn mark_ping_synced(&self, id: i64) -> Result<bool, AppError> {
        let updated = locations::mark_ping_synced(&self.pool, id).await?;
        if updated {
            self.notifier.notify(Table::LocationPings);
        }
        Ok(updated)
    }

    pub async fn prune_synced_before(&self, cutoff: Timestamp) -> Result<u64, AppError> {
        let pruned = locations::prune_synced_before(&self.pool, cutoff).await?;
        if pruned > 0 {
            self.notifier.notify(Table::LocationPings);
        }
        Ok(pruned)
    }

    // ===== Users =====

    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        users::upsert_user(&self.pool, user).await?;
        self.notifier.notify(Table::Users);
        Ok(())
    }

    pub async fn replace_users(&self, items: &[User]) -> Result<(), AppError> {
        users::replace_users(&self.pool, items).await?;
        self.notifier.notify(Table::Users);
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        users::list_users(&self.pool).await
    }

    // ===== Maintenance =====

    /// Row counts for every table
    pub async fn counts(&self) -> Result<CacheCounts, AppError> {
        Ok(CacheCounts {
            products: products::count_products(&self.pool).await?,
            users: users::count_users(&self.pool).await?,
            orders: orders::count_orders(&self.pool).await?,
            order_lines: orders::count_order_lines(&self.pool).await?,
            routes: routes::count_routes(&self.pool).await?,
            route_orders: routes::count_route_orders(&self.pool).await?,
            location_pings: locations::count_pings(&self.pool).await?,
            pending_pings: locations::count_pending_pings(&self.pool).await?,
        })
    }

    /// Empties every table, including unsent pings
    pub async fn clear_all(&self) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database("Failed to begin transaction", e))?;

        for table in Table::ALL.iter().rev() {
            sqlx::query(&format!("DELETE FROM {}", table.name()))
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::database(format!("Failed to clear {}", table), e))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database("Failed to commit cache clear", e))?;

        self.notifier.notify_all(&Table::ALL);
        log::info!("Local cache cleared");
        Ok(())
    }
}
