//! Delivery routes, served from the cache first

use reparto_core::{
    AppError, NewRoute, Order, OrderId, Resource, Route, RouteId, RouteStatus, Timestamp, UserId,
    Validator,
};
use reparto_database::{CacheStore, Snapshots};
use reparto_network::{OrderApi, RouteApi};
use std::collections::HashSet;
use std::sync::Arc;

/// Result of an admin assigning orders to a courier
#[derive(Debug, Clone, PartialEq)]
pub struct RouteAssignment {
    pub route: Route,
    /// Orders now carrying the courier
    pub assigned: Vec<OrderId>,
    /// Orders the server refused to update
    pub failed: Vec<OrderId>,
}

pub struct RouteRepository {
    api: Arc<dyn RouteApi>,
    orders: Arc<dyn OrderApi>,
    store: CacheStore,
}

impl RouteRepository {
    pub fn new(api: Arc<dyn RouteApi>, orders: Arc<dyn OrderApi>, store: CacheStore) -> Self {
        Self { api, orders, store }
    }

    pub fn observe_routes(&self) -> Snapshots<Route> {
        self.store.observe_routes()
    }

    pub fn observe_courier_routes(&self, courier_id: UserId) -> Snapshots<Route> {
        self.store.observe_courier_routes(courier_id)
    }

    /// Replaces cached routes with the server's, for one courier or all
    ///
    /// Orders referenced by the routes are cached too, so `route_orders`
    /// works offline. Returns how many routes were cached.
    pub async fn refresh_routes(&self, courier_id: Option<UserId>) -> Resource<usize> {
        self.try_refresh(courier_id).await.into()
    }

    async fn try_refresh(&self, courier_id: Option<UserId>) -> Result<usize, AppError> {
        let mut routes = self.api.list_routes().await?;

        match courier_id {
            Some(courier) => {
                routes.retain(|r| r.courier_id == courier);
                self.store.replace_courier_routes(courier, &routes).await?;
            }
            None => self.store.replace_routes(&routes).await?,
        }

        let wanted: HashSet<OrderId> = routes
            .iter()
            .flat_map(|r| r.order_ids.iter().copied())
            .collect();
        if !wanted.is_empty() {
            match self.orders.list_orders().await {
                Ok(orders) => {
                    let orders: Vec<Order> = orders
                        .into_iter()
                        .filter(|o| wanted.contains(&o.id))
                        .collect();
                    self.store.upsert_orders(&orders).await?;
                }
                Err(e) => log::warn!("Routes cached without their orders: {}", e),
            }
        }

        log::info!("Cached {} route(s)", routes.len());
        Ok(routes.len())
    }

    /// Cached orders of a route, in stop order
    pub async fn route_orders(&self, route_id: RouteId) -> Resource<Vec<Order>> {
        self.store.orders_in_route(route_id).await.into()
    }

    pub async fn set_status(&self, id: RouteId, status: RouteStatus) -> Resource<()> {
        self.try_set_status(id, status).await.into()
    }

    async fn try_set_status(&self, id: RouteId, status: RouteStatus) -> Result<(), AppError> {
        self.api.set_route_status(id, status).await?;
        if !self.store.set_route_status(id, status).await? {
            log::debug!("Route {} is not cached, status only changed remotely", id);
        }
        log::info!("Route {} is now {}", id, status);
        Ok(())
    }

    /// Moves the route one step forward; `Error` once completed
    pub async fn advance_status(&self, route: &Route) -> Resource<RouteStatus> {
        let Some(next) = route.status.next() else {
            return Resource::from_error(&AppError::validation(
                "status",
                format!("Route {} is already completed", route.id),
            ));
        };

        self.set_status(route.id, next).await.map(|_| next)
    }

    /// Creates a route for `courier_id`, then assigns the courier to each order
    ///
    /// Orders are updated one at a time; failures are reported, not rolled back.
    pub async fn assign_orders(
        &self,
        courier_id: UserId,
        scheduled_date: Timestamp,
        order_ids: Vec<OrderId>,
        estimated_distance_km: f64,
        estimated_duration_min: u32,
    ) -> Resource<RouteAssignment> {
        let new_route = NewRoute {
            courier_id,
            scheduled_date,
            estimated_distance_km,
            estimated_duration_min,
            order_ids,
        };
        self.try_assign(&new_route).await.into()
    }

    async fn try_assign(&self, new_route: &NewRoute) -> Result<RouteAssignment, AppError> {
        new_route
            .validate()
            .map_err(|errors| AppError::validation("route", errors.join("; ")))?;

        let mut route = self.api.create_route(new_route).await?;
        if route.order_ids.is_empty() {
            route.order_ids = new_route.order_ids.clone();
        }

        let mut assigned = Vec::new();
        let mut failed = Vec::new();
        for &order_id in &new_route.order_ids {
            match self.assign_courier(order_id, new_route.courier_id).await {
                Ok(()) => assigned.push(order_id),
                Err(e) => {
                    log::warn!(
                        "Route {}: order {} not assigned to courier {}: {}",
                        route.id,
                        order_id,
                        new_route.courier_id,
                        e
                    );
                    failed.push(order_id);
                }
            }
        }

        if let Err(e) = self.store.upsert_route(&route).await {
            log::warn!("Route {} created but not cached: {}", route.id, e);
        }

        log::info!(
            "Route {} for courier {}: {} assigned, {} failed",
            route.id,
            new_route.courier_id,
            assigned.len(),
            failed.len()
        );

        Ok(RouteAssignment {
            route,
            assigned,
            failed,
        })
    }

    async fn assign_courier(&self, order_id: OrderId, courier_id: UserId) -> Result<(), AppError> {
        let mut order = self.orders.get_order(order_id).await?;
        order.courier_id = Some(courier_id);
        self.orders.update_order(&order).await?;
        Ok(())
    }
}
