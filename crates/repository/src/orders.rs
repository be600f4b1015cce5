//! Orders, read and written straight against the server
//!
//! Order creation is two-phase: the header first, then every line on its
//! own. A line that fails is logged and left out; the header is never rolled
//! back.

use reparto_core::{
    AppError, Cart, DeliveryAddress, NewOrder, Order, OrderId, OrderStatus, Resource, UserId,
    Validator,
};
use reparto_network::{GeocodingApi, OrderApi};
use std::sync::Arc;

pub struct OrderRepository {
    api: Arc<dyn OrderApi>,
    geocoder: Option<Arc<dyn GeocodingApi>>,
}

impl OrderRepository {
    pub fn new(api: Arc<dyn OrderApi>) -> Self {
        Self {
            api,
            geocoder: None,
        }
    }

    /// Resolves checkout addresses that come without coordinates
    pub fn with_geocoder(mut self, geocoder: Arc<dyn GeocodingApi>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub async fn list_orders(&self) -> Resource<Vec<Order>> {
        self.filtered(|_| true).await
    }

    pub async fn orders_for_customer(&self, customer_id: UserId) -> Resource<Vec<Order>> {
        self.filtered(|o| o.customer_id == customer_id).await
    }

    pub async fn orders_for_courier(&self, courier_id: UserId) -> Resource<Vec<Order>> {
        self.filtered(|o| o.courier_id == Some(courier_id)).await
    }

    pub async fn pending_orders(&self) -> Resource<Vec<Order>> {
        self.filtered(|o| o.status == OrderStatus::Pending).await
    }

    async fn filtered<F>(&self, keep: F) -> Resource<Vec<Order>>
    where
        F: Fn(&Order) -> bool,
    {
        let result: Result<Vec<Order>, AppError> = self
            .api
            .list_orders()
            .await
            .map(|orders| orders.into_iter().filter(|o| keep(o)).collect())
            .map_err(AppError::from);
        result.into()
    }

    /// One order with its lines
    pub async fn get_order(&self, id: OrderId) -> Resource<Order> {
        self.try_get(id).await.into()
    }

    async fn try_get(&self, id: OrderId) -> Result<Order, AppError> {
        let mut order = self.api.get_order(id).await?;
        if order.lines.is_empty() {
            order.lines = self.api.list_order_lines(id).await?;
        }
        Ok(order)
    }

    /// Creates the header, then each line
    ///
    /// The returned order carries only the lines the server accepted.
    pub async fn create_order(&self, order: NewOrder) -> Resource<Order> {
        self.try_create(&order).await.into()
    }

    async fn try_create(&self, new_order: &NewOrder) -> Result<Order, AppError> {
        new_order
            .validate()
            .map_err(|errors| AppError::validation("order", errors.join("; ")))?;

        let mut order = self.api.create_order(new_order).await?;
        log::info!(
            "Created order {} with {} line(s) to add",
            order.id,
            new_order.lines.len()
        );

        order.lines.clear();
        for line in &new_order.lines {
            match self.api.create_order_line(order.id, line).await {
                Ok(created) => order.lines.push(created),
                Err(e) => log::warn!(
                    "Order {}: line for product {} x{} was not created: {}",
                    order.id,
                    line.product_id,
                    line.quantity,
                    e
                ),
            }
        }

        if order.lines.len() < new_order.lines.len() {
            log::warn!(
                "Order {} was created with {} of {} lines",
                order.id,
                order.lines.len(),
                new_order.lines.len()
            );
        }

        Ok(order)
    }

    /// Turns the cart into an order
    ///
    /// The address is geocoded when it has no coordinates and a geocoder is
    /// configured; a failed lookup does not block the order. The cart is
    /// emptied once the order header exists on the server.
    pub async fn checkout(
        &self,
        cart: &mut Cart,
        customer_id: UserId,
        address: DeliveryAddress,
        notes: Option<String>,
    ) -> Resource<Order> {
        if cart.is_empty() {
            return Resource::from_error(&AppError::validation("cart", "The cart is empty"));
        }

        let address = self.locate(address).await;
        let new_order = NewOrder {
            customer_id,
            address,
            notes: notes.filter(|n| !n.trim().is_empty()),
            lines: cart.to_order_lines(),
        };

        let result = self.try_create(&new_order).await;
        if result.is_ok() {
            cart.clear();
        }
        result.into()
    }

    async fn locate(&self, address: DeliveryAddress) -> DeliveryAddress {
        let Some(geocoder) = self.geocoder.as_ref() else {
            return address;
        };
        if address.coordinates.is_some() {
            return address;
        }

        let query = address.one_line();
        match geocoder.geocode(&query).await {
            Ok(Some(coordinates)) => address.with_coordinates(coordinates),
            Ok(None) => {
                log::info!("No coordinates found for '{}'", query);
                address
            }
            Err(e) => {
                let err = AppError::GeocodingFailed {
                    address: query,
                    reason: e.to_string(),
                };
                log::warn!("{}", err);
                address
            }
        }
    }

    pub async fn set_status(&self, id: OrderId, status: OrderStatus) -> Resource<()> {
        let result = self.api.set_order_status(id, status).await;
        if result.is_ok() {
            log::info!("Order {} is now {}", id, status);
        }
        result.map_err(AppError::from).into()
    }

    /// Moves the order one step forward; `Error` once delivered
    pub async fn advance_status(&self, order: &Order) -> Resource<OrderStatus> {
        let Some(next) = order.next_status() else {
            return Resource::from_error(&AppError::validation(
                "status",
                format!("Order {} is already delivered", order.id),
            ));
        };

        self.set_status(order.id, next).await.map(|_| next)
    }

    pub async fn delete_order(&self, id: OrderId) -> Resource<()> {
        self.api.delete_order(id).await.map_err(AppError::from).into()
    }
}
