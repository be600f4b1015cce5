// crates/network/src/api.rs
//! Typed endpoints of the backend, one trait per resource
//!
//! Repositories and the sync engine depend on these traits rather than on
//! [`ApiClient`], so they can run against in-memory fakes.

use crate::client::HttpClient;
use crate::dto::{
    ActiveRequest, LocationDto, LoginRequest, LoginResponse, OrderDto, OrderLineDto, ProductDto,
    RouteDto, StatusRequest, UserDto,
};
use crate::error::NetworkResult;
use async_trait::async_trait;
use reparto_core::{
    LocationPing, NewOrder, NewOrderLine, NewRoute, Order, OrderId, OrderLine, OrderStatus,
    Product, ProductId, Route, RouteId, RouteStatus, Session, User, UserId,
};

#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchanges credentials for a session
    async fn login(&self, email: &str, password: &str) -> NetworkResult<Session>;
}

#[async_trait]
pub trait ProductApi: Send + Sync {
    async fn list_products(&self) -> NetworkResult<Vec<Product>>;
    async fn get_product(&self, id: ProductId) -> NetworkResult<Product>;
    async fn create_product(&self, product: &Product) -> NetworkResult<Product>;
    async fn update_product(&self, product: &Product) -> NetworkResult<()>;
    async fn set_product_active(&self, id: ProductId, active: bool) -> NetworkResult<()>;
    async fn delete_product(&self, id: ProductId) -> NetworkResult<()>;
}

#[async_trait]
pub trait OrderApi: Send + Sync {
    async fn list_orders(&self) -> NetworkResult<Vec<Order>>;
    async fn get_order(&self, id: OrderId) -> NetworkResult<Order>;
    /// Creates the order header; lines are created one by one afterwards
    async fn create_order(&self, order: &NewOrder) -> NetworkResult<Order>;
    async fn update_order(&self, order: &Order) -> NetworkResult<()>;
    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> NetworkResult<()>;
    async fn delete_order(&self, id: OrderId) -> NetworkResult<()>;
    async fn create_order_line(
        &self,
        order_id: OrderId,
        line: &NewOrderLine,
    ) -> NetworkResult<OrderLine>;
    async fn list_order_lines(&self, order_id: OrderId) -> NetworkResult<Vec<OrderLine>>;
}

#[async_trait]
pub trait RouteApi: Send + Sync {
    async fn list_routes(&self) -> NetworkResult<Vec<Route>>;
    async fn get_route(&self, id: RouteId) -> NetworkResult<Route>;
    async fn create_route(&self, route: &NewRoute) -> NetworkResult<Route>;
    async fn update_route(&self, route: &Route) -> NetworkResult<()>;
    async fn set_route_status(&self, id: RouteId, status: RouteStatus) -> NetworkResult<()>;
    async fn delete_route(&self, id: RouteId) -> NetworkResult<()>;
}

#[async_trait]
pub trait LocationApi: Send + Sync {
    /// Locations known to the server, optionally for a single courier
    async fn list_locations(&self, courier_id: Option<UserId>) -> NetworkResult<Vec<LocationPing>>;
    /// Submits one ping; the local id is not transmitted
    async fn create_location(&self, ping: &LocationPing) -> NetworkResult<()>;
    async fn delete_location(&self, id: i64) -> NetworkResult<()>;
}

#[async_trait]
pub trait UserApi: Send + Sync {
    async fn list_users(&self) -> NetworkResult<Vec<User>>;
    async fn list_couriers(&self) -> NetworkResult<Vec<User>>;
}

/// REST implementation of every API trait over one [`HttpClient`]
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpClient,
}

impl ApiClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, email: &str, password: &str) -> NetworkResult<Session> {
        let request = LoginRequest { email, password };
        let response: LoginResponse = self.http.post_json("Usuarios/login", &request).await?;
        response.into_session("POST Usuarios/login")
    }
}

#[async_trait]
impl ProductApi for ApiClient {
    async fn list_products(&self) -> NetworkResult<Vec<Product>> {
        let dtos: Vec<ProductDto> = self.http.get_json("Productos").await?;
        Ok(dtos.into_iter().map(Product::from).collect())
    }

    async fn get_product(&self, id: ProductId) -> NetworkResult<Product> {
        let dto: ProductDto = self.http.get_json(&format!("Productos/{}", id)).await?;
        Ok(dto.into())
    }

    async fn create_product(&self, product: &Product) -> NetworkResult<Product> {
        let dto: ProductDto = self
            .http
            .post_json("Productos", &ProductDto::from(product))
            .await?;
        Ok(dto.into())
    }

    async fn update_product(&self, product: &Product) -> NetworkResult<()> {
        self.http
            .put_unit(&format!("Productos/{}", product.id), &ProductDto::from(product))
            .await
    }

    async fn set_product_active(&self, id: ProductId, active: bool) -> NetworkResult<()> {
        self.http
            .patch_unit(&format!("Productos/{}/estado", id), &ActiveRequest { active })
            .await
    }

    async fn delete_product(&self, id: ProductId) -> NetworkResult<()> {
        self.http.delete(&format!("Productos/{}", id)).await
    }
}

#[async_trait]
impl OrderApi for ApiClient {
    async fn list_orders(&self) -> NetworkResult<Vec<Order>> {
        let dtos: Vec<OrderDto> = self.http.get_json("Pedidos").await?;
        Ok(dtos.into_iter().map(Order::from).collect())
    }

    async fn get_order(&self, id: OrderId) -> NetworkResult<Order> {
        let dto: OrderDto = self.http.get_json(&format!("Pedidos/{}", id)).await?;
        Ok(dto.into())
    }

    async fn create_order(&self, order: &NewOrder) -> NetworkResult<Order> {
        let dto: OrderDto = self
            .http
            .post_json("Pedidos", &OrderDto::from_new(order))
            .await?;
        Ok(dto.into())
    }

    async fn update_order(&self, order: &Order) -> NetworkResult<()> {
        self.http
            .put_unit(&format!("Pedidos/{}", order.id), &OrderDto::from(order))
            .await
    }

    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> NetworkResult<()> {
        let body = StatusRequest {
            status: status.as_wire_str().to_string(),
        };
        self.http
            .patch_unit(&format!("Pedidos/{}/estado", id), &body)
            .await
    }

    async fn delete_order(&self, id: OrderId) -> NetworkResult<()> {
        self.http.delete(&format!("Pedidos/{}", id)).await
    }

    async fn create_order_line(
        &self,
        order_id: OrderId,
        line: &NewOrderLine,
    ) -> NetworkResult<OrderLine> {
        let dto: OrderLineDto = self
            .http
            .post_json(
                &format!("Pedidos/{}/detalles", order_id),
                &OrderLineDto::from_new(order_id, line),
            )
            .await?;
        Ok(dto.into())
    }

    async fn list_order_lines(&self, order_id: OrderId) -> NetworkResult<Vec<OrderLine>> {
        let dtos: Vec<OrderLineDto> = self
            .http
            .get_json(&format!("Pedidos/{}/detalles", order_id))
            .await?;
        Ok(dtos.into_iter().map(OrderLine::from).collect())
    }
}

#[async_trait]
impl RouteApi for ApiClient {
    async fn list_routes(&self) -> NetworkResult<Vec<Route>> {
        let dtos: Vec<RouteDto> = self.http.get_json("Rutas").await?;
        Ok(dtos.into_iter().map(Route::from).collect())
    }

    async fn get_route(&self, id: RouteId) -> NetworkResult<Route> {
        let dto: RouteDto = self.http.get_json(&format!("Rutas/{}", id)).await?;
        Ok(dto.into())
    }

    async fn create_route(&self, route: &NewRoute) -> NetworkResult<Route> {
        let dto: RouteDto = self
            .http
            .post_json("Rutas", &RouteDto::from_new(route))
            .await?;
        Ok(dto.into())
    }

    async fn update_route(&self, route: &Route) -> NetworkResult<()> {
        self.http
            .put_unit(&format!("Rutas/{}", route.id), &RouteDto::from(route))
            .await
    }

    async fn set_route_status(&self, id: RouteId, status: RouteStatus) -> NetworkResult<()> {
        let body = StatusRequest {
            status: status.as_wire_str().to_string(),
        };
        self.http
            .patch_unit(&format!("Rutas/{}/estado", id), &body)
            .await
    }

    async fn delete_route(&self, id: RouteId) -> NetworkResult<()> {
        self.http.delete(&format!("Rutas/{}", id)).await
    }
}

#[async_trait]
impl LocationApi for ApiClient {
    async fn list_locations(&self, courier_id: Option<UserId>) -> NetworkResult<Vec<LocationPing>> {
        let query: Vec<(&str, String)> = courier_id
            .map(|id| vec![("repartidorId", id.to_string())])
            .unwrap_or_default();
        let dtos: Vec<LocationDto> = self
            .http
            .get_json_with_query("UbicacionesRepartidor", &query)
            .await?;
        Ok(dtos.into_iter().map(LocationPing::from).collect())
    }

    async fn create_location(&self, ping: &LocationPing) -> NetworkResult<()> {
        self.http
            .post_unit("UbicacionesRepartidor", &LocationDto::from(ping))
            .await
    }

    async fn delete_location(&self, id: i64) -> NetworkResult<()> {
        self.http
            .delete(&format!("UbicacionesRepartidor/{}", id))
            .await
    }
}

#[async_trait]
impl UserApi for ApiClient {
    async fn list_users(&self) -> NetworkResult<Vec<User>> {
        let dtos: Vec<UserDto> = self.http.get_json("Usuarios").await?;
        Ok(dtos.into_iter().map(User::from).collect())
    }

    async fn list_couriers(&self) -> NetworkResult<Vec<User>> {
        let dtos: Vec<UserDto> = self.http.get_json("Repartidores").await?;
        Ok(dtos.into_iter().map(UserDto::into_courier).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use reparto_core::SessionStore;
    use std::sync::Arc;

    fn api() -> ApiClient {
        let config = ClientConfig::new("http://localhost:5000/api");
        let http = HttpClient::new(config, SessionStore::new()).unwrap();
        ApiClient::new(http)
    }

    #[test]
    fn test_traits_are_object_safe() {
        let client = Arc::new(api());
        let _auth: Arc<dyn AuthApi> = client.clone();
        let _products: Arc<dyn ProductApi> = client.clone();
        let _orders: Arc<dyn OrderApi> = client.clone();
        let _routes: Arc<dyn RouteApi> = client.clone();
        let _locations: Arc<dyn LocationApi> = client.clone();
        let _users: Arc<dyn UserApi> = client;
    }

    #[test]
    fn test_endpoints_join_under_api_prefix() {
        let client = api();
        assert_eq!(
            client.http().url("Pedidos/3/detalles").unwrap().as_str(),
            "http://localhost:5000/api/Pedidos/3/detalles"
        );
    }
}
