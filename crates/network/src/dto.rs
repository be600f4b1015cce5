// crates/network/src/dto.rs
//! Wire types of the backend REST API and their mapping to domain models
//!
//! Field names follow the backend's camelCase Spanish JSON. Unknown enum
//! spellings are tolerated: order and route statuses fall back to pending, roles
//! to customer.

use crate::error::{NetworkError, NetworkResult};
use chrono::{DateTime, Utc};
use reparto_core::{
    Coordinates, DeliveryAddress, LocationPing, NewOrder, NewOrderLine, NewRoute, Order, OrderId,
    OrderLine, OrderStatus, Product, Route, RouteStatus, Session, Timestamp, User, UserRole,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Dates arrive either as RFC 3339 or as naive ISO-8601, which is read as UTC
pub mod datetime {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(naive.and_utc());
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid date '{}'", raw)))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::de::Error;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&super::format(value)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid date '{}'", raw))),
            }
        }
    }
}

fn default_true() -> bool {
    true
}

fn clamp_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn to_timestamp(value: DateTime<Utc>) -> Timestamp {
    Timestamp::from(value)
}

// ===== Products =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDto {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "precio", with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default)]
    pub stock: i64,
    #[serde(rename = "categoria", default)]
    pub category: Option<String>,
    #[serde(rename = "activo", default = "default_true")]
    pub active: bool,
}

impl From<ProductDto> for Product {
    fn from(dto: ProductDto) -> Self {
        Product {
            id: dto.id,
            name: dto.name,
            description: dto.description.unwrap_or_default(),
            price: dto.price,
            stock: clamp_u32(dto.stock),
            category: dto.category.unwrap_or_default(),
            active: dto.active,
        }
    }
}

impl From<&Product> for ProductDto {
    fn from(product: &Product) -> Self {
        ProductDto {
            id: product.id,
            name: product.name.clone(),
            description: Some(product.description.clone()),
            price: product.price,
            stock: product.stock as i64,
            category: Some(product.category.clone()),
            active: product.active,
        }
    }
}

// ===== Orders =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineDto {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "pedidoId", default)]
    pub order_id: i64,
    #[serde(rename = "productoId")]
    pub product_id: i64,
    #[serde(rename = "cantidad")]
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

impl OrderLineDto {
    pub fn from_new(order_id: OrderId, line: &NewOrderLine) -> Self {
        OrderLineDto {
            id: 0,
            order_id,
            product_id: line.product_id,
            quantity: line.quantity as i64,
            subtotal: line.subtotal(),
        }
    }
}

impl From<OrderLineDto> for OrderLine {
    fn from(dto: OrderLineDto) -> Self {
        OrderLine {
            id: dto.id,
            order_id: dto.order_id,
            product_id: dto.product_id,
            quantity: clamp_u32(dto.quantity),
            subtotal: dto.subtotal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDto {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "clienteId")]
    pub customer_id: i64,
    #[serde(rename = "repartidorId", default)]
    pub courier_id: Option<i64>,
    #[serde(rename = "estado", default)]
    pub status: String,
    #[serde(rename = "fechaCreacion", default, with = "datetime::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "fechaEntrega", default, with = "datetime::option")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(rename = "direccionEntrega", default)]
    pub street: String,
    #[serde(rename = "ciudad", default)]
    pub city: String,
    #[serde(rename = "codigoPostal", default)]
    pub postal_code: String,
    #[serde(rename = "latitud", default)]
    pub latitude: Option<f64>,
    #[serde(rename = "longitud", default)]
    pub longitude: Option<f64>,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
    #[serde(rename = "detalles", default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<OrderLineDto>,
}

impl OrderDto {
    /// Header of a new order; lines are posted separately
    pub fn from_new(order: &NewOrder) -> Self {
        let coordinates = order.address.coordinates;
        OrderDto {
            id: 0,
            customer_id: order.customer_id,
            courier_id: None,
            status: OrderStatus::Pending.as_wire_str().to_string(),
            created_at: Some(Utc::now()),
            delivered_at: None,
            street: order.address.street.clone(),
            city: order.address.city.clone(),
            postal_code: order.address.postal_code.clone(),
            latitude: coordinates.map(|c| c.latitude),
            longitude: coordinates.map(|c| c.longitude),
            notes: order.notes.clone(),
            lines: Vec::new(),
        }
    }
}

impl From<OrderDto> for Order {
    fn from(dto: OrderDto) -> Self {
        let status = OrderStatus::parse(&dto.status).unwrap_or_else(|| {
            log::warn!(
                "Order {} has unknown status '{}', treating as pending",
                dto.id,
                dto.status
            );
            OrderStatus::Pending
        });

        let coordinates = dto
            .latitude
            .zip(dto.longitude)
            .map(|(lat, lon)| Coordinates::new(lat, lon));

        Order {
            id: dto.id,
            customer_id: dto.customer_id,
            courier_id: dto.courier_id,
            status,
            created_at: dto.created_at.map(to_timestamp).unwrap_or_else(Timestamp::now),
            delivered_at: dto.delivered_at.map(to_timestamp),
            address: DeliveryAddress {
                street: dto.street,
                city: dto.city,
                postal_code: dto.postal_code,
                coordinates,
            },
            notes: dto.notes,
            lines: dto.lines.into_iter().map(OrderLine::from).collect(),
        }
    }
}

impl From<&Order> for OrderDto {
    fn from(order: &Order) -> Self {
        let coordinates = order.address.coordinates;
        OrderDto {
            id: order.id,
            customer_id: order.customer_id,
            courier_id: order.courier_id,
            status: order.status.as_wire_str().to_string(),
            created_at: Some(order.created_at.to_datetime()),
            delivered_at: order.delivered_at.map(|t| t.to_datetime()),
            street: order.address.street.clone(),
            city: order.address.city.clone(),
            postal_code: order.address.postal_code.clone(),
            latitude: coordinates.map(|c| c.latitude),
            longitude: coordinates.map(|c| c.longitude),
            notes: order.notes.clone(),
            lines: Vec::new(),
        }
    }
}

// ===== Routes =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDto {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "repartidorId")]
    pub courier_id: i64,
    #[serde(rename = "fecha", with = "datetime")]
    pub scheduled_date: DateTime<Utc>,
    #[serde(rename = "distanciaEstimada", default)]
    pub estimated_distance_km: f64,
    #[serde(rename = "tiempoEstimado", default)]
    pub estimated_duration_min: i64,
    #[serde(rename = "estado", default)]
    pub status: String,
    #[serde(rename = "pedidoIds", default)]
    pub order_ids: Vec<i64>,
}

impl RouteDto {
    pub fn from_new(route: &NewRoute) -> Self {
        RouteDto {
            id: 0,
            courier_id: route.courier_id,
            scheduled_date: route.scheduled_date.to_datetime(),
            estimated_distance_km: route.estimated_distance_km,
            estimated_duration_min: route.estimated_duration_min as i64,
            status: RouteStatus::Pending.as_wire_str().to_string(),
            order_ids: route.order_ids.clone(),
        }
    }
}

impl From<RouteDto> for Route {
    fn from(dto: RouteDto) -> Self {
        let status = RouteStatus::parse(&dto.status).unwrap_or_else(|| {
            log::warn!(
                "Route {} has unknown status '{}', treating as pending",
                dto.id,
                dto.status
            );
            RouteStatus::Pending
        });

        Route {
            id: dto.id,
            courier_id: dto.courier_id,
            scheduled_date: to_timestamp(dto.scheduled_date),
            estimated_distance_km: dto.estimated_distance_km,
            estimated_duration_min: clamp_u32(dto.estimated_duration_min),
            status,
            order_ids: dto.order_ids,
        }
    }
}

impl From<&Route> for RouteDto {
    fn from(route: &Route) -> Self {
        RouteDto {
            id: route.id,
            courier_id: route.courier_id,
            scheduled_date: route.scheduled_date.to_datetime(),
            estimated_distance_km: route.estimated_distance_km,
            estimated_duration_min: route.estimated_duration_min as i64,
            status: route.status.as_wire_str().to_string(),
            order_ids: route.order_ids.clone(),
        }
    }
}

// ===== Courier locations =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "repartidorId")]
    pub courier_id: i64,
    #[serde(rename = "latitud")]
    pub latitude: f64,
    #[serde(rename = "longitud")]
    pub longitude: f64,
    #[serde(rename = "fechaHora", with = "datetime")]
    pub recorded_at: DateTime<Utc>,
}

impl From<&LocationPing> for LocationDto {
    /// The local queue id is not sent; the server assigns its own
    fn from(ping: &LocationPing) -> Self {
        LocationDto {
            id: None,
            courier_id: ping.courier_id,
            latitude: ping.latitude,
            longitude: ping.longitude,
            recorded_at: ping.recorded_at.to_datetime(),
        }
    }
}

impl From<LocationDto> for LocationPing {
    /// Server-side locations are by definition synced
    fn from(dto: LocationDto) -> Self {
        LocationPing {
            id: dto.id,
            courier_id: dto.courier_id,
            latitude: dto.latitude,
            longitude: dto.longitude,
            recorded_at: to_timestamp(dto.recorded_at),
            synced: true,
        }
    }
}

// ===== Users and auth =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDto {
    pub id: i64,
    #[serde(rename = "nombre", default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "rol", default)]
    pub role: Option<String>,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
}

impl UserDto {
    /// Maps an entry of the couriers endpoint, which may omit the role
    pub fn into_courier(self) -> User {
        let mut user = User::from(self);
        user.role = UserRole::Courier;
        user
    }
}

impl From<UserDto> for User {
    fn from(dto: UserDto) -> Self {
        let role = match dto.role.as_deref() {
            Some(raw) => UserRole::parse(raw).unwrap_or_else(|| {
                log::debug!("Unknown role '{}' for user {}, treating as customer", raw, dto.id);
                UserRole::Customer
            }),
            None => UserRole::Customer,
        };
        User {
            id: dto.id,
            name: dto.name,
            email: dto.email,
            role,
            phone: dto.phone.filter(|p| !p.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "usuario")]
    pub user: UserDto,
}

impl LoginResponse {
    /// A blank token is treated as a missing body
    pub fn into_session(self, operation: &str) -> NetworkResult<Session> {
        if self.token.trim().is_empty() {
            return Err(NetworkError::EmptyBody(operation.to_string()));
        }
        let user = User::from(self.user);
        Ok(Session::from_user(self.token, &user))
    }
}

/// Body of every `PATCH .../estado` call on orders and routes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRequest {
    #[serde(rename = "estado")]
    pub status: String,
}

/// Body of `PATCH Productos/{id}/estado`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRequest {
    #[serde(rename = "activo")]
    pub active: bool,
}
