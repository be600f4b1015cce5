//! Domain types for Reparto
//!
//! - `product`: catalog products
//! - `order`: orders, order lines, delivery addresses
//! - `route`: courier routes and the route/order join
//! - `location`: courier GPS pings
//! - `user`: users, roles, session
//! - `common`: timestamps, coordinates, shared traits

mod common;
mod location;
mod order;
mod product;
mod route;
mod user;

pub use common::{normalize_token, Coordinates, Timestamp, Validator};
pub use location::LocationPing;
pub use order::{
    DeliveryAddress, NewOrder, NewOrderLine, Order, OrderId, OrderLine, OrderStatus,
};
pub use product::{Product, ProductId};
pub use route::{NewRoute, Route, RouteId, RouteOrder, RouteStatus};
pub use user::{Session, User, UserId, UserRole};
