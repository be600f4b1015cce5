//! Reparto domain core
//!
//! Domain models, the shared error taxonomy, the tagged `Resource` result,
//! the in-memory session holder and the shopping cart.

pub mod cart;
pub mod error;
pub mod resource;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use cart::{Cart, CartItem, TAX_RATE};
pub use error::{AppError, ErrorKind, ErrorSeverity, RecoveryAction, Result};
pub use resource::Resource;
pub use rust_decimal::Decimal;
pub use session::SessionStore;
pub use types::{
    normalize_token, Coordinates, DeliveryAddress, LocationPing, NewOrder, NewOrderLine, NewRoute,
    Order, OrderId, OrderLine, OrderStatus, Product, ProductId, Route, RouteId, RouteOrder,
    RouteStatus, Session, Timestamp, User, UserId, UserRole, Validator,
};
