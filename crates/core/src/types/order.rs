//! Order, order line and delivery address models

use crate::types::{normalize_token, Coordinates, ProductId, Timestamp, UserId, Validator};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order identifier assigned by the server
pub type OrderId = i64;

/// Delivery lifecycle of an order
///
/// Moves strictly forward: Pending → Prepared → InDelivery → Delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Prepared,
    InDelivery,
    Delivered,
}

impl OrderStatus {
    /// All states in lifecycle order
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Prepared,
        OrderStatus::InDelivery,
        OrderStatus::Delivered,
    ];

    /// The state reachable by advancing, or `None` once delivered
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            Self::Pending => Some(Self::Prepared),
            Self::Prepared => Some(Self::InDelivery),
            Self::InDelivery => Some(Self::Delivered),
            Self::Delivered => None,
        }
    }

    pub fn is_final(&self) -> bool {
        self.next().is_none()
    }

    /// Spelling used by the backend
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pendiente",
            Self::Prepared => "Preparado",
            Self::InDelivery => "EnReparto",
            Self::Delivered => "Entregado",
        }
    }

    /// Parses any known spelling (Spanish or English, any case, with or without separators)
    pub fn parse(raw: &str) -> Option<OrderStatus> {
        match normalize_token(raw).as_str() {
            "pendiente" | "pending" => Some(Self::Pending),
            "preparado" | "preparada" | "prepared" => Some(Self::Prepared),
            "enreparto" | "encamino" | "indelivery" | "enroute" => Some(Self::InDelivery),
            "entregado" | "entregada" | "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::Prepared => "Prepared",
            Self::InDelivery => "In delivery",
            Self::Delivered => "Delivered",
        };
        write!(f, "{}", label)
    }
}

/// Where an order must be delivered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub coordinates: Option<Coordinates>,
}

impl DeliveryAddress {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            postal_code: postal_code.into(),
            coordinates: None,
        }
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    /// Single-line form used for geocoding and display
    pub fn one_line(&self) -> String {
        format!("{}, {} {}", self.street, self.postal_code, self.city)
    }
}

impl Validator for DeliveryAddress {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.street.trim().is_empty() {
            errors.push("Street cannot be empty".to_string());
        }
        if self.city.trim().is_empty() {
            errors.push("City cannot be empty".to_string());
        }
        if self.postal_code.trim().is_empty() {
            errors.push("Postal code cannot be empty".to_string());
        }
        if let Some(coords) = self.coordinates {
            if !coords.is_valid() {
                errors.push("Coordinates out of range".to_string());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// One product line of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// quantity × unit price at order time; independent of later price changes
    pub subtotal: Decimal,
}

impl OrderLine {
    /// Unit price recovered from the stored subtotal
    pub fn unit_price(&self) -> Decimal {
        if self.quantity == 0 {
            Decimal::ZERO
        } else {
            self.subtotal / Decimal::from(self.quantity)
        }
    }
}

/// A customer order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub courier_id: Option<UserId>,
    pub status: OrderStatus,
    pub created_at: Timestamp,
    pub delivered_at: Option<Timestamp>,
    pub address: DeliveryAddress,
    pub notes: Option<String>,
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// True once a courier has been assigned
    pub fn is_assigned(&self) -> bool {
        self.courier_id.is_some()
    }

    /// Sum of line subtotals
    pub fn lines_total(&self) -> Decimal {
        self.lines.iter().map(|l| l.subtotal).sum()
    }

    /// Returns the next status, or `None` when delivered
    pub fn next_status(&self) -> Option<OrderStatus> {
        self.status.next()
    }
}

/// Line item of an order that does not exist on the server yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl NewOrderLine {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Order header plus lines as submitted by a customer
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_id: UserId,
    pub address: DeliveryAddress,
    pub notes: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

impl Validator for NewOrder {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = match self.address.validate() {
            Ok(()) => Vec::new(),
            Err(e) => e,
        };
        if self.lines.is_empty() {
            errors.push("Order must contain at least one line".to_string());
        }
        if self.lines.iter().any(|l| l.quantity == 0) {
            errors.push("Line quantity must be greater than zero".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_advances_in_order() {
        let mut status = OrderStatus::Pending;
        let mut visited = vec![status];
        while let Some(next) = status.next() {
            assert!(next > status);
            status = next;
            visited.push(status);
        }
        assert_eq!(visited, OrderStatus::ALL.to_vec());
    }

    #[test]
    fn test_delivered_has_no_next() {
        assert_eq!(OrderStatus::Delivered.next(), None);
        assert!(OrderStatus::Delivered.is_final());
    }

    #[test]
    fn test_status_parse_normalizes_spelling() {
        assert_eq!(OrderStatus::parse("Pendiente"), Some(OrderStatus::Pending));
        assert_eq!(OrderStatus::parse("EN_REPARTO"), Some(OrderStatus::InDelivery));
        assert_eq!(OrderStatus::parse("en reparto"), Some(OrderStatus::InDelivery));
        assert_eq!(OrderStatus::parse("InDelivery"), Some(OrderStatus::InDelivery));
        assert_eq!(OrderStatus::parse("entregado"), Some(OrderStatus::Delivered));
        assert_eq!(OrderStatus::parse("cancelado"), None);
    }

    #[test]
    fn test_wire_spelling_parses_back() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(status.as_wire_str()), Some(status));
        }
    }

    #[test]
    fn test_line_unit_price() {
        let line = OrderLine {
            id: 1,
            order_id: 1,
            product_id: 3,
            quantity: 4,
            subtotal: Decimal::new(1000, 2),
        };
        assert_eq!(line.unit_price(), Decimal::new(250, 2));
    }

    #[test]
    fn test_new_order_validation() {
        let order = NewOrder {
            customer_id: 5,
            address: DeliveryAddress::new("Calle Mayor 1", "Madrid", "28013"),
            notes: None,
            lines: vec![],
        };
        let errors = order.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("at least one line")));
    }

    #[test]
    fn test_address_one_line() {
        let address = DeliveryAddress::new("Calle Mayor 1", "Madrid", "28013");
        assert_eq!(address.one_line(), "Calle Mayor 1, 28013 Madrid");
    }
}
