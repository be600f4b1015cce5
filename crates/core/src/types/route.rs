//! Delivery route model

use crate::types::{normalize_token, OrderId, Timestamp, UserId, Validator};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Route identifier assigned by the server
pub type RouteId = i64;

/// Lifecycle of a route: Pending → InProgress → Completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RouteStatus {
    Pending,
    InProgress,
    Completed,
}

impl RouteStatus {
    pub fn next(&self) -> Option<RouteStatus> {
        match self {
            Self::Pending => Some(Self::InProgress),
            Self::InProgress => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pendiente",
            Self::InProgress => "EnCurso",
            Self::Completed => "Completada",
        }
    }

    pub fn parse(raw: &str) -> Option<RouteStatus> {
        match normalize_token(raw).as_str() {
            "pendiente" | "pending" => Some(Self::Pending),
            "encurso" | "enprogreso" | "iniciada" | "inprogress" => Some(Self::InProgress),
            "completada" | "completado" | "finalizada" | "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::InProgress => "In progress",
            Self::Completed => "Completed",
        };
        write!(f, "{}", label)
    }
}

/// A set of orders a courier delivers on a given day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub courier_id: UserId,
    pub scheduled_date: Timestamp,
    pub estimated_distance_km: f64,
    pub estimated_duration_min: u32,
    pub status: RouteStatus,
    /// Orders linked through the route/order join
    pub order_ids: Vec<OrderId>,
}

impl Route {
    pub fn order_count(&self) -> usize {
        self.order_ids.len()
    }

    pub fn contains_order(&self, order_id: OrderId) -> bool {
        self.order_ids.contains(&order_id)
    }
}

/// Row of the route/order join table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteOrder {
    pub route_id: RouteId,
    pub order_id: OrderId,
    /// Stop position inside the route, starting at 0
    pub position: u32,
}

/// Route payload before the server assigns an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewRoute {
    pub courier_id: UserId,
    pub scheduled_date: Timestamp,
    pub estimated_distance_km: f64,
    pub estimated_duration_min: u32,
    pub order_ids: Vec<OrderId>,
}

impl Validator for NewRoute {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.order_ids.is_empty() {
            errors.push("A route needs at least one order".to_string());
        }
        if !self.estimated_distance_km.is_finite() || self.estimated_distance_km < 0.0 {
            errors.push("Estimated distance cannot be negative".to_string());
        }
        let mut seen = self.order_ids.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.order_ids.len() {
            errors.push("An order can appear only once in a route".to_string());
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
    fn test_route_status_progression() {
        assert_eq!(RouteStatus::Pending.next(), Some(RouteStatus::InProgress));
        assert_eq!(RouteStatus::InProgress.next(), Some(RouteStatus::Completed));
        assert_eq!(RouteStatus::Completed.next(), None);
    }

    #[test]
    fn test_route_status_parse() {
        assert_eq!(RouteStatus::parse("En curso"), Some(RouteStatus::InProgress));
        assert_eq!(RouteStatus::parse("COMPLETADA"), Some(RouteStatus::Completed));
        assert_eq!(RouteStatus::parse("pending"), Some(RouteStatus::Pending));
        assert_eq!(RouteStatus::parse("cancelada"), None);
    }

    #[test]
    fn test_contains_order() {
        let route = Route {
            id: 1,
            courier_id: 9,
            scheduled_date: Timestamp::from_millis(0),
            estimated_distance_km: 12.5,
            estimated_duration_min: 45,
            status: RouteStatus::Pending,
            order_ids: vec![3, 4],
        };
        assert!(route.contains_order(4));
        assert!(!route.contains_order(5));
        assert_eq!(route.order_count(), 2);
    }

    #[test]
    fn test_new_route_validation() {
        let mut route = NewRoute {
            courier_id: 9,
            scheduled_date: Timestamp::from_millis(0),
            estimated_distance_km: 4.0,
            estimated_duration_min: 30,
            order_ids: vec![1, 2],
        };
        assert!(route.is_valid());

        route.order_ids = vec![1, 1];
        assert!(!route.is_valid());

        route.order_ids.clear();
        assert!(!route.is_valid());
    }
}
