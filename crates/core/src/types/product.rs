//! Catalog product model

use crate::types::Validator;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Product identifier assigned by the server
pub type ProductId = i64;

/// A catalog product as mirrored from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    pub category: String,
    pub active: bool,
}

impl Product {
    /// Creates an active product
    pub fn new(
        id: ProductId,
        name: impl Into<String>,
        price: Decimal,
        stock: u32,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            price,
            stock,
            category: category.into(),
            active: true,
        }
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the active flag
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// A product can be sold when it is active and has units in stock
    pub fn is_available(&self) -> bool {
        self.active && self.stock > 0
    }
}

impl Validator for Product {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Name cannot be empty".to_string());
        }

        if self.price.is_sign_negative() {
            errors.push(format!("Price cannot be negative (got {})", self.price));
        }

        if self.category.trim().is_empty() {
            errors.push("Category cannot be empty".to_string());
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
    use rust_decimal::prelude::*;

    fn sample() -> Product {
        Product::new(1, "Agua 1.5L", Decimal::new(95, 2), 12, "Bebidas")
    }

    #[test]
    fn test_availability() {
        let product = sample();
        assert!(product.is_available());

        let inactive = sample().with_active(false);
        assert!(!inactive.is_available());

        let mut sold_out = sample();
        sold_out.stock = 0;
        assert!(!sold_out.is_available());
    }

    #[test]
    fn test_validation() {
        assert!(sample().is_valid());

        let mut bad = sample();
        bad.name = "  ".to_string();
        bad.price = Decimal::from_str("-1.00").unwrap();
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_zero_price_is_valid() {
        let mut free = sample();
        free.price = Decimal::ZERO;
        assert!(free.is_valid());
    }
}
