//! Shopping cart aggregation
//!
//! The cart is plain owned state: every mutation takes `&mut self`, so a single
//! writer is enforced at compile time. Totals are derived on every read.

use crate::types::{NewOrderLine, Product, ProductId};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// VAT applied on top of the subtotal (21%)
pub const TAX_RATE: Decimal = Decimal::from_parts(21, 0, 0, false, 2);

/// One product in the cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: Product,
    /// Always within `1..=product.stock`
    pub quantity: u32,
}

impl CartItem {
    /// Unit price × quantity
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

/// In-memory cart, keyed by product id, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one unit of `product`
    ///
    /// An existing line is incremented (up to stock) and its product snapshot
    /// refreshed; a new line starts at quantity 1. Products without stock are
    /// not added. Returns whether the cart changed.
    pub fn add_product(&mut self, product: Product) -> bool {
        if let Some(index) = self.position(product.id) {
            let stock = product.stock;
            if stock == 0 {
                self.items.remove(index);
                return true;
            }
            let item = &mut self.items[index];
            item.product = product;
            if item.quantity > stock {
                item.quantity = stock;
                return true;
            }
            if item.quantity < stock {
                item.quantity += 1;
                return true;
            }
            return false;
        }

        if product.stock == 0 {
            log::debug!("Product {} has no stock, not added to cart", product.id);
            return false;
        }

        self.items.push(CartItem {
            product,
            quantity: 1,
        });
        true
    }

    /// Removes the product's line entirely
    pub fn remove_product(&mut self, product_id: ProductId) -> bool {
        match self.position(product_id) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Sets the quantity when `0 < quantity <= stock`; anything else is ignored
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> bool {
        match self.item_mut(product_id) {
            Some(item) if quantity > 0 && quantity <= item.product.stock => {
                item.quantity = quantity;
                true
            }
            _ => false,
        }
    }

    /// Adds one unit, unless the line is already at stock
    pub fn increment(&mut self, product_id: ProductId) -> bool {
        match self.item_mut(product_id) {
            Some(item) if item.quantity < item.product.stock => {
                item.quantity += 1;
                true
            }
            _ => false,
        }
    }

    /// Removes one unit, unless the line is already at 1
    pub fn decrement(&mut self, product_id: ProductId) -> bool {
        match self.item_mut(product_id) {
            Some(item) if item.quantity > 1 => {
                item.quantity -= 1;
                true
            }
            _ => false,
        }
    }

    /// Σ price × quantity
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// subtotal × 21%, rounded to cents (half away from zero)
    pub fn tax(&self) -> Decimal {
        (self.subtotal() * TAX_RATE)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// subtotal + tax
    pub fn total(&self) -> Decimal {
        self.subtotal() + self.tax()
    }

    /// Σ quantity
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.items
            .iter()
            .find(|i| i.product.id == product_id)
            .map(|i| i.quantity)
    }

    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Order lines priced at the current product prices
    pub fn to_order_lines(&self) -> Vec<NewOrderLine> {
        self.items
            .iter()
            .map(|item| NewOrderLine {
                product_id: item.product.id,
                quantity: item.quantity,
                unit_price: item.product.price,
            })
            .collect()
    }

    fn position(&self, product_id: ProductId) -> Option<usize> {
        self.items.iter().position(|i| i.product.id == product_id)
    }

    fn item_mut(&mut self, product_id: ProductId) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|i| i.product.id == product_id)
    }
}
