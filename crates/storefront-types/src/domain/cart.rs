use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::Product;

pub const MAX_LINE_QUANTITY: u32 = 99;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartLine {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    pub fn new(user_id: Uuid, product_id: Uuid, quantity: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            quantity,
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds `by` to the line, holding it at `cap` when one is given.
    pub fn increment(&mut self, by: u32, cap: Option<u32>) {
        let next = self.quantity.saturating_add(by);
        self.quantity = cap.map_or(next, |cap| next.min(cap));
        self.updated_at = Utc::now();
    }

    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
        self.updated_at = Utc::now();
    }
}

/// Quantity rules applied before anything is written to a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartPolicy {
    pub max_line_quantity: u32,
    /// Whether an increment on an existing line is held at the line cap.
    pub clamp_on_increment: bool,
}

impl Default for CartPolicy {
    fn default() -> Self {
        Self {
            max_line_quantity: MAX_LINE_QUANTITY,
            clamp_on_increment: true,
        }
    }
}

impl CartPolicy {
    pub fn line_cap(&self, product: &Product) -> u32 {
        product.stock_quantity.min(self.max_line_quantity)
    }

    /// Clamps a requested quantity into `1..=line_cap`. Zero and negative
    /// requests become 1. Returns `None` when the product cannot be ordered at all.
    pub fn clamp(&self, product: &Product, requested: i64) -> Option<u32> {
        let cap = self.line_cap(product);
        if cap == 0 || !product.is_active {
            return None;
        }
        let clamped = requested.clamp(1, i64::from(cap));
        Some(u32::try_from(clamped).unwrap_or(cap))
    }

    pub fn increment_cap(&self, product: &Product) -> Option<u32> {
        self.clamp_on_increment.then(|| self.line_cap(product))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    pub line: CartLine,
    pub product: Product,
}

impl CartItem {
    pub fn line_total(&self) -> i64 {
        i64::from(self.line.quantity) * self.product.price
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub line_count: u64,
    pub subtotal: i64,
}

impl CartView {
    pub fn new(items: Vec<CartItem>) -> Self {
        let subtotal = items.iter().map(CartItem::line_total).sum();
        Self {
            line_count: items.len() as u64,
            items,
            subtotal,
        }
    }
}

/// Outcome of an add-or-increment at the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartUpsert {
    pub line: CartLine,
    /// `true` when the line did not exist before this write.
    pub inserted: bool,
}

/// Result of a cart write: the line as stored and the user's line count after it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartUpdate {
    pub line: CartLine,
    pub line_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::Category;

    fn product(stock: u32) -> Product {
        Product::new("Mug".into(), None, Category::Home, 800, stock).unwrap()
    }

    #[test]
    fn clamp_holds_quantity_inside_bounds() {
        let policy = CartPolicy::default();
        assert_eq!(policy.clamp(&product(5), 0), Some(1));
        assert_eq!(policy.clamp(&product(5), 3), Some(3));
        assert_eq!(policy.clamp(&product(5), 40), Some(5));
        assert_eq!(policy.clamp(&product(500), 400), Some(99));
        assert_eq!(policy.clamp(&product(5), -1), Some(1));
        assert_eq!(policy.clamp(&product(5), i64::MIN), Some(1));
        assert_eq!(policy.clamp(&product(5), i64::MAX), Some(5));
    }

    #[test]
    fn clamp_rejects_unorderable_products() {
        let policy = CartPolicy::default();
        assert_eq!(policy.clamp(&product(0), 1), None);
        let mut inactive = product(10);
        inactive.is_active = false;
        assert_eq!(policy.clamp(&inactive, 1), None);
    }

    #[test]
    fn increment_cap_follows_policy() {
        let p = product(7);
        assert_eq!(CartPolicy::default().increment_cap(&p), Some(7));
        let open = CartPolicy {
            clamp_on_increment: false,
            ..Default::default()
        };
        assert_eq!(open.increment_cap(&p), None);
    }

    #[test]
    fn increment_respects_cap() {
        let mut line = CartLine::new(Uuid::new_v4(), Uuid::new_v4(), 4);
        line.increment(3, None);
        assert_eq!(line.quantity, 7);
        line.increment(10, Some(9));
        assert_eq!(line.quantity, 9);
    }

    #[test]
    fn view_sums_lines() {
        let p = product(10);
        let items = vec![CartItem {
            line: CartLine::new(Uuid::new_v4(), p.id, 3),
            product: p,
        }];
        let view = CartView::new(items);
        assert_eq!(view.line_count, 1);
        assert_eq!(view.subtotal, 2400);
    }
}
