//! Cart Aggregate
//!
//! Pure state: every mutation is expressed as a [`CartOp`] applied to an old
//! cart to produce a new one. Persistence lives in [`crate::cart::CartStore`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::{Money, ProductId, Quantity};

/// One product snapshot with its quantity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: Quantity,
}

impl CartLine {
    /// Price-on-request products count as zero.
    pub fn line_total(&self) -> Money {
        self.product.price.unwrap_or(Money::ZERO).multiply(self.quantity)
    }
}

/// Ordered cart lines, at most one per product id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CartLine>", into = "Vec<CartLine>")]
pub struct Cart {
    lines: Vec<CartLine>,
}

#[derive(Clone, Debug)]
pub enum CartOp {
    /// Appends the snapshot with quantity 1, or increments an existing line.
    Add(Product),
    /// Sets the quantity exactly; `<= 0` removes the line.
    SetQuantity { product_id: ProductId, quantity: i64 },
    Remove(ProductId),
    /// Takes the quantities of an ordered snapshot out of the cart. Lines that
    /// reach zero are dropped; lines added since the snapshot stay.
    Subtract(Cart),
    Clear,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product.id == product_id)
    }

    pub fn total_items(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity.value())).sum()
    }

    pub fn total_amount(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn apply(mut self, op: CartOp) -> Self {
        match op {
            CartOp::Add(product) => {
                if let Some(existing) = self.lines.iter_mut().find(|l| l.product.id == product.id) {
                    existing.quantity = existing.quantity.increment();
                } else {
                    self.lines.push(CartLine { product, quantity: Quantity::ONE });
                }
            }
            CartOp::SetQuantity { product_id, quantity } => match Quantity::new(quantity) {
                Some(q) => {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.product.id == product_id) {
                        line.quantity = q;
                    }
                }
                None => self.lines.retain(|l| l.product.id != product_id),
            },
            CartOp::Remove(product_id) => self.lines.retain(|l| l.product.id != product_id),
            CartOp::Subtract(ordered) => {
                for done in ordered.lines {
                    let Some(pos) = self.lines.iter().position(|l| l.product.id == done.product.id) else { continue };
                    let left = i64::from(self.lines[pos].quantity.value()) - i64::from(done.quantity.value());
                    match Quantity::new(left) {
                        Some(q) => self.lines[pos].quantity = q,
                        None => {
                            self.lines.remove(pos);
                        }
                    }
                }
            }
            CartOp::Clear => self.lines.clear(),
        }
        self
    }
}

impl TryFrom<Vec<CartLine>> for Cart {
    type Error = CartError;

    fn try_from(lines: Vec<CartLine>) -> Result<Self, Self::Error> {
        let mut seen = HashSet::new();
        if let Some(dup) = lines.iter().find(|l| !seen.insert(l.product.id.clone())) {
            return Err(CartError::DuplicateLine(dup.product.id.clone()));
        }
        Ok(Self { lines })
    }
}

impl From<Cart> for Vec<CartLine> {
    fn from(cart: Cart) -> Self { cart.lines }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("duplicate cart line for product {0}")]
    DuplicateLine(ProductId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::Category;

    fn product(id: &str, price: Option<i64>) -> Product {
        let p = Product::new(ProductId::new(id).unwrap(), format!("Product {id}"), Category::Battery);
        match price { Some(units) => p.with_price(Money::from_units(units)), None => p }
    }

    fn id(s: &str) -> ProductId { ProductId::new(s).unwrap() }

    #[test]
    fn test_add_twice_merges() {
        let p = product("P1", Some(100));
        let cart = Cart::new().apply(CartOp::Add(p.clone())).apply(CartOp::Add(p));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity.value(), 2);
    }

    #[test]
    fn test_set_quantity_is_exact() {
        let cart = Cart::new()
            .apply(CartOp::Add(product("P1", Some(100))))
            .apply(CartOp::SetQuantity { product_id: id("P1"), quantity: 5 });
        assert_eq!(cart.line(&id("P1")).unwrap().quantity.value(), 5);
        // Unknown id is a no-op rather than an insert.
        let cart = cart.apply(CartOp::SetQuantity { product_id: id("nope"), quantity: 3 });
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn test_oversized_quantity_keeps_line() {
        let cart = Cart::new()
            .apply(CartOp::Add(product("P1", Some(1))))
            .apply(CartOp::SetQuantity { product_id: id("P1"), quantity: 5_000_000_000 });
        assert_eq!(cart.line(&id("P1")).unwrap().quantity.value(), u32::MAX);
    }

    #[test]
    fn test_total_items_does_not_overflow() {
        let cart = Cart::new()
            .apply(CartOp::Add(product("P1", Some(1))))
            .apply(CartOp::Add(product("P2", Some(1))))
            .apply(CartOp::SetQuantity { product_id: id("P1"), quantity: 4_000_000_000 })
            .apply(CartOp::SetQuantity { product_id: id("P2"), quantity: 4_000_000_000 });
        assert_eq!(cart.total_items(), 8_000_000_000);
        assert_eq!(cart.total_amount(), Money::from_units(8_000_000_000));
    }

    #[test]
    fn test_set_quantity_zero_equals_remove() {
        let base = Cart::new()
            .apply(CartOp::Add(product("P1", Some(100))))
            .apply(CartOp::Add(product("P2", Some(50))));
        for q in [0, -1, -100] {
            let via_set = base.clone().apply(CartOp::SetQuantity { product_id: id("P1"), quantity: q });
            let via_remove = base.clone().apply(CartOp::Remove(id("P1")));
            assert_eq!(via_set, via_remove);
        }
    }

    #[test]
    fn test_subtract_keeps_lines_added_after_snapshot() {
        let ordered = Cart::new()
            .apply(CartOp::Add(product("P1", Some(10))))
            .apply(CartOp::Add(product("P2", Some(10))))
            .apply(CartOp::SetQuantity { product_id: id("P2"), quantity: 2 });
        let live = ordered
            .clone()
            .apply(CartOp::Add(product("P3", Some(10))))
            .apply(CartOp::SetQuantity { product_id: id("P2"), quantity: 5 });

        let left = live.apply(CartOp::Subtract(ordered));
        assert!(left.line(&id("P1")).is_none());
        assert_eq!(left.line(&id("P2")).unwrap().quantity.value(), 3);
        assert_eq!(left.line(&id("P3")).unwrap().quantity.value(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let cart = Cart::new().apply(CartOp::Add(product("P1", None)));
        assert_eq!(cart.clone().apply(CartOp::Remove(id("missing"))), cart);
    }

    #[test]
    fn test_totals_treat_price_on_request_as_zero() {
        let cart = Cart::new()
            .apply(CartOp::Add(product("P1", Some(42000))))
            .apply(CartOp::Add(product("P1", Some(42000))))
            .apply(CartOp::Add(product("P2", None)))
            .apply(CartOp::SetQuantity { product_id: id("P2"), quantity: 3 });
        assert_eq!(cart.total_items(), 5);
        assert_eq!(cart.total_amount(), Money::from_units(84000));
    }

    #[test]
    fn test_invariants_hold_over_op_sequence() {
        let ids = ["A", "B", "C"];
        let mut cart = Cart::new();
        for step in 0..60_i64 {
            let target = ids[(step % 3) as usize];
            let op = match step % 5 {
                0 | 1 => CartOp::Add(product(target, Some(10))),
                2 => CartOp::SetQuantity { product_id: id(target), quantity: (step % 7) - 3 },
                3 => CartOp::Remove(id(ids[((step + 1) % 3) as usize])),
                _ => CartOp::SetQuantity { product_id: id(target), quantity: step },
            };
            cart = cart.apply(op);
            let unique: HashSet<_> = cart.lines().iter().map(|l| l.product.id.clone()).collect();
            assert_eq!(unique.len(), cart.lines().len());
            assert!(cart.lines().iter().all(|l| l.quantity.value() > 0));
        }
    }

    #[test]
    fn test_serialization_roundtrip_preserves_order() {
        let cart = Cart::new()
            .apply(CartOp::Add(product("Z", Some(1))))
            .apply(CartOp::Add(product("A", Some(2))))
            .apply(CartOp::SetQuantity { product_id: id("Z"), quantity: 4 });
        let json = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cart);
    }

    #[test]
    fn test_duplicate_lines_rejected_on_deserialize() {
        let line = CartLine { product: product("P1", Some(1)), quantity: Quantity::ONE };
        let json = serde_json::to_string(&vec![line.clone(), line]).unwrap();
        assert!(serde_json::from_str::<Cart>(&json).is_err());
    }
}
