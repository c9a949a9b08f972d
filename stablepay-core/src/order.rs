//! Cart and order summary math.
//!
//! All money is `rust_decimal::Decimal`; nothing here ever goes through
//! floating point, so totals survive the trip to integer cents exactly.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::utils::money::{usd_cents, AmountError};

/// Flat shipping charge applied to every order.
pub const SHIPPING_FLAT_USD: Decimal = dec!(2.49);

/// Sales tax rate applied to the merchandise subtotal.
pub const TAX_RATE: Decimal = dec!(0.10);

/// A purchasable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub name: String,
    /// Unit price in USD.
    pub unit_price: Decimal,
}

/// One cart line: an item, its chosen size, and a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub item: LineItem,
    pub size: Option<String>,
    pub quantity: u32,
}

/// A shopping cart.  Lines are keyed by item id and size, so the same item
/// in two sizes occupies two lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    entries: Vec<CartEntry>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `quantity` of an item, merging into an existing line when the
    /// item id and size both match.
    pub fn add(&mut self, item: LineItem, size: Option<String>, quantity: u32) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.item.id == item.id && entry.size == size)
        {
            entry.quantity = entry.quantity.saturating_add(quantity);
            return;
        }
        self.entries.push(CartEntry {
            item,
            size,
            quantity,
        });
    }

    /// Remove the line matching an item id and size, if any.
    pub fn remove(&mut self, item_id: &str, size: Option<&str>) {
        self.entries
            .retain(|entry| !(entry.item.id == item_id && entry.size.as_deref() == size));
    }

    /// Set the quantity of an existing line.  A quantity of zero removes
    /// the line.
    pub fn set_quantity(&mut self, item_id: &str, size: Option<&str>, quantity: u32) {
        if quantity == 0 {
            self.remove(item_id, size);
            return;
        }
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.item.id == item_id && entry.size.as_deref() == size)
        {
            entry.quantity = quantity;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    /// Total number of units across all lines.
    pub fn total_items(&self) -> u32 {
        self.entries
            .iter()
            .fold(0, |acc, entry| acc.saturating_add(entry.quantity))
    }

    /// Merchandise subtotal in USD.
    pub fn subtotal(&self) -> Decimal {
        self.entries
            .iter()
            .map(|entry| entry.item.unit_price * Decimal::from(entry.quantity))
            .sum()
    }
}

/// Totals for one order: subtotal, flat shipping, tax, and the grand total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderSummary {
    /// Compute order totals from a merchandise subtotal.
    ///
    /// Tax is rounded to whole cents, half away from zero, before it enters
    /// the total.
    pub fn from_subtotal(subtotal: Decimal) -> Self {
        let shipping = SHIPPING_FLAT_USD;
        let tax = (subtotal * TAX_RATE)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let total = subtotal + shipping + tax;
        Self {
            subtotal,
            shipping,
            tax,
            total,
        }
    }

    pub fn from_cart(cart: &Cart) -> Self {
        Self::from_subtotal(cart.subtotal())
    }

    /// The grand total in integer cents, as sent to the payment session.
    pub fn total_usd_cents(&self) -> Result<u64, AmountError> {
        usd_cents(self.total)
    }
}
