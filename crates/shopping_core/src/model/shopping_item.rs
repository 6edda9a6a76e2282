//! Shopping item record.
//!
//! # Invariants
//! - `id == UNSET_ID` means "not persisted yet"; storage assigns a fresh id.
//! - `amount` and `price` are documented as non-negative but are not
//!   validated anywhere; values are stored exactly as given.

use serde::{Deserialize, Serialize};

/// Primary key of a stored shopping item.
pub type ShoppingItemId = i64;

/// Sentinel id for items that have not been stored yet.
pub const UNSET_ID: ShoppingItemId = 0;

/// One line of the shopping list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingItem {
    /// Display label.
    pub name: String,
    /// Quantity to buy.
    pub amount: i32,
    /// Unit price.
    pub price: f32,
    /// Opaque reference to a display image.
    pub image_url: String,
    /// Primary key; `UNSET_ID` until the store assigns one.
    #[serde(default)]
    pub id: ShoppingItemId,
}

impl ShoppingItem {
    /// Creates an item that has not been stored yet.
    pub fn new(
        name: impl Into<String>,
        amount: i32,
        price: f32,
        image_url: impl Into<String>,
    ) -> Self {
        Self::with_id(UNSET_ID, name, amount, price, image_url)
    }

    /// Creates an item with a caller-chosen id.
    ///
    /// Inserting it replaces any stored item with the same id.
    pub fn with_id(
        id: ShoppingItemId,
        name: impl Into<String>,
        amount: i32,
        price: f32,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            amount,
            price,
            image_url: image_url.into(),
            id,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != UNSET_ID
    }

    /// `price * amount`, the value this line contributes to the total.
    pub fn line_total(&self) -> f64 {
        f64::from(self.price) * f64::from(self.amount)
    }
}
