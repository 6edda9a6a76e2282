//! Domain model for shopping list data.
//!
//! # Invariants
//! - Every persisted record is identified by a unique `ShoppingItemId`.
//! - Deletion is a hard delete; there are no tombstones.

pub mod shopping_item;
