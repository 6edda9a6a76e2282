//! Core use-case services.
//!
//! # Responsibility
//! - Own the shared connection and expose the shopping list operations.
//! - Connect repository writes to live query invalidation.

pub mod shopping_store;
