//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the data access contract for shopping items.
//! - Keep SQL details out of the store and live query layers.
//!
//! # Invariants
//! - Missing rows are never an error: lookups yield `None`, deletes are no-ops.
//! - Input values are persisted as given, without validation.

pub mod shopping_repo;
