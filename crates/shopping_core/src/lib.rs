//! Local persistence for the shopping list.
//! Stores shopping items in SQLite and keeps query results live for observers.

pub mod config;
pub mod db;
pub mod live;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, StoreConfig};
pub use live::{
    await_first_value, await_value, AwaitError, DeliveryContext, LiveQuery, LiveValue,
    Observable, Observer, ObserverId, DEFAULT_AWAIT_TIMEOUT,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::shopping_item::{ShoppingItem, ShoppingItemId, UNSET_ID};
pub use repo::shopping_repo::{
    RepoError, RepoResult, ShoppingRepository, SqliteShoppingRepository,
};
pub use service::shopping_store::{ShoppingStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
