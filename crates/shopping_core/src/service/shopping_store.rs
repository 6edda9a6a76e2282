//! Shopping list store: writes, one-shot reads and live queries.
//!
//! # Responsibility
//! - Run every read and write through `SqliteShoppingRepository`.
//! - Notify live queries over `shopping_items` after each effective write.
//!
//! # Invariants
//! - The store performs no validation; items are persisted as given.
//! - Missing rows are not errors: `delete` is a no-op, lookups yield `None`.
//! - The connection lock is never held while observers run.

use crate::config::StoreConfig;
use crate::db::{open_db_in_memory, open_db_with_timeout, DbError, SHOPPING_ITEMS_TABLE};
use crate::live::delivery::DeliveryContext;
use crate::live::invalidation::InvalidationTracker;
use crate::live::live_query::LiveQuery;
use crate::model::shopping_item::{ShoppingItem, ShoppingItemId};
use crate::repo::shopping_repo::{RepoResult, ShoppingRepository, SqliteShoppingRepository};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::sync::Arc;

const DELIVERY_CONTEXT_NAME: &str = "shopping-delivery";

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure while opening a store.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    DeliveryContext(io::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DeliveryContext(err) => write!(f, "failed to start delivery context: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::DeliveryContext(err) => Some(err),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Query store for shopping items.
///
/// Cloning is cheap and yields another handle to the same database and
/// live queries.
#[derive(Clone)]
pub struct ShoppingStore {
    conn: Arc<Mutex<Connection>>,
    delivery: Arc<DeliveryContext>,
    tracker: Arc<InvalidationTracker>,
}

impl ShoppingStore {
    /// Opens the store described by `config`.
    ///
    /// Uses a private in-memory database when `database_path` is unset.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let conn = match config.database_path.as_deref() {
            Some(path) => open_db_with_timeout(path, config.busy_timeout())?,
            None => open_db_in_memory()?,
        };
        Self::from_connection(conn)
    }

    /// Opens a store over a fresh in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(open_db_in_memory()?)
    }

    /// Wraps an already bootstrapped connection (see `db::open_db`).
    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        let delivery = Arc::new(
            DeliveryContext::spawn(DELIVERY_CONTEXT_NAME).map_err(StoreError::DeliveryContext)?,
        );
        let tracker = Arc::new(InvalidationTracker::new(Arc::clone(&delivery)));
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            delivery,
            tracker,
        })
    }

    /// Delivery context shared by every live query of this store.
    pub fn delivery_context(&self) -> &Arc<DeliveryContext> {
        &self.delivery
    }

    /// Stores `item`, replacing any stored item with the same id.
    ///
    /// Returns the stored id, which is freshly assigned for unset ids.
    pub fn insert_or_replace(&self, item: &ShoppingItem) -> RepoResult<ShoppingItemId> {
        let id = {
            let conn = self.conn.lock();
            SqliteShoppingRepository::new(&conn).insert_or_replace(item)?
        };
        let scheduled = self.tracker.notify(SHOPPING_ITEMS_TABLE);
        info!(
            "event=item_upsert module=store status=ok item_id={} explicit_id={} live_queries={}",
            id,
            item.is_persisted(),
            scheduled
        );
        Ok(id)
    }

    /// Deletes the stored item matching `item`.
    ///
    /// Matches on id when set, otherwise on all remaining fields. Deleting
    /// an item that is not stored does nothing.
    pub fn delete(&self, item: &ShoppingItem) -> RepoResult<()> {
        let removed = {
            let conn = self.conn.lock();
            SqliteShoppingRepository::new(&conn).delete(item)?
        };
        if removed == 0 {
            debug!(
                "event=item_delete module=store status=noop item_id={}",
                item.id
            );
            return Ok(());
        }
        let scheduled = self.tracker.notify(SHOPPING_ITEMS_TABLE);
        info!(
            "event=item_delete module=store status=ok item_id={} removed={} live_queries={}",
            item.id, removed, scheduled
        );
        Ok(())
    }

    pub fn all_items(&self) -> RepoResult<Vec<ShoppingItem>> {
        let conn = self.conn.lock();
        SqliteShoppingRepository::new(&conn).list_all()
    }

    pub fn item_by_id(&self, id: ShoppingItemId) -> RepoResult<Option<ShoppingItem>> {
        let conn = self.conn.lock();
        SqliteShoppingRepository::new(&conn).get_by_id(id)
    }

    /// `SUM(price * amount)` over all items; `None` when there are none.
    pub fn total_price(&self) -> RepoResult<Option<f64>> {
        let conn = self.conn.lock();
        SqliteShoppingRepository::new(&conn).total_price()
    }

    /// Live snapshot of every stored item, in storage order.
    pub fn observe_all(&self) -> LiveQuery<Vec<ShoppingItem>> {
        self.live_query("observe_all", |conn| {
            SqliteShoppingRepository::new(conn).list_all()
        })
    }

    /// Live view of one item; delivers `None` while no item has `id`.
    pub fn observe_by_id(&self, id: ShoppingItemId) -> LiveQuery<Option<ShoppingItem>> {
        self.live_query(format!("observe_by_id:{id}"), move |conn| {
            SqliteShoppingRepository::new(conn).get_by_id(id)
        })
    }

    /// Live `SUM(price * amount)`; delivers `None` while the list is empty.
    pub fn observe_total_price(&self) -> LiveQuery<Option<f64>> {
        self.live_query("observe_total_price", |conn| {
            SqliteShoppingRepository::new(conn).total_price()
        })
    }

    /// Number of live queries created by this store that are still alive.
    pub fn live_query_count(&self) -> usize {
        self.tracker.tracked_count(SHOPPING_ITEMS_TABLE)
    }

    fn live_query<T>(
        &self,
        label: impl Into<String>,
        compute: impl Fn(&Connection) -> RepoResult<T> + Send + Sync + 'static,
    ) -> LiveQuery<T>
    where
        T: Send + Sync + 'static,
    {
        let query = LiveQuery::new(
            label,
            Arc::clone(&self.conn),
            Arc::clone(&self.delivery),
            compute,
        );
        self.tracker
            .register(SHOPPING_ITEMS_TABLE, query.table_observer());
        query
    }
}
