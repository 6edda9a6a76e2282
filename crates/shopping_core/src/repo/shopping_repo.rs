//! Shopping item repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/delete and the three read shapes over `shopping_items`.
//! - Map rows to `ShoppingItem` and reject rows that cannot be represented.
//!
//! # Invariants
//! - Insert uses replace-on-conflict: the stored row is overwritten entirely.
//! - Reads have no explicit sort key; list order is the table's rowid order.

use crate::db::DbError;
use crate::model::shopping_item::{ShoppingItem, ShoppingItemId};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    name,
    amount,
    price,
    image_url
FROM shopping_items";

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for shopping item persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted shopping item data: {message}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Data access contract for shopping items.
pub trait ShoppingRepository {
    /// Stores `item`, replacing any row with the same id. Returns the stored id.
    fn insert_or_replace(&self, item: &ShoppingItem) -> RepoResult<ShoppingItemId>;
    /// Removes the matching row and returns how many rows were removed.
    ///
    /// Matches by id when `item` is persisted, otherwise by every other
    /// field; of several identical unsaved rows only the oldest is removed.
    fn delete(&self, item: &ShoppingItem) -> RepoResult<usize>;
    fn list_all(&self) -> RepoResult<Vec<ShoppingItem>>;
    fn get_by_id(&self, id: ShoppingItemId) -> RepoResult<Option<ShoppingItem>>;
    /// `SUM(price * amount)`; `None` when the table is empty.
    fn total_price(&self) -> RepoResult<Option<f64>>;
}

/// SQLite-backed shopping item repository.
pub struct SqliteShoppingRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteShoppingRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ShoppingRepository for SqliteShoppingRepository<'_> {
    fn insert_or_replace(&self, item: &ShoppingItem) -> RepoResult<ShoppingItemId> {
        // NULL lets SQLite assign the next id.
        let id = item.is_persisted().then_some(item.id);
        self.conn.execute(
            "INSERT OR REPLACE INTO shopping_items (
                id,
                name,
                amount,
                price,
                image_url
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                id,
                item.name.as_str(),
                item.amount,
                f64::from(item.price),
                item.image_url.as_str(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn delete(&self, item: &ShoppingItem) -> RepoResult<usize> {
        let removed = if item.is_persisted() {
            self.conn
                .execute("DELETE FROM shopping_items WHERE id = ?1;", [item.id])?
        } else {
            self.conn.execute(
                "DELETE FROM shopping_items
                 WHERE id = (
                     SELECT id
                     FROM shopping_items
                     WHERE name = ?1
                       AND amount = ?2
                       AND price = ?3
                       AND image_url = ?4
                     ORDER BY id
                     LIMIT 1
                 );",
                params![
                    item.name.as_str(),
                    item.amount,
                    f64::from(item.price),
                    item.image_url.as_str(),
                ],
            )?
        };

        Ok(removed)
    }

    fn list_all(&self) -> RepoResult<Vec<ShoppingItem>> {
        let mut stmt = self.conn.prepare(&format!("{ITEM_SELECT_SQL};"))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();

        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }

        Ok(items)
    }

    fn get_by_id(&self, id: ShoppingItemId) -> RepoResult<Option<ShoppingItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ITEM_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }

        Ok(None)
    }

    fn total_price(&self) -> RepoResult<Option<f64>> {
        let total = self.conn.query_row(
            "SELECT SUM(price * amount) FROM shopping_items;",
            [],
            |row| row.get::<_, Option<f64>>(0),
        )?;

        Ok(total)
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<ShoppingItem> {
    let id: ShoppingItemId = row.get("id")?;

    let amount_raw: i64 = row.get("amount")?;
    let amount = i32::try_from(amount_raw).map_err(|_| {
        RepoError::InvalidData(format!(
            "amount `{amount_raw}` out of range in shopping_items.amount (id={id})"
        ))
    })?;

    let price_raw: f64 = row.get("price")?;

    Ok(ShoppingItem {
        id,
        name: row.get("name")?,
        amount,
        // Stored from an f32, so narrowing back is lossless.
        price: price_raw as f32,
        image_url: row.get("image_url")?,
    })
}
