//! Category documents.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    category::{Category, NewCategory},
    database_id::CategoryId,
    identity::UserId,
};

use super::SqliteBackend;

impl SqliteBackend {
    pub(super) fn notify_categories(&self, owner: UserId) -> Result<(), Error> {
        if !self.category_listeners.has_listeners(&owner) {
            return Ok(());
        }

        let categories = {
            let connection = self.lock()?;
            get_categories(&connection, owner)?
        };

        self.category_listeners.notify(&owner, categories);

        Ok(())
    }
}

pub(super) fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            color TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_category_user ON category(user_id);",
    )?;

    Ok(())
}

pub(super) fn insert_category(
    connection: &Connection,
    owner: UserId,
    category: &NewCategory,
    created_at: OffsetDateTime,
) -> Result<CategoryId, Error> {
    connection.execute(
        "INSERT INTO category (user_id, name, kind, color, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            owner.as_i64(),
            &category.name,
            category.kind,
            &category.color,
            created_at,
        ),
    )?;

    Ok(connection.last_insert_rowid())
}

/// Get `owner`'s categories in the order they were created.
pub(super) fn get_categories(
    connection: &Connection,
    owner: UserId,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, kind, color, created_at
            FROM category
            WHERE user_id = ?1
            ORDER BY created_at ASC, id ASC",
        )?
        .query_map([owner.as_i64()], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

pub(super) fn update_category(
    connection: &Connection,
    owner: UserId,
    category: &Category,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE category SET name = ?1, kind = ?2, color = ?3 WHERE id = ?4 AND user_id = ?5",
        (
            &category.name,
            category.kind,
            &category.color,
            category.id,
            owner.as_i64(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingCategory);
    }

    Ok(())
}

pub(super) fn delete_category(
    connection: &Connection,
    owner: UserId,
    id: CategoryId,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM category WHERE id = ?1 AND user_id = ?2",
        (id, owner.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingCategory);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        user_id: UserId::new(row.get(1)?),
        name: row.get(2)?,
        kind: row.get(3)?,
        color: row.get(4)?,
        created_at: row.get(5)?,
    })
}
