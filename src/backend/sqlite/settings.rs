//! Settings documents, stored as JSON text.

use rusqlite::{Connection, OptionalExtension};

use crate::{Error, identity::UserId};

pub(super) fn create_settings_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            user_id INTEGER PRIMARY KEY,
            document TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Get `owner`'s settings document.
///
/// # Errors
/// Returns [Error::JSONSerializationError] if the stored text is not valid JSON.
pub(super) fn get_settings(
    connection: &Connection,
    owner: UserId,
) -> Result<Option<serde_json::Value>, Error> {
    let document: Option<String> = connection
        .query_row(
            "SELECT document FROM settings WHERE user_id = ?1",
            [owner.as_i64()],
            |row| row.get(0),
        )
        .optional()?;

    document
        .map(|document| {
            serde_json::from_str(&document)
                .map_err(|error| Error::JSONSerializationError(error.to_string()))
        })
        .transpose()
}

/// Replace `owner`'s settings document.
pub(super) fn set_settings(
    connection: &Connection,
    owner: UserId,
    document: &serde_json::Value,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO settings (user_id, document) VALUES (?1, ?2)
        ON CONFLICT(user_id) DO UPDATE SET document = excluded.document",
        (owner.as_i64(), document.to_string()),
    )?;

    Ok(())
}
