//! Email/password and federated accounts.

use rusqlite::{Connection, OptionalExtension, Row, params};
use time::OffsetDateTime;

use crate::{
    Error,
    backend::{AuthBackend, ClientId, Listener, Subscription},
    identity::{FederatedCredential, FederatedProvider, Identity, UserId},
    password::{PasswordHash, ValidatedPassword},
};

use super::SqliteBackend;

impl AuthBackend for SqliteBackend {
    fn sign_up(&self, client: ClientId, email: &str, password: &str) -> Result<Identity, Error> {
        let email = normalize_email(email)?;
        let local_part = email.split('@').next().unwrap_or_default();
        let password = ValidatedPassword::new(password, &[&email, local_part])?;
        let password_hash = PasswordHash::new(&password, self.password_cost)?;

        let identity = {
            let mut connection = self.lock()?;
            let sql_transaction = connection.transaction()?;
            let identity = insert_user(&sql_transaction, &email, Some(&password_hash), None)?;
            record_sign_in(&sql_transaction, client, identity.id)?;
            sql_transaction.commit()?;

            identity
        };

        self.auth_listeners.notify(&client, Some(identity.clone()));

        Ok(identity)
    }

    fn sign_in(&self, client: ClientId, email: &str, password: &str) -> Result<Identity, Error> {
        let email = email.trim().to_lowercase();

        let (identity, password_hash) = {
            let connection = self.lock()?;
            get_user_by_email(&connection, &email).map_err(|error| match error {
                Error::NotFound => Error::InvalidCredentials,
                error => error,
            })?
        };

        // Accounts created through a federated provider have no password.
        let Some(password_hash) = password_hash else {
            return Err(Error::InvalidCredentials);
        };

        if !password_hash.verify(password)? {
            return Err(Error::InvalidCredentials);
        }

        record_sign_in(&*self.lock()?, client, identity.id)?;
        self.auth_listeners.notify(&client, Some(identity.clone()));

        Ok(identity)
    }

    fn sign_in_federated(
        &self,
        client: ClientId,
        credential: &FederatedCredential,
    ) -> Result<Identity, Error> {
        let identity = {
            let mut connection = self.lock()?;
            let sql_transaction = connection.transaction()?;
            let user_id = find_or_link_federated_user(&sql_transaction, credential)?;
            let identity = get_identity(&sql_transaction, user_id)?;
            record_sign_in(&sql_transaction, client, user_id)?;
            sql_transaction.commit()?;

            Identity {
                provider: Some(credential.provider),
                ..identity
            }
        };

        self.auth_listeners.notify(&client, Some(identity.clone()));

        Ok(identity)
    }

    fn sign_out(&self, client: ClientId) -> Result<(), Error> {
        self.lock()?.execute(
            "DELETE FROM client_session WHERE client_id = ?1",
            [client.to_string()],
        )?;

        self.auth_listeners.notify(&client, None);

        Ok(())
    }

    fn restore(&self, client: ClientId, user_id: UserId) -> Result<Option<Identity>, Error> {
        let identity = {
            let connection = self.lock()?;
            let signed_in_as: Option<i64> = connection
                .query_row(
                    "SELECT user_id FROM client_session WHERE client_id = ?1",
                    [client.to_string()],
                    |row| row.get(0),
                )
                .optional()?;

            match signed_in_as {
                Some(id) if id == user_id.as_i64() => match get_identity(&connection, user_id) {
                    Ok(identity) => Some(identity),
                    Err(Error::NotFound) => None,
                    Err(error) => return Err(error),
                },
                _ => None,
            }
        };

        self.auth_listeners.notify(&client, identity.clone());

        Ok(identity)
    }

    fn on_auth_state_changed(
        &self,
        client: ClientId,
        listener: Listener<Option<Identity>>,
    ) -> Subscription {
        self.auth_listeners.register(client, listener)
    }
}

/// Trim and lowercase `email` and check that it looks like an address.
fn normalize_email(email: &str) -> Result<String, Error> {
    let email = email.trim().to_lowercase();

    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace) =>
        {
            Ok(email)
        }
        _ => Err(Error::InvalidEmail),
    }
}

pub(super) fn create_user_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password TEXT,
            display_name TEXT
        );

        CREATE TABLE IF NOT EXISTS federated_identity (
            provider TEXT NOT NULL,
            subject TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            PRIMARY KEY (provider, subject)
        );

        CREATE TABLE IF NOT EXISTS client_session (
            client_id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            signed_in_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );",
    )?;

    Ok(())
}

/// Remember that `client` is signed in as `user_id`, replacing whoever it was signed in as.
fn record_sign_in(
    connection: &Connection,
    client: ClientId,
    user_id: UserId,
) -> Result<(), rusqlite::Error> {
    connection.execute(
        "INSERT INTO client_session (client_id, user_id, signed_in_at) VALUES (?1, ?2, ?3)
        ON CONFLICT(client_id) DO UPDATE SET
            user_id = excluded.user_id,
            signed_in_at = excluded.signed_in_at",
        params![client.to_string(), user_id.as_i64(), OffsetDateTime::now_utc()],
    )?;

    Ok(())
}

fn insert_user(
    connection: &Connection,
    email: &str,
    password_hash: Option<&PasswordHash>,
    display_name: Option<&str>,
) -> Result<Identity, Error> {
    connection.execute(
        "INSERT INTO user (email, password, display_name) VALUES (?1, ?2, ?3)",
        params![
            email,
            password_hash.map(|hash| hash.as_ref().to_owned()),
            display_name
        ],
    )?;

    Ok(Identity {
        id: UserId::new(connection.last_insert_rowid()),
        email: email.to_owned(),
        display_name: display_name.map(str::to_owned),
        provider: None,
    })
}

/// The columns read by [map_identity]. A user with no password signs in through the
/// provider it is linked to.
const IDENTITY_COLUMNS: &str = "id, email, display_name,
    CASE WHEN password IS NULL THEN
        (SELECT provider FROM federated_identity WHERE user_id = user.id LIMIT 1)
    END";

fn map_identity(row: &Row) -> Result<Identity, rusqlite::Error> {
    let provider: Option<String> = row.get(3)?;

    Ok(Identity {
        id: UserId::new(row.get(0)?),
        email: row.get(1)?,
        display_name: row.get(2)?,
        provider: provider.as_deref().and_then(FederatedProvider::from_name),
    })
}

fn get_identity(connection: &Connection, user_id: UserId) -> Result<Identity, Error> {
    connection
        .prepare(&format!("SELECT {IDENTITY_COLUMNS} FROM user WHERE id = ?1"))?
        .query_row([user_id.as_i64()], map_identity)
        .map_err(|error| error.into())
}

fn get_user_by_email(
    connection: &Connection,
    email: &str,
) -> Result<(Identity, Option<PasswordHash>), Error> {
    connection
        .prepare(&format!(
            "SELECT {IDENTITY_COLUMNS}, password FROM user WHERE email = ?1"
        ))?
        .query_row([email], |row| {
            let identity = map_identity(row)?;
            let password: Option<String> = row.get(4)?;

            Ok((identity, password.map(PasswordHash::from_stored)))
        })
        .map_err(|error| error.into())
}

/// Find the user linked to the credential's subject, linking one first if needed.
///
/// An account that already uses the verified email is linked rather than duplicated.
fn find_or_link_federated_user(
    connection: &Connection,
    credential: &FederatedCredential,
) -> Result<UserId, Error> {
    let linked_user: Option<i64> = connection
        .query_row(
            "SELECT user_id FROM federated_identity WHERE provider = ?1 AND subject = ?2",
            (credential.provider.as_str(), &credential.subject),
            |row| row.get(0),
        )
        .optional()?;

    if let Some(user_id) = linked_user {
        return Ok(UserId::new(user_id));
    }

    let email = normalize_email(&credential.email)?;
    let existing_user: Option<i64> = connection
        .query_row("SELECT id FROM user WHERE email = ?1", [&email], |row| {
            row.get(0)
        })
        .optional()?;

    let user_id = match existing_user {
        Some(user_id) => {
            connection.execute(
                "UPDATE user SET display_name = COALESCE(display_name, ?2) WHERE id = ?1",
                params![user_id, credential.display_name],
            )?;
            UserId::new(user_id)
        }
        None => insert_user(connection, &email, None, credential.display_name.as_deref())?.id,
    };

    connection.execute(
        "INSERT INTO federated_identity (provider, subject, user_id) VALUES (?1, ?2, ?3)",
        params![credential.provider.as_str(), credential.subject, user_id.as_i64()],
    )?;

    tracing::info!(
        "linked {} subject to user {user_id}",
        credential.provider.as_str()
    );

    Ok(user_id)
}
