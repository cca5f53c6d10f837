//! A backend that keeps identities and documents in a SQLite database.
//!
//! Every write re-reads the affected owner's collection and delivers it to that owner's
//! listeners once the database lock has been released. Writes to a collection hold that
//! collection's delivery lock until their snapshot has been delivered, so listeners see
//! snapshots in write order and the last one they receive is always current. Listeners must
//! not write to the collection they watch.

mod auth;
mod category;
mod settings;
mod transaction;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use time::OffsetDateTime;

use crate::{
    Error,
    backend::{ClientId, DocumentBackend, Listener, ListenerRegistry, Subscription},
    category::{Category, NewCategory},
    database_id::{CategoryId, TransactionId},
    identity::{Identity, UserId},
    password::PasswordHash,
    transaction::{NewTransaction, Transaction},
};

/// Identities, transactions, categories and settings stored in SQLite.
pub struct SqliteBackend {
    connection: Arc<Mutex<Connection>>,
    password_cost: u32,
    auth_listeners: Arc<ListenerRegistry<ClientId, Option<Identity>>>,
    transaction_listeners: Arc<ListenerRegistry<UserId, Vec<Transaction>>>,
    category_listeners: Arc<ListenerRegistry<UserId, Vec<Category>>>,
    transaction_delivery: Mutex<()>,
    category_delivery: Mutex<()>,
}

impl SqliteBackend {
    /// Create the tables in `connection` if needed and wrap it.
    ///
    /// # Errors
    /// Returns an error if the tables could not be created.
    pub fn new(connection: Connection) -> Result<Self, Error> {
        initialize(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            password_cost: PasswordHash::DEFAULT_COST,
            auth_listeners: ListenerRegistry::new(),
            transaction_listeners: ListenerRegistry::new(),
            category_listeners: ListenerRegistry::new(),
            transaction_delivery: Mutex::new(()),
            category_delivery: Mutex::new(()),
        })
    }

    /// Set the bcrypt cost used for new passwords.
    ///
    /// Tests use a low cost so that signing up does not dominate their run time.
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|_| Error::DatabaseLockError)
    }

    /// Hold `delivery` while writing and notifying so snapshots are delivered in write order.
    fn ordered(delivery: &Mutex<()>) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentBackend for SqliteBackend {
    fn add_transaction(
        &self,
        owner: UserId,
        transaction: &NewTransaction,
    ) -> Result<TransactionId, Error> {
        let _delivery = Self::ordered(&self.transaction_delivery);

        let id = {
            let connection = self.lock()?;
            let created_at = OffsetDateTime::now_utc();
            transaction::insert_transaction(&connection, owner, transaction, created_at)?
        };

        self.notify_transactions(owner)?;

        Ok(id)
    }

    fn update_transaction(&self, owner: UserId, transaction: &Transaction) -> Result<(), Error> {
        let _delivery = Self::ordered(&self.transaction_delivery);

        {
            let connection = self.lock()?;
            transaction::update_transaction(&connection, owner, transaction)?;
        }

        self.notify_transactions(owner)
    }

    fn delete_transaction(&self, owner: UserId, id: TransactionId) -> Result<(), Error> {
        let _delivery = Self::ordered(&self.transaction_delivery);

        {
            let connection = self.lock()?;
            transaction::delete_transaction(&connection, owner, id)?;
        }

        self.notify_transactions(owner)
    }

    fn watch_transactions(
        &self,
        owner: UserId,
        listener: Listener<Vec<Transaction>>,
    ) -> Result<Subscription, Error> {
        // No write can be delivered between the initial snapshot and the registration.
        let _delivery = Self::ordered(&self.transaction_delivery);

        let (transactions, subscription) = {
            let connection = self.lock()?;
            let transactions = transaction::get_transactions(&connection, owner)?;
            let subscription = self.transaction_listeners.register(owner, listener.clone());
            (transactions, subscription)
        };

        listener(transactions);

        Ok(subscription)
    }

    fn add_category(
        &self,
        owner: UserId,
        new_category: &NewCategory,
    ) -> Result<CategoryId, Error> {
        let _delivery = Self::ordered(&self.category_delivery);

        let id = {
            let connection = self.lock()?;
            let created_at = OffsetDateTime::now_utc();
            category::insert_category(&connection, owner, new_category, created_at)?
        };

        self.notify_categories(owner)?;

        Ok(id)
    }

    fn update_category(&self, owner: UserId, updated: &Category) -> Result<(), Error> {
        let _delivery = Self::ordered(&self.category_delivery);

        {
            let connection = self.lock()?;
            category::update_category(&connection, owner, updated)?;
        }

        self.notify_categories(owner)
    }

    fn delete_category(&self, owner: UserId, id: CategoryId) -> Result<(), Error> {
        let _delivery = Self::ordered(&self.category_delivery);

        {
            let connection = self.lock()?;
            category::delete_category(&connection, owner, id)?;
        }

        self.notify_categories(owner)
    }

    fn watch_categories(
        &self,
        owner: UserId,
        listener: Listener<Vec<Category>>,
    ) -> Result<Subscription, Error> {
        let _delivery = Self::ordered(&self.category_delivery);

        let (categories, subscription) = {
            let connection = self.lock()?;
            let categories = category::get_categories(&connection, owner)?;
            let subscription = self.category_listeners.register(owner, listener.clone());
            (categories, subscription)
        };

        listener(categories);

        Ok(subscription)
    }

    fn get_settings(&self, owner: UserId) -> Result<Option<serde_json::Value>, Error> {
        let connection = self.lock()?;
        settings::get_settings(&connection, owner)
    }

    fn set_settings(&self, owner: UserId, document: &serde_json::Value) -> Result<(), Error> {
        let connection = self.lock()?;
        settings::set_settings(&connection, owner, document)
    }
}

/// Create all of the tables in a single transaction.
///
/// # Errors
/// Returns an error if a table could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let sql_transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    auth::create_user_tables(&sql_transaction)?;
    transaction::create_transaction_table(&sql_transaction)?;
    category::create_category_table(&sql_transaction)?;
    settings::create_settings_table(&sql_transaction)?;

    sql_transaction.commit()?;

    Ok(())
}
