//! The signed-in identity's transactions, kept current by a live subscription.

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    Error,
    backend::DocumentBackend,
    database_id::TransactionId,
    identity::UserId,
    live_query::LiveCollection,
    session::{SessionState, require_owner},
    transaction::{NewTransaction, Transaction, TransactionTotals},
};

/// Validates writes before they reach the backend and mirrors the owner's transactions.
///
/// Writes never touch the local list, the subscription delivers the new list once the
/// backend has applied the write.
pub struct TransactionStore {
    owner: UserId,
    documents: Arc<dyn DocumentBackend>,
    session: watch::Receiver<SessionState>,
    transactions: LiveCollection<Transaction>,
}

impl TransactionStore {
    /// Subscribe to the transactions of the identity signed in to `session`.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] if nobody is signed in, or the backend's error if the
    /// subscription could not be created.
    pub fn mount(
        documents: Arc<dyn DocumentBackend>,
        session: watch::Receiver<SessionState>,
    ) -> Result<Self, Error> {
        let owner = session.borrow().user_id().ok_or(Error::NotLoggedIn)?;
        let transactions =
            LiveCollection::subscribe(|listener| documents.watch_transactions(owner, listener))?;

        Ok(Self {
            owner,
            documents,
            session,
            transactions,
        })
    }

    /// The identity whose transactions this store holds.
    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// All transactions, most recently recorded first.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions.snapshot()
    }

    /// Find a transaction by ID.
    pub fn get(&self, id: TransactionId) -> Option<Transaction> {
        self.transactions.with(|transactions| {
            transactions
                .iter()
                .find(|transaction| transaction.id == id)
                .cloned()
        })
    }

    /// Record a new transaction.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn], [Error::MissingFields] or [Error::NonPositiveAmount]
    /// without contacting the backend, otherwise the backend's error.
    pub fn add(&self, transaction: &NewTransaction) -> Result<TransactionId, Error> {
        let owner = require_owner(&self.session, self.owner)?;
        transaction.validate()?;

        let id = self.documents.add_transaction(owner, transaction)?;
        tracing::debug!("user {owner} added transaction {id}");

        Ok(id)
    }

    /// Overwrite an existing transaction.
    ///
    /// # Errors
    /// Same as [TransactionStore::add], plus [Error::UpdateMissingTransaction] if the
    /// transaction does not exist or belongs to someone else.
    pub fn update(&self, transaction: &Transaction) -> Result<(), Error> {
        let owner = require_owner(&self.session, self.owner)?;
        transaction.validate()?;

        self.documents.update_transaction(owner, transaction)
    }

    /// Delete a transaction.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn], or [Error::DeleteMissingTransaction] if the transaction
    /// does not exist or belongs to someone else.
    pub fn remove(&self, id: TransactionId) -> Result<(), Error> {
        let owner = require_owner(&self.session, self.owner)?;

        self.documents.delete_transaction(owner, id)
    }

    /// Income, expense and balance over every transaction.
    pub fn totals(&self) -> TransactionTotals {
        self.transactions.with(TransactionTotals::from_transactions)
    }

    /// The `count` most recently recorded transactions.
    pub fn recent(&self, count: usize) -> Vec<Transaction> {
        self.transactions
            .with(|transactions| transactions.iter().take(count).cloned().collect())
    }

    /// Cancel the live subscription.
    pub fn unmount(&self) {
        self.transactions.unmount();
    }
}
