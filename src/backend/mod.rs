//! The seam between the application and the service that owns identities and documents.
//!
//! Everything that persists data or issues identities goes through [AuthBackend] and
//! [DocumentBackend]. Live results are delivered to [Listener]s, always as the full current
//! result set rather than a diff, and each registration is a scoped [Subscription].

mod sqlite;
mod subscription;

use uuid::Uuid;

pub use sqlite::{SqliteBackend, initialize};
pub use subscription::{Listener, ListenerRegistry, Subscription};

#[cfg(test)]
pub(crate) use sqlite::test_utils::get_test_backend;

use crate::{
    Error,
    category::{Category, NewCategory},
    database_id::{CategoryId, TransactionId},
    identity::{FederatedCredential, Identity, UserId},
    transaction::{NewTransaction, Transaction},
};

/// Identifies one client of the auth backend, e.g. one browser session.
///
/// Auth state is tracked per client: signing in on one client does not sign in another.
pub type ClientId = Uuid;

/// Issues and revokes identities.
pub trait AuthBackend: Send + Sync {
    /// Create an account with an email and password and sign `client` in as the new identity.
    fn sign_up(&self, client: ClientId, email: &str, password: &str) -> Result<Identity, Error>;

    /// Sign `client` in with an email and password.
    fn sign_in(&self, client: ClientId, email: &str, password: &str) -> Result<Identity, Error>;

    /// Sign `client` in with an assertion from a federated provider.
    fn sign_in_federated(
        &self,
        client: ClientId,
        credential: &FederatedCredential,
    ) -> Result<Identity, Error>;

    /// Sign `client` out.
    fn sign_out(&self, client: ClientId) -> Result<(), Error>;

    /// Resolve the identity `client` was previously signed in as.
    ///
    /// Returns `None` if the identity no longer exists.
    fn restore(&self, client: ClientId, user_id: UserId) -> Result<Option<Identity>, Error>;

    /// Register `listener` to receive every auth-state change of `client`.
    fn on_auth_state_changed(
        &self,
        client: ClientId,
        listener: Listener<Option<Identity>>,
    ) -> Subscription;
}

/// Stores transactions, categories and settings documents, scoped by owner.
///
/// Writes never return the updated collection, consumers learn about changes through the
/// `watch_*` subscriptions.
pub trait DocumentBackend: Send + Sync {
    /// Add a transaction owned by `owner`, stamping it with the creation time.
    fn add_transaction(
        &self,
        owner: UserId,
        transaction: &NewTransaction,
    ) -> Result<TransactionId, Error>;

    /// Overwrite the editable fields of one of `owner`'s transactions.
    fn update_transaction(&self, owner: UserId, transaction: &Transaction) -> Result<(), Error>;

    /// Delete one of `owner`'s transactions.
    fn delete_transaction(&self, owner: UserId, id: TransactionId) -> Result<(), Error>;

    /// Deliver `owner`'s transactions, newest first, now and after every change.
    fn watch_transactions(
        &self,
        owner: UserId,
        listener: Listener<Vec<Transaction>>,
    ) -> Result<Subscription, Error>;

    /// Add a category owned by `owner`.
    fn add_category(&self, owner: UserId, category: &NewCategory) -> Result<CategoryId, Error>;

    /// Overwrite the name, kind and color of one of `owner`'s categories.
    fn update_category(&self, owner: UserId, category: &Category) -> Result<(), Error>;

    /// Delete one of `owner`'s categories.
    fn delete_category(&self, owner: UserId, id: CategoryId) -> Result<(), Error>;

    /// Deliver `owner`'s categories now and after every change.
    fn watch_categories(
        &self,
        owner: UserId,
        listener: Listener<Vec<Category>>,
    ) -> Result<Subscription, Error>;

    /// Read `owner`'s settings document, if one has been written.
    fn get_settings(&self, owner: UserId) -> Result<Option<serde_json::Value>, Error>;

    /// Replace `owner`'s settings document.
    fn set_settings(&self, owner: UserId, document: &serde_json::Value) -> Result<(), Error>;
}
