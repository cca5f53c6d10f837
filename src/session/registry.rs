//! Maps session IDs to the per-client session and the stores mounted for its identity.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use time::OffsetDateTime;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    Error,
    backend::{AuthBackend, ClientId, DocumentBackend},
    category::CategoryStore,
    identity::UserId,
    session::{DEFAULT_COOKIE_DURATION, Session, SessionState},
    settings::SettingsStore,
    transaction::TransactionStore,
};

/// The stores of one signed-in identity.
pub struct UserData {
    /// The identity's preferences.
    pub settings: SettingsStore,
    /// The identity's categories.
    pub categories: CategoryStore,
    /// The identity's transactions.
    pub transactions: TransactionStore,
}

impl UserData {
    /// Mount every store for the identity signed in to `session` and load its settings.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] if nobody is signed in, or the backend's error if a
    /// subscription could not be created.
    pub fn mount(
        documents: Arc<dyn DocumentBackend>,
        session: watch::Receiver<SessionState>,
    ) -> Result<Self, Error> {
        let settings = SettingsStore::new(documents.clone(), session.clone())?;
        settings.load();
        let categories = CategoryStore::mount(documents.clone(), session.clone())?;
        let transactions = TransactionStore::mount(documents, session)?;

        Ok(Self {
            settings,
            categories,
            transactions,
        })
    }

    /// The identity the stores were mounted for.
    pub fn owner(&self) -> UserId {
        self.transactions.owner()
    }

    /// Cancel the live subscriptions.
    pub fn unmount(&self) {
        self.categories.unmount();
        self.transactions.unmount();
    }
}

/// One client's session and the stores mounted for whoever it is signed in as.
pub struct SessionContext {
    session: Arc<Session>,
    documents: Arc<dyn DocumentBackend>,
    data: Mutex<Option<Arc<UserData>>>,
    expires_at: Mutex<OffsetDateTime>,
}

impl SessionContext {
    fn new(session: Arc<Session>, documents: Arc<dyn DocumentBackend>) -> Self {
        Self {
            session,
            documents,
            data: Mutex::new(None),
            expires_at: Mutex::new(OffsetDateTime::now_utc() + DEFAULT_COOKIE_DURATION),
        }
    }

    /// The client's session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// When the client's session cookie expires, as far as this process knows.
    pub fn expires_at(&self) -> OffsetDateTime {
        *self.expires_at.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that the client's cookie is valid until `expires_at`. An earlier expiry than the
    /// one already recorded is ignored.
    pub fn extend_until(&self, expires_at: OffsetDateTime) {
        let mut current = self.expires_at.lock().unwrap_or_else(PoisonError::into_inner);
        *current = (*current).max(expires_at);
    }

    /// The stores of the signed-in identity, mounting them on first use.
    ///
    /// Stores mounted for a previous identity are unmounted and replaced.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] if nobody is signed in, or the error from
    /// [UserData::mount].
    pub fn user_data(&self) -> Result<Arc<UserData>, Error> {
        let user_id = self.session.state().user_id().ok_or(Error::NotLoggedIn)?;
        let mut data = self.lock_data();

        if let Some(current) = data.as_ref() {
            if current.owner() == user_id {
                return Ok(current.clone());
            }

            tracing::debug!(
                "session {} switched from user {} to {user_id}",
                self.session.id(),
                current.owner()
            );
            current.unmount();
        }

        let mounted = Arc::new(UserData::mount(
            self.documents.clone(),
            self.session.subscribe(),
        )?);
        *data = Some(mounted.clone());

        Ok(mounted)
    }

    /// Unmount the stores, if any are mounted.
    pub fn unmount_user_data(&self) {
        if let Some(data) = self.lock_data().take() {
            data.unmount();
        }
    }

    /// Unmount the stores and stop listening for auth-state changes.
    pub fn teardown(&self) {
        self.unmount_user_data();
        self.session.teardown();
    }

    fn lock_data(&self) -> MutexGuard<'_, Option<Arc<UserData>>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The session contexts of every client this process knows about.
pub struct SessionRegistry {
    auth: Arc<dyn AuthBackend>,
    documents: Arc<dyn DocumentBackend>,
    contexts: Mutex<HashMap<ClientId, Arc<SessionContext>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(auth: Arc<dyn AuthBackend>, documents: Arc<dyn DocumentBackend>) -> Self {
        Self {
            auth,
            documents,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Create a signed-out context under a fresh session ID.
    pub fn create(&self) -> Arc<SessionContext> {
        let id = Uuid::new_v4();
        let context = Arc::new(SessionContext::new(
            Arc::new(Session::new(id, self.auth.clone())),
            self.documents.clone(),
        ));

        self.lock().insert(id, context.clone());
        tracing::debug!("created session {id}");

        context
    }

    /// The context of session `id`, if this process knows it.
    pub fn get(&self, id: ClientId) -> Option<Arc<SessionContext>> {
        self.lock().get(&id).cloned()
    }

    /// The context of session `id`, restoring it as `user_id` if this process does not know
    /// it, e.g. after a restart.
    ///
    /// A restored context starts out loading, see [Session::restore]. Must be called from
    /// within a tokio runtime.
    pub fn get_or_restore(&self, id: ClientId, user_id: UserId) -> Arc<SessionContext> {
        let mut contexts = self.lock();

        if let Some(context) = contexts.get(&id) {
            return context.clone();
        }

        tracing::debug!("restoring session {id} for user {user_id}");
        let context = Arc::new(SessionContext::new(
            Session::restore(id, self.auth.clone(), user_id),
            self.documents.clone(),
        ));
        contexts.insert(id, context.clone());

        context
    }

    /// Forget session `id` and tear its context down.
    pub fn remove(&self, id: ClientId) -> Option<Arc<SessionContext>> {
        let context = self.lock().remove(&id);

        if let Some(context) = &context {
            context.teardown();
            tracing::debug!("removed session {id}");
        }

        context
    }

    /// Sign session `id` out, then forget it and tear its context down.
    ///
    /// Used for sessions whose cookie has expired, so that neither the context nor the
    /// backend's record of the sign-in outlives the cookie.
    pub fn evict(&self, id: ClientId) -> Option<Arc<SessionContext>> {
        let context = self.get(id)?;

        if let Err(error) = context.session().sign_out() {
            tracing::error!("could not sign out expired session {id}: {error}");
        }

        self.remove(id)
    }

    /// Evict every session whose cookie expired at or before `now`, returns how many were
    /// evicted.
    pub fn evict_expired(&self, now: OffsetDateTime) -> usize {
        let expired: Vec<ClientId> = self
            .lock()
            .iter()
            .filter(|(_, context)| context.expires_at() <= now)
            .map(|(id, _)| *id)
            .collect();

        let evicted = expired
            .into_iter()
            .filter(|id| self.evict(*id).is_some())
            .count();

        if evicted > 0 {
            tracing::debug!("evicted {evicted} expired sessions");
        }

        evicted
    }

    /// The number of known sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no sessions are known.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClientId, Arc<SessionContext>>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Evict expired sessions from `registry` every `period`, forever.
///
/// Clients that stop sending requests never present their expired cookie, so their sessions
/// are only cleaned up by this sweep.
pub async fn sweep_expired_sessions(
    registry: Arc<SessionRegistry>,
    period: std::time::Duration,
) {
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;
        registry.evict_expired(OffsetDateTime::now_utc());
    }
}


#[cfg(test)]
mod session_registry_tests {
    use std::time::Duration;

    use time::{OffsetDateTime, macros::date};
    use uuid::Uuid;

    use crate::{
        Error,
        identity::UserId,
        session::SessionState,
        transaction::{NewTransaction, TransactionKind},
    };

    use super::test_utils::get_test_registry;

    const PASSWORD: &str = "Xq7#pL9vR2mZ!wT4";

    fn new_transaction() -> NewTransaction {
        NewTransaction {
            category: "Food".to_owned(),
            description: "Lunch".to_owned(),
            amount: 12.0,
            kind: TransactionKind::Expense,
            date: date!(2025 - 10 - 01),
        }
    }

    #[test]
    fn create_registers_context() {
        let registry = get_test_registry();

        let context = registry.create();

        assert_eq!(registry.len(), 1);
        assert!(registry.get(context.session().id()).is_some());
        assert_eq!(context.session().state(), SessionState::signed_out());
    }

    #[test]
    fn user_data_requires_identity() {
        let registry = get_test_registry();
        let context = registry.create();

        assert!(matches!(context.user_data(), Err(Error::NotLoggedIn)));
    }

    #[test]
    fn user_data_is_mounted_once_per_identity() {
        let registry = get_test_registry();
        let context = registry.create();
        context.session().register("foo@bar.baz", PASSWORD).unwrap();

        let first = context.user_data().unwrap();
        let second = context.user_data().unwrap();

        assert!(std::sync::Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn user_data_is_remounted_for_new_identity() {
        let registry = get_test_registry();
        let context = registry.create();
        let first_identity = context.session().register("foo@bar.baz", PASSWORD).unwrap();
        let first = context.user_data().unwrap();
        first.transactions.add(&new_transaction()).unwrap();

        context.session().sign_out().unwrap();
        let second_identity = context
            .session()
            .register("qux@bar.baz", PASSWORD)
            .unwrap();
        let second = context.user_data().unwrap();

        assert_eq!(first.owner(), first_identity.id);
        assert_eq!(second.owner(), second_identity.id);
        assert!(second.transactions.transactions().is_empty());
    }

    #[test]
    fn remove_tears_down_context() {
        let registry = get_test_registry();
        let context = registry.create();
        let id = context.session().id();
        context.session().register("foo@bar.baz", PASSWORD).unwrap();
        let data = context.user_data().unwrap();

        let removed = registry.remove(id);

        assert!(removed.is_some());
        assert!(registry.is_empty());
        data.transactions.add(&new_transaction()).unwrap();
        assert!(data.transactions.transactions().is_empty());
    }

    #[test]
    fn remove_unknown_session_is_none() {
        let registry = get_test_registry();

        assert!(registry.remove(Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn evict_expired_tears_down_and_signs_out_expired_sessions() {
        let registry = get_test_registry();
        let expired = registry.create();
        let expired_id = expired.session().id();
        let identity = expired.session().register("foo@bar.baz", PASSWORD).unwrap();
        let data = expired.user_data().unwrap();
        let fresh = registry.create();
        fresh.extend_until(OffsetDateTime::now_utc() + Duration::from_secs(7200));

        let in_an_hour = OffsetDateTime::now_utc() + Duration::from_secs(3600);
        let evicted = registry.evict_expired(in_an_hour);

        assert_eq!(evicted, 1);
        assert!(registry.get(expired_id).is_none());
        assert!(registry.get(fresh.session().id()).is_some());
        assert_eq!(
            data.transactions.add(&new_transaction()),
            Err(Error::NotLoggedIn)
        );

        // The backend no longer remembers the sign-in, so the cookie cannot revive it.
        let restored = registry.get_or_restore(expired_id, identity.id);
        let state = tokio::time::timeout(Duration::from_secs(5), restored.session().settled())
            .await
            .expect("session did not settle");
        assert_eq!(state, SessionState::signed_out());
    }

    #[test]
    fn extend_until_never_shortens_expiry() {
        let registry = get_test_registry();
        let context = registry.create();
        let later = OffsetDateTime::now_utc() + Duration::from_secs(7200);

        context.extend_until(later);
        context.extend_until(OffsetDateTime::now_utc());

        assert_eq!(context.expires_at(), later);
    }

    #[tokio::test]
    async fn get_or_restore_restores_unknown_session() {
        let registry = get_test_registry();
        let created = registry.create();
        let id = created.session().id();
        let identity = created.session().register("foo@bar.baz", PASSWORD).unwrap();
        registry.remove(id);
        assert!(registry.get(id).is_none());

        let context = registry.get_or_restore(id, identity.id);
        let state = tokio::time::timeout(Duration::from_secs(5), context.session().settled())
            .await
            .expect("session did not settle");

        assert_eq!(state, SessionState::signed_in(identity));
        assert!(registry.get(id).is_some());
    }

    #[tokio::test]
    async fn get_or_restore_returns_known_session() {
        let registry = get_test_registry();
        let context = registry.create();
        let id = context.session().id();

        let found = registry.get_or_restore(id, UserId::new(99));

        assert!(std::sync::Arc::ptr_eq(&context, &found));
        assert_eq!(registry.len(), 1);
    }
}
