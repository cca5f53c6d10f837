//! Session state: who is signed in on one client, and whether that is known yet.

mod registry;
mod token;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

pub use registry::{SessionContext, SessionRegistry, UserData, sweep_expired_sessions};
#[cfg(test)]
pub(crate) use registry::test_utils::get_test_registry;
pub use token::{
    COOKIE_TOKEN, DEFAULT_COOKIE_DURATION, SessionToken, extend_session_cookie_if_needed,
    get_token_from_cookies, invalidate_session_cookie, read_token, set_session_cookie,
};

use crate::{
    Error,
    backend::{AuthBackend, ClientId, Listener, Subscription},
    identity::{FederatedCredential, Identity, UserId},
};

/// A snapshot of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// The signed-in identity, if any.
    pub identity: Option<Identity>,
    /// Whether the identity is still being resolved.
    pub loading: bool,
}

impl SessionState {
    /// A settled state with nobody signed in.
    pub fn signed_out() -> Self {
        Self {
            identity: None,
            loading: false,
        }
    }

    /// A settled state with `identity` signed in.
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            loading: false,
        }
    }

    /// The ID of the signed-in identity.
    pub fn user_id(&self) -> Option<UserId> {
        self.identity.as_ref().map(|identity| identity.id)
    }
}

/// Check that `session` is signed in as `owner`.
///
/// Stores mounted for one identity use this before every write, so a store never writes on
/// behalf of an identity that has since signed out.
///
/// # Errors
/// Returns [Error::NotLoggedIn] if nobody, or somebody else, is signed in.
pub fn require_owner(
    session: &watch::Receiver<SessionState>,
    owner: UserId,
) -> Result<UserId, Error> {
    match session.borrow().user_id() {
        Some(user_id) if user_id == owner => Ok(owner),
        _ => Err(Error::NotLoggedIn),
    }
}

/// The auth state of one client.
///
/// The state lives in a [watch] channel. Operations update it with their result, and the
/// auth-state listener registered with the backend updates it on every change the backend
/// reports, so callers should treat the identity as eventually consistent.
pub struct Session {
    id: ClientId,
    backend: Arc<dyn AuthBackend>,
    state: Arc<watch::Sender<SessionState>>,
    auth_listener: Mutex<Option<Subscription>>,
}

impl Session {
    /// Create a settled session with nobody signed in.
    pub fn new(id: ClientId, backend: Arc<dyn AuthBackend>) -> Self {
        Self::with_state(id, backend, SessionState::signed_out())
    }

    /// Create a loading session and resolve `user_id` on a blocking task.
    ///
    /// Used when a client presents a valid token for a session this process does not know.
    /// The session settles once the backend answers, signed out if the identity is gone or
    /// the lookup fails.
    ///
    /// Must be called from within a tokio runtime.
    pub fn restore(id: ClientId, backend: Arc<dyn AuthBackend>, user_id: UserId) -> Arc<Self> {
        let session = Arc::new(Self::with_state(
            id,
            backend,
            SessionState {
                identity: None,
                loading: true,
            },
        ));

        let task_session = session.clone();
        tokio::task::spawn_blocking(move || {
            match task_session.backend.restore(task_session.id, user_id) {
                Ok(identity) => {
                    tracing::debug!("restored session {} for user {user_id}", task_session.id);
                    task_session.set_identity(identity);
                }
                Err(error) => {
                    tracing::error!("could not restore session {}: {error}", task_session.id);
                    task_session.set_identity(None);
                }
            }
        });

        session
    }

    fn with_state(id: ClientId, backend: Arc<dyn AuthBackend>, initial: SessionState) -> Self {
        let (sender, _) = watch::channel(initial);
        let state = Arc::new(sender);

        let sink = state.clone();
        let listener: Listener<Option<Identity>> = Arc::new(move |identity| {
            sink.send_modify(|state| {
                state.identity = identity;
                state.loading = false;
            });
        });
        let auth_listener = backend.on_auth_state_changed(id, listener);

        Self {
            id,
            backend,
            state,
            auth_listener: Mutex::new(Some(auth_listener)),
        }
    }

    /// The client ID of this session.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// The current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// The signed-in identity, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    /// A receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Wait until the session is no longer loading and return the settled state.
    pub async fn settled(&self) -> SessionState {
        let mut receiver = self.state.subscribe();

        match receiver.wait_for(|state| !state.loading).await {
            Ok(state) => (*state).clone(),
            // The sender lives as long as `self`, so this only happens during shutdown.
            Err(_) => self.state(),
        }
    }

    /// Create an account and sign in as it.
    ///
    /// # Errors
    /// Returns the backend's error unchanged, e.g. [Error::DuplicateEmail].
    pub fn register(&self, email: &str, password: &str) -> Result<Identity, Error> {
        let identity = self.backend.sign_up(self.id, email, password)?;
        tracing::info!("session {} registered user {}", self.id, identity.id);
        self.set_identity(Some(identity.clone()));

        Ok(identity)
    }

    /// Sign in with an email and password.
    ///
    /// # Errors
    /// Returns the backend's error unchanged, e.g. [Error::InvalidCredentials].
    pub fn sign_in(&self, email: &str, password: &str) -> Result<Identity, Error> {
        let identity = self.backend.sign_in(self.id, email, password)?;
        tracing::info!("session {} signed in as user {}", self.id, identity.id);
        self.set_identity(Some(identity.clone()));

        Ok(identity)
    }

    /// Sign in with an assertion from a federated provider.
    ///
    /// # Errors
    /// Returns the backend's error unchanged.
    pub fn sign_in_federated(&self, credential: &FederatedCredential) -> Result<Identity, Error> {
        let identity = self.backend.sign_in_federated(self.id, credential)?;
        tracing::info!(
            "session {} signed in as user {} via {}",
            self.id,
            identity.id,
            credential.provider
        );
        self.set_identity(Some(identity.clone()));

        Ok(identity)
    }

    /// Sign out.
    ///
    /// # Errors
    /// Returns the backend's error unchanged, the local identity is left as it was.
    pub fn sign_out(&self) -> Result<(), Error> {
        self.backend.sign_out(self.id)?;
        tracing::info!("session {} signed out", self.id);
        self.set_identity(None);

        Ok(())
    }

    /// Stop listening for auth-state changes.
    pub fn teardown(&self) {
        let auth_listener = self
            .auth_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(auth_listener) = auth_listener {
            auth_listener.cancel();
        }
    }

    fn set_identity(&self, identity: Option<Identity>) {
        self.state.send_modify(|state| {
            state.identity = identity;
            state.loading = false;
        });
    }
}
