//! Implements a struct that holds the state of the REST server.

use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use time::Duration;

use crate::{
    backend::{AuthBackend, DocumentBackend},
    session::{DEFAULT_COOKIE_DURATION, SessionRegistry},
};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The duration for which session cookies are valid without activity.
    pub cookie_duration: Duration,

    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,

    /// The shared secret federated sign-in requests must present, federated sign-in is
    /// disabled if `None`.
    pub federation_secret: Option<String>,

    /// The session context of every known client.
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    /// Create a new [AppState] over `auth` and `documents`.
    ///
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Pacific/Auckland".
    pub fn new(
        cookie_secret: &str,
        local_timezone: &str,
        federation_secret: Option<String>,
        auth: Arc<dyn AuthBackend>,
        documents: Arc<dyn DocumentBackend>,
    ) -> Self {
        Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            local_timezone: local_timezone.to_owned(),
            federation_secret,
            registry: Arc::new(SessionRegistry::new(auth, documents)),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
