//! Route handlers for the home route and for registering, logging in and logging out.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::{
    AppState, Error, endpoints,
    identity::{FederatedCredential, Identity},
    session::{
        Session, SessionContext, get_token_from_cookies, invalidate_session_cookie,
        set_session_cookie,
    },
};

/// The header federated sign-in requests carry the shared secret in.
pub const FEDERATION_SECRET_HEADER: &str = "x-federation-secret";

/// The email and password a user registers or logs in with.
#[derive(Clone, Deserialize)]
pub struct CredentialsForm {
    /// Email entered during log-in or registration.
    pub email: String,
    /// Password entered during log-in or registration.
    pub password: String,
}

/// What the home route reports about the client.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HomeResponse {
    /// Whether the client is signed in.
    pub authenticated: bool,
    /// Who the client is signed in as.
    pub identity: Option<Identity>,
}

/// A route handler reporting whether the client is signed in and as whom.
pub async fn get_home(context: Option<Extension<Arc<SessionContext>>>) -> Json<HomeResponse> {
    let identity = context.and_then(|Extension(context)| context.session().identity());

    Json(HomeResponse {
        authenticated: identity.is_some(),
        identity,
    })
}

/// A route handler for creating an account, signs the client in as the new identity.
pub async fn register(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(form): Json<CredentialsForm>,
) -> Result<Response, Error> {
    let (jar, identity) = start_session(&state, jar, |session| {
        session.register(&form.email, &form.password)
    })?;

    Ok((StatusCode::CREATED, jar, Json(identity)).into_response())
}

/// A route handler for logging in with an email and password.
pub async fn log_in(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(form): Json<CredentialsForm>,
) -> Result<Response, Error> {
    let (jar, identity) = start_session(&state, jar, |session| {
        session.sign_in(&form.email, &form.password)
    })?;

    Ok((jar, Json(identity)).into_response())
}

/// A route handler for logging in with an assertion from a federated provider.
///
/// The assertion must have been verified by a trusted proxy, which proves itself with the
/// configured federation secret in the [FEDERATION_SECRET_HEADER] header.
pub async fn log_in_federated(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: PrivateCookieJar,
    Json(credential): Json<FederatedCredential>,
) -> Result<Response, Error> {
    let presented = headers
        .get(FEDERATION_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    match (&state.federation_secret, presented) {
        (Some(secret), Some(presented)) if secrets_match(secret, presented) => {}
        (None, _) => return Err(Error::FederatedSignInDisabled),
        _ => {
            tracing::warn!("rejected federated sign-in without a valid secret");
            return Err(Error::FederatedSignInDisabled);
        }
    }

    let (jar, identity) = start_session(&state, jar, |session| {
        session.sign_in_federated(&credential)
    })?;

    Ok((jar, Json(identity)).into_response())
}

/// A route handler that signs the client out, forgets its session and redirects to the log-in
/// route.
pub async fn log_out(
    State(state): State<AppState>,
    Extension(context): Extension<Arc<SessionContext>>,
    jar: PrivateCookieJar,
) -> Result<Response, Error> {
    context.session().sign_out()?;
    state.registry.remove(context.session().id());

    let jar = invalidate_session_cookie(jar);

    Ok((jar, Redirect::to(endpoints::LOG_IN)).into_response())
}

/// Compare two secrets in time that does not depend on where they differ.
fn secrets_match(expected: &str, presented: &str) -> bool {
    let expected = Sha512::digest(expected);
    let presented = Sha512::digest(presented);

    expected
        .iter()
        .zip(presented.iter())
        .fold(0u8, |difference, (a, b)| difference | (a ^ b))
        == 0
}

/// Run `sign_in` on a fresh session and set the session cookie if it succeeds.
///
/// The session is forgotten again if signing in fails.
fn start_session(
    state: &AppState,
    jar: PrivateCookieJar,
    sign_in: impl FnOnce(&Session) -> Result<Identity, Error>,
) -> Result<(PrivateCookieJar, Identity), Error> {
    let context = state.registry.create();
    let session_id = context.session().id();

    let result = sign_in(context.session()).and_then(|identity| {
        let jar = set_session_cookie(jar, session_id, identity.id, state.cookie_duration)?;
        context.extend_until(get_token_from_cookies(&jar)?.expires_at);
        Ok((jar, identity))
    });

    if result.is_err() {
        state.registry.remove(session_id);
    }

    result
}
