//! Gates every request on the client's session: who may see which route, and where everyone
//! else is sent instead.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{StatusCode, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;

use crate::{
    AppState, Error, endpoints,
    session::{
        SessionContext, SessionState, extend_session_cookie_if_needed, get_token_from_cookies,
        invalidate_session_cookie, read_token,
    },
};

/// What to do with a navigation to some path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// The session is still loading, decide again once it settles.
    Defer,
    /// Let the navigation through.
    Allow,
    /// Send the client to another path instead.
    Redirect(&'static str),
}

/// Decide whether a client in `state` may navigate to `path`.
pub fn guard_navigation(path: &str, state: &SessionState) -> GuardDecision {
    if state.loading {
        return GuardDecision::Defer;
    }

    let is_one_of = |routes: &[&str]| routes.iter().any(|route| *route == path);

    match state.identity {
        Some(_) if is_one_of(endpoints::SIGNED_OUT_ROUTES) => {
            GuardDecision::Redirect(endpoints::ROOT)
        }
        Some(_) => GuardDecision::Allow,
        None if is_one_of(endpoints::PUBLIC_ROUTES) => GuardDecision::Allow,
        None => GuardDecision::Redirect(endpoints::LOG_IN),
    }
}

/// Middleware that resolves the client's session from its cookie, waits for the session to
/// settle and then applies [guard_navigation].
///
/// Allowed requests carry the client's `Extension<Arc<SessionContext>>` if it has one, and
/// signed-in clients get their cookie extended. A cookie whose session is no longer signed in
/// is removed along with its context, and an expired cookie evicts its session.
pub async fn route_guard(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();

    let (context, mut jar) = match get_token_from_cookies(&jar) {
        Ok(token) => (
            Some(
                state
                    .registry
                    .get_or_restore(token.session_id, token.user_id),
            ),
            jar,
        ),
        Err(Error::CookieMissing) => (None, jar),
        Err(Error::CookieExpired) => {
            if let Ok(token) = read_token(&jar) {
                state.registry.evict(token.session_id);
            }
            (None, invalidate_session_cookie(jar))
        }
        Err(error) => {
            tracing::debug!("discarding session cookie: {error}");
            (None, invalidate_session_cookie(jar))
        }
    };

    let session_state = match &context {
        Some(context) => context.session().settled().await,
        None => SessionState::signed_out(),
    };

    let context = match context {
        Some(context) if session_state.identity.is_none() => {
            state.registry.remove(context.session().id());
            jar = invalidate_session_cookie(jar);
            None
        }
        context => context,
    };

    match guard_navigation(&path, &session_state) {
        GuardDecision::Defer => {
            tracing::warn!("session was still loading after it settled");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
        GuardDecision::Redirect(to) => (jar, Redirect::to(to)).into_response(),
        GuardDecision::Allow => {
            if let Some(context) = &context {
                request.extensions_mut().insert::<Arc<SessionContext>>(context.clone());
            }

            let response = next.run(request).await;

            let jar = if let Some(context) = context {
                match extend_session_cookie_if_needed(jar.clone(), state.cookie_duration) {
                    Ok(updated_jar) => {
                        if let Ok(token) = get_token_from_cookies(&updated_jar) {
                            context.extend_until(token.expires_at);
                        }
                        updated_jar
                    }
                    Err(error) => {
                        tracing::error!(
                            "Error extending cookie duration: {error:?}. Rolling back cookie jar."
                        );
                        jar
                    }
                }
            } else {
                jar
            };

            append_cookies(response, jar)
        }
    }
}

/// Add the `Set-Cookie` headers of `jar` to `response`, unless the handler already set its
/// own cookies.
fn append_cookies(response: Response, jar: PrivateCookieJar) -> Response {
    let (mut parts, body) = response.into_parts();

    if parts.headers.contains_key(SET_COOKIE) {
        return Response::from_parts(parts, body);
    }

    for (key, val) in jar.into_response().headers().iter() {
        if key != SET_COOKIE {
            continue;
        }

        parts.headers.append(key, val.to_owned());
    }

    Response::from_parts(parts, body)
}
