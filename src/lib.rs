//! Money Tracker is a web service for recording income and expenses, sorting them into
//! categories and keeping an eye on a monthly budget.
//!
//! This library provides a JSON API over per-user stores that mirror a backend through live
//! subscriptions. The backend is reached through the [backend::AuthBackend] and
//! [backend::DocumentBackend] traits, and [backend::SqliteBackend] implements both.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
mod auth_endpoints;
pub mod backend;
pub mod category;
mod dashboard;
pub mod database_id;
pub mod endpoints;
pub mod format;
pub mod identity;
mod live_query;
mod logging;
mod password;
pub mod route_guard;
mod routing;
pub mod session;
pub mod settings;
pub mod statistics;
mod timezone;
pub mod transaction;

pub use app_state::{AppState, create_cookie_key};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;
pub use timezone::{get_local_offset, local_today};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The operation needs a signed-in identity, or the identity a store was mounted for has
    /// since signed out.
    #[error("you must be logged in to do that")]
    NotLoggedIn,

    /// A required field was blank or missing.
    #[error("please fill in all required fields")]
    MissingFields,

    /// A transaction amount was zero or negative.
    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    /// A category of the same kind already has this name, ignoring case.
    #[error("a category named \"{0}\" already exists")]
    DuplicateCategoryName(String),

    /// The user provided an invalid combination of email and password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// An account with the email already exists.
    #[error("an account with this email already exists")]
    DuplicateEmail,

    /// The email is not of the form "local@domain".
    #[error("invalid email address")]
    InvalidEmail,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The session cookie is missing from the cookie jar in the request.
    #[error("no cookies in the cookie jar :(")]
    CookieMissing,

    /// The session cookie could not be parsed or its expiry could not be computed.
    #[error("invalid session cookie: {0}")]
    InvalidCookie(String),

    /// The session cookie has expired.
    #[error("the session cookie has expired")]
    CookieExpired,

    /// Federated sign-in was attempted without the configured secret, or none is configured.
    #[error("federated sign-in is not available")]
    FederatedSignInDisabled,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while serializing or deserializing JSON.
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// Tried to update a transaction that does not exist
    #[error("tried to update a transaction that is not in the database")]
    UpdateMissingTransaction,

    /// Tried to delete a transaction that does not exist
    #[error("tried to delete a transaction that is not in the database")]
    DeleteMissingTransaction,

    /// Tried to update a category that does not exist
    #[error("tried to update a category that is not in the database")]
    UpdateMissingCategory,

    /// Tried to delete a category that does not exist
    #[error("tried to delete a category that is not in the database")]
    DeleteMissingCategory,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingFields
            | Error::NonPositiveAmount
            | Error::DuplicateCategoryName(_)
            | Error::InvalidEmail
            | Error::TooWeak(_) => StatusCode::BAD_REQUEST,
            Error::NotLoggedIn
            | Error::InvalidCredentials
            | Error::CookieMissing
            | Error::InvalidCookie(_)
            | Error::CookieExpired => StatusCode::UNAUTHORIZED,
            Error::FederatedSignInDisabled => StatusCode::FORBIDDEN,
            Error::DuplicateEmail => StatusCode::CONFLICT,
            Error::NotFound
            | Error::UpdateMissingTransaction
            | Error::DeleteMissingTransaction
            | Error::UpdateMissingCategory
            | Error::DeleteMissingCategory => StatusCode::NOT_FOUND,
            Error::HashingError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::JSONSerializationError(_)
            | Error::InvalidTimezoneError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status.is_server_error() {
            // Any errors that are not handled above are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
