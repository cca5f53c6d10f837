//! The session token carried in the private cookie and the functions that manage the cookie.

use std::cmp::max;

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{Error, backend::ClientId, identity::UserId};

/// The name of the cookie holding the [SessionToken].
pub const COOKIE_TOKEN: &str = "token";
/// How long a session cookie stays valid without activity.
pub const DEFAULT_COOKIE_DURATION: Duration = Duration::minutes(30);

mod datetime_format {
    //! Serializes an [OffsetDateTime] with two-digit hours.
    //!
    //! The default serializer writes "00:00:00.000000" as "0:00:00.0", which the
    //! deserializer then rejects.
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{
        OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description,
    };

    /// e.g. "2021-01-01 00:00:00.000000 +00:00:00".
    const DATE_TIME_FORMAT: &[BorrowedFormatItem] = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond] [offset_hour \
             sign:mandatory]:[offset_minute]:[offset_second]"
    );

    pub fn serialize<S>(dt: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = dt
            .format(DATE_TIME_FORMAT)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&s, DATE_TIME_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Identifies a client's session and the identity it was signed in as.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionToken {
    /// The session's client ID.
    pub session_id: ClientId,
    /// The identity the session was signed in as when the cookie was set.
    pub user_id: UserId,
    /// When the cookie expires.
    #[serde(
        serialize_with = "datetime_format::serialize",
        deserialize_with = "datetime_format::deserialize"
    )]
    pub expires_at: OffsetDateTime,
}

/// Add a session cookie for `session_id` and `user_id` that expires `duration` from now.
///
/// # Errors
/// Returns [Error::JSONSerializationError] if the token could not be serialized.
pub fn set_session_cookie(
    jar: PrivateCookieJar,
    session_id: ClientId,
    user_id: UserId,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let token = SessionToken {
        session_id,
        user_id,
        expires_at: OffsetDateTime::now_utc() + duration,
    };

    set_token_cookie(jar, &token)
}

fn set_token_cookie(
    jar: PrivateCookieJar,
    token: &SessionToken,
) -> Result<PrivateCookieJar, Error> {
    let token_string = serde_json::to_string(token)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

    Ok(jar.add(
        Cookie::build((COOKIE_TOKEN, token_string))
            .expires(token.expires_at)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    ))
}

/// Replace the session cookie with an expired one so the client deletes it.
pub fn invalidate_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_TOKEN, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Read the session token from `jar` without checking whether it has expired.
///
/// # Errors
/// Returns [Error::CookieMissing] if there is no session cookie and [Error::InvalidCookie] if
/// it cannot be parsed.
pub fn read_token(jar: &PrivateCookieJar) -> Result<SessionToken, Error> {
    let cookie = jar.get(COOKIE_TOKEN).ok_or(Error::CookieMissing)?;

    serde_json::from_str(cookie.value_trimmed())
        .map_err(|error| Error::InvalidCookie(error.to_string()))
}

/// Read the session token from `jar`.
///
/// # Errors
/// Returns [Error::CookieMissing] if there is no session cookie, [Error::InvalidCookie] if
/// it cannot be parsed, and [Error::CookieExpired] if it has expired.
pub fn get_token_from_cookies(jar: &PrivateCookieJar) -> Result<SessionToken, Error> {
    let token = read_token(jar)?;

    if token.expires_at <= OffsetDateTime::now_utc() {
        return Err(Error::CookieExpired);
    }

    Ok(token)
}

/// Push the session cookie's expiry out to `duration` from now, unless it already expires
/// later.
///
/// # Errors
/// The jar is returned unchanged only on success. Returns the errors of
/// [get_token_from_cookies], or [Error::InvalidCookie] if the new expiry overflows.
pub fn extend_session_cookie_if_needed(
    jar: PrivateCookieJar,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let token = get_token_from_cookies(&jar)?;

    let new_expiry = OffsetDateTime::now_utc()
        .checked_add(duration)
        .ok_or_else(|| Error::InvalidCookie("expiry overflowed".to_owned()))?;

    set_token_cookie(
        jar,
        &SessionToken {
            expires_at: max(token.expires_at, new_expiry),
            ..token
        },
    )
}

#[cfg(test)]
mod token_tests {
    use time::{UtcOffset, macros::datetime};
    use uuid::Uuid;

    use crate::{identity::UserId, session::SessionToken};

    #[test]
    fn serialise_token() {
        let session_id = Uuid::nil();
        let token = SessionToken {
            session_id,
            user_id: UserId::new(1),
            expires_at: datetime!(2025-12-21 03:54:00).assume_offset(UtcOffset::UTC),
        };
        let expected = r#"{"session_id":"00000000-0000-0000-0000-000000000000","user_id":1,"expires_at":"2025-12-21 03:54:00.0 +00:00:00"}"#;

        let actual = serde_json::to_string(&token).unwrap();

        assert_eq!(expected, actual);
    }

    #[test]
    fn deserialise_token_at_midnight() {
        let json = r#"{"session_id":"00000000-0000-0000-0000-000000000000","user_id":7,"expires_at":"2021-01-01 00:00:00.0 +00:00:00"}"#;

        let token: SessionToken = serde_json::from_str(json).unwrap();

        assert_eq!(token.user_id, UserId::new(7));
        assert_eq!(
            token.expires_at,
            datetime!(2021-01-01 00:00:00).assume_offset(UtcOffset::UTC)
        );
    }
}
