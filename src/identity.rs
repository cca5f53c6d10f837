//! The authenticated identity as issued by the auth backend.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(i64);

impl UserId {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The signed-in user as seen by this application.
///
/// Identities are owned by the auth backend, the rest of the application only observes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// The ID that owns transactions, categories and settings.
    pub id: UserId,
    /// The email the user signed up or signed in with.
    pub email: String,
    /// An optional display name, usually supplied by a federated provider.
    pub display_name: Option<String>,
    /// The federated provider used to sign in, `None` for email and password.
    pub provider: Option<FederatedProvider>,
}

/// The third-party identity providers that can be used to sign in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FederatedProvider {
    /// Sign in with Google.
    Google,
}

impl FederatedProvider {
    /// The name used to store the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            FederatedProvider::Google => "google",
        }
    }

    /// Parse a stored provider name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "google" => Some(FederatedProvider::Google),
            _ => None,
        }
    }
}

impl Display for FederatedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verified assertion from a federated provider.
///
/// The provider (or the proxy that talks to it) is responsible for verifying the user, the
/// auth backend only maps the provider's subject onto an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederatedCredential {
    /// Which provider issued the assertion.
    pub provider: FederatedProvider,
    /// The provider's stable ID for the user.
    pub subject: String,
    /// The email address the provider verified.
    pub email: String,
    /// The user's name according to the provider.
    pub display_name: Option<String>,
}

#[cfg(test)]
mod identity_tests {
    use crate::identity::{FederatedProvider, UserId};

    #[test]
    fn provider_names_round_trip() {
        let provider = FederatedProvider::Google;

        assert_eq!(
            FederatedProvider::from_name(provider.as_str()),
            Some(provider)
        );
        assert_eq!(FederatedProvider::from_name("myspace"), None);
    }

    #[test]
    fn provider_serializes_lowercase() {
        let json = serde_json::to_string(&FederatedProvider::Google).unwrap();

        assert_eq!(json, "\"google\"");
    }

    #[test]
    fn user_id_displays_inner_value() {
        assert_eq!(UserId::new(42).to_string(), "42");
    }
}
