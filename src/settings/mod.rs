//! Per-identity preferences stored as a single settings document.

mod endpoints;

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::watch;

pub use endpoints::{get_settings, get_settings_options, reset_settings, update_settings};

use crate::{
    Error,
    backend::DocumentBackend,
    identity::UserId,
    session::{SessionState, require_owner},
    transaction::TransactionKind,
};

/// A currency the amounts can be displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Currency {
    /// The ISO 4217 code, e.g. "USD".
    pub code: &'static str,
    /// The symbol placed before amounts.
    pub symbol: &'static str,
    /// The English name.
    pub name: &'static str,
    /// How many digits to show after the decimal point.
    pub decimals: u8,
}

/// The currencies users can choose from.
pub const CURRENCIES: &[Currency] = &[
    Currency {
        code: "MMK",
        symbol: "Ks",
        name: "Myanmar Kyat",
        decimals: 0,
    },
    Currency {
        code: "USD",
        symbol: "$",
        name: "US Dollar",
        decimals: 2,
    },
    Currency {
        code: "EUR",
        symbol: "€",
        name: "Euro",
        decimals: 2,
    },
    Currency {
        code: "GBP",
        symbol: "£",
        name: "British Pound",
        decimals: 2,
    },
    Currency {
        code: "JPY",
        symbol: "¥",
        name: "Japanese Yen",
        decimals: 0,
    },
    Currency {
        code: "INR",
        symbol: "₹",
        name: "Indian Rupee",
        decimals: 2,
    },
    Currency {
        code: "CNY",
        symbol: "¥",
        name: "Chinese Yuan",
        decimals: 2,
    },
    Currency {
        code: "AUD",
        symbol: "A$",
        name: "Australian Dollar",
        decimals: 2,
    },
    Currency {
        code: "CAD",
        symbol: "C$",
        name: "Canadian Dollar",
        decimals: 2,
    },
];

/// Find a currency by its code.
pub fn find_currency(code: &str) -> Option<&'static Currency> {
    CURRENCIES.iter().find(|currency| currency.code == code)
}

/// A selectable value with a human readable label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SettingOption {
    /// The stored value.
    pub value: &'static str,
    /// What the user sees.
    pub label: &'static str,
}

/// The supported date formats.
pub const DATE_FORMATS: &[SettingOption] = &[
    SettingOption {
        value: "MM/DD/YYYY",
        label: "MM/DD/YYYY (12/31/2024)",
    },
    SettingOption {
        value: "DD/MM/YYYY",
        label: "DD/MM/YYYY (31/12/2024)",
    },
    SettingOption {
        value: "YYYY-MM-DD",
        label: "YYYY-MM-DD (2024-12-31)",
    },
];

/// The supported color themes.
pub const THEMES: &[SettingOption] = &[
    SettingOption {
        value: "light",
        label: "Light",
    },
    SettingOption {
        value: "dark",
        label: "Dark",
    },
    SettingOption {
        value: "auto",
        label: "Auto (System)",
    },
];

/// A user's preferences.
///
/// Keys missing from a stored document take their default value and unknown keys are
/// ignored, so a document written by an older version always loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// The currency code used to display amounts.
    pub currency: String,
    /// One of the [DATE_FORMATS] values.
    pub date_format: String,
    /// One of the [THEMES] values.
    pub theme: String,
    /// Whether to show notifications.
    pub notifications: bool,
    /// Whether to back up data automatically.
    pub auto_backup: bool,
    /// The kind preselected for new transactions.
    #[serde(rename = "defaultTransactionType")]
    pub default_transaction_kind: TransactionKind,
    /// The spending limit per calendar month, zero for none.
    pub monthly_budget: f64,
    /// The spending limit per week, zero for none.
    pub weekly_budget: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            currency: "USD".to_owned(),
            date_format: "MM/DD/YYYY".to_owned(),
            theme: "light".to_owned(),
            notifications: true,
            auto_backup: true,
            default_transaction_kind: TransactionKind::Expense,
            monthly_budget: 0.0,
            weekly_budget: 0.0,
        }
    }
}

/// The settings of one identity, cached in memory.
pub struct SettingsStore {
    owner: UserId,
    documents: Arc<dyn DocumentBackend>,
    session: watch::Receiver<SessionState>,
    settings: RwLock<Settings>,
}

impl SettingsStore {
    /// Create a store for the identity currently signed in to `session`, holding the defaults
    /// until [SettingsStore::load] is called.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] if nobody is signed in.
    pub fn new(
        documents: Arc<dyn DocumentBackend>,
        session: watch::Receiver<SessionState>,
    ) -> Result<Self, Error> {
        let owner = session.borrow().user_id().ok_or(Error::NotLoggedIn)?;

        Ok(Self {
            owner,
            documents,
            session,
            settings: RwLock::new(Settings::default()),
        })
    }

    /// The identity the settings belong to.
    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// The cached settings.
    pub fn get(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Read the stored document and merge it over the defaults.
    ///
    /// Errors are logged and leave the cached settings as they were.
    pub fn load(&self) {
        match self.read_document() {
            Ok(settings) => self.set_local(settings),
            Err(error) => {
                tracing::error!("could not load settings for user {}: {error}", self.owner)
            }
        }
    }

    fn read_document(&self) -> Result<Settings, Error> {
        match self.documents.get_settings(self.owner)? {
            Some(document) => serde_json::from_value(document)
                .map_err(|error| Error::JSONSerializationError(error.to_string())),
            None => Ok(Settings::default()),
        }
    }

    /// Write `settings` with a last-modified stamp, then cache them.
    ///
    /// Values are stored as given, e.g. a negative budget is accepted.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] if the owner is no longer signed in, or the backend's
    /// error if the write failed.
    pub fn save(&self, settings: &Settings) -> Result<(), Error> {
        let owner = require_owner(&self.session, self.owner)?;

        let mut document = serde_json::to_value(settings)
            .map_err(|error| Error::JSONSerializationError(error.to_string()))?;
        let updated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|error| Error::JSONSerializationError(error.to_string()))?;
        if let Some(fields) = document.as_object_mut() {
            fields.insert("updatedAt".to_owned(), updated_at.into());
        }

        self.documents.set_settings(owner, &document)?;
        self.set_local(settings.clone());

        Ok(())
    }

    /// Store and cache the default settings.
    ///
    /// # Errors
    /// Returns the same errors as [SettingsStore::save].
    pub fn reset(&self) -> Result<Settings, Error> {
        let defaults = Settings::default();
        self.save(&defaults)?;

        Ok(defaults)
    }

    fn set_local(&self, settings: Settings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }
}

#[cfg(test)]
mod settings_tests {
    use serde_json::json;

    use crate::{settings::Settings, transaction::TransactionKind};

    #[test]
    fn partial_document_keeps_defaults_for_missing_keys() {
        let document = json!({"currency": "EUR", "monthlyBudget": 200.0});

        let settings: Settings = serde_json::from_value(document).unwrap();

        assert_eq!(
            settings,
            Settings {
                currency: "EUR".to_owned(),
                monthly_budget: 200.0,
                ..Settings::default()
            }
        );
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let document = json!({"theme": "dark", "updatedAt": "2025-10-18T00:00:00Z", "font": 3});

        let settings: Settings = serde_json::from_value(document).unwrap();

        assert_eq!(settings.theme, "dark");
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let document = serde_json::to_value(Settings::default()).unwrap();

        assert_eq!(
            document,
            json!({
                "currency": "USD",
                "dateFormat": "MM/DD/YYYY",
                "theme": "light",
                "notifications": true,
                "autoBackup": true,
                "defaultTransactionType": "expense",
                "monthlyBudget": 0.0,
                "weeklyBudget": 0.0,
            })
        );
    }

    #[test]
    fn default_transaction_kind_is_read_from_document() {
        let settings: Settings =
            serde_json::from_value(json!({"defaultTransactionType": "income"})).unwrap();

        assert_eq!(settings.default_transaction_kind, TransactionKind::Income);
    }
}
