//! JSON endpoints for reading and changing settings.

use std::sync::Arc;

use axum::{Extension, Json};
use serde::Serialize;

use crate::{
    Error,
    session::SessionContext,
    settings::{CURRENCIES, Currency, DATE_FORMATS, SettingOption, Settings, THEMES},
};

/// The values each choice-based setting may take.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsOptions {
    /// The supported currencies.
    pub currencies: &'static [Currency],
    /// The supported date formats.
    pub date_formats: &'static [SettingOption],
    /// The supported themes.
    pub themes: &'static [SettingOption],
}

/// A route handler for the signed-in user's settings.
pub async fn get_settings(
    Extension(context): Extension<Arc<SessionContext>>,
) -> Result<Json<Settings>, Error> {
    Ok(Json(context.user_data()?.settings.get()))
}

/// A route handler that replaces the signed-in user's settings, responds with the saved
/// settings.
///
/// Keys missing from the request take their default value.
pub async fn update_settings(
    Extension(context): Extension<Arc<SessionContext>>,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, Error> {
    let data = context.user_data()?;
    data.settings.save(&settings)?;

    Ok(Json(settings))
}

/// A route handler that restores the default settings.
pub async fn reset_settings(
    Extension(context): Extension<Arc<SessionContext>>,
) -> Result<Json<Settings>, Error> {
    Ok(Json(context.user_data()?.settings.reset()?))
}

/// A route handler listing the valid currencies, date formats and themes.
pub async fn get_settings_options() -> Json<SettingsOptions> {
    Json(SettingsOptions {
        currencies: CURRENCIES,
        date_formats: DATE_FORMATS,
        themes: THEMES,
    })
}

#[cfg(test)]
mod settings_endpoint_tests {
    use serde_json::{Value, json};

    use crate::{endpoints, routing::test_utils::get_signed_in_server, settings::Settings};

    #[tokio::test]
    async fn new_user_gets_defaults() {
        let (server, cookie) = get_signed_in_server().await;

        let settings: Settings = server
            .get(endpoints::SETTINGS)
            .add_cookie(cookie)
            .await
            .json();

        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn partial_update_fills_in_defaults() {
        let (server, cookie) = get_signed_in_server().await;

        let response = server
            .put(endpoints::SETTINGS)
            .add_cookie(cookie.clone())
            .json(&json!({"currency": "EUR", "monthlyBudget": 500.0}))
            .await;
        response.assert_status_ok();

        let settings: Settings = server
            .get(endpoints::SETTINGS)
            .add_cookie(cookie)
            .await
            .json();
        assert_eq!(
            settings,
            Settings {
                currency: "EUR".to_owned(),
                monthly_budget: 500.0,
                ..Settings::default()
            }
        );
    }

    #[tokio::test]
    async fn reset_restores_defaults() {
        let (server, cookie) = get_signed_in_server().await;
        server
            .put(endpoints::SETTINGS)
            .add_cookie(cookie.clone())
            .json(&json!({"theme": "dark"}))
            .await
            .assert_status_ok();

        let settings: Settings = server
            .post(endpoints::SETTINGS_RESET)
            .add_cookie(cookie.clone())
            .await
            .json();

        assert_eq!(settings, Settings::default());
        let stored: Settings = server
            .get(endpoints::SETTINGS)
            .add_cookie(cookie)
            .await
            .json();
        assert_eq!(stored.theme, "light");
    }

    #[tokio::test]
    async fn options_list_choices() {
        let (server, cookie) = get_signed_in_server().await;

        let options: Value = server
            .get(endpoints::SETTINGS_OPTIONS)
            .add_cookie(cookie)
            .await
            .json();

        assert_eq!(options["currencies"].as_array().unwrap().len(), 9);
        assert_eq!(options["dateFormats"][2]["value"], "YYYY-MM-DD");
        assert_eq!(options["themes"][0]["value"], "light");
    }
}
