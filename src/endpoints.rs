//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/categories/{category_id}', use
//! [format_endpoint].

/// The public home route, reports whether the client is signed in.
pub const ROOT: &str = "/";
/// The route for signing in with an email and password.
pub const LOG_IN: &str = "/log_in";
/// The route for signing in with an assertion from a federated provider.
pub const FEDERATED_LOG_IN: &str = "/log_in/federated";
/// The route for creating an account.
pub const REGISTER: &str = "/register";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/log_out";
/// The summary of the signed-in user's finances.
pub const DASHBOARD: &str = "/dashboard";

/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to update or delete a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route for income, expense and balance totals.
pub const TRANSACTION_TOTALS: &str = "/api/transactions/totals";
/// The route to list and create categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route to update or delete a single category.
pub const CATEGORY: &str = "/api/categories/{category_id}";
/// The route to read and save settings.
pub const SETTINGS: &str = "/api/settings";
/// The route to restore the default settings.
pub const SETTINGS_RESET: &str = "/api/settings/reset";
/// The route listing the valid currencies, date formats and themes.
pub const SETTINGS_OPTIONS: &str = "/api/settings/options";

/// The routes anyone may visit without signing in.
pub const PUBLIC_ROUTES: &[&str] = &[ROOT, LOG_IN, FEDERATED_LOG_IN, REGISTER];
/// The routes a signed-in user is sent away from.
pub const SIGNED_OUT_ROUTES: &[&str] = &[LOG_IN, FEDERATED_LOG_IN, REGISTER];

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |end| param_start + end + 1);

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
